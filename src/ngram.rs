//! N-gram cooking: turns hypothesis and reference strings into the compact
//! count statistics the BLEU accumulator works with.
//!
//! Text is expected to be pre-tokenized upstream; splitting here is plain
//! whitespace splitting, never linguistic tokenization.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ScoreError;

/// An n-gram is the ordered window of tokens itself.
pub type NGram = Vec<String>;

/// Occurrence counts for every n-gram of order 1..=N within one text.
pub type NGramCounts = HashMap<NGram, usize>;

/// How `cook_refs` handles the per-reference lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPolicy {
    /// Keep the individual lengths for later `closest` resolution.
    Keep,
    Shortest,
    Average,
}

/// Reference-length reconciliation applied when an example holds several
/// references of differing length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflenOption {
    Shortest,
    Average,
    Closest,
}

impl FromStr for ReflenOption {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortest" => Ok(ReflenOption::Shortest),
            "average" => Ok(ReflenOption::Average),
            "closest" => Ok(ReflenOption::Closest),
            other => Err(ScoreError::UnknownOption(other.to_string())),
        }
    }
}

/// Effective reference length: either already collapsed to a single value, or
/// the full per-reference list with resolution deferred to scoring time.
#[derive(Debug, Clone, PartialEq)]
pub enum RefLength {
    Each(Vec<usize>),
    Fixed(f64),
}

/// Everything BLEU needs to know about one example's references: the length
/// handling plus, per n-gram, the most occurrences any single reference
/// supports. The max (rather than a sum) is what stops a hypothesis from
/// collecting credit for a repeated word from several references at once.
#[derive(Debug, Clone)]
pub struct ReferenceProfile {
    pub reflen: RefLength,
    pub max_counts: NGramCounts,
}

/// Per-example statistics for one scored hypothesis.
///
/// `guess[k]` is the number of order-(k+1) n-gram positions the hypothesis
/// offers; `correct[k]` is the clipped match count against the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateStats {
    pub testlen: usize,
    pub guess: Vec<usize>,
    pub correct: Vec<usize>,
    pub reflen: RefLength,
}

/// Count every contiguous n-gram of order 1..=n in `text`.
///
/// An empty string yields `(0, {})`; there is nothing to fail on.
pub fn precook(text: &str, n: usize) -> (usize, NGramCounts) {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut counts = NGramCounts::new();
    for k in 1..=n {
        if words.len() < k {
            break;
        }
        for window in words.windows(k) {
            let gram: NGram = window.iter().map(|w| w.to_string()).collect();
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    (words.len(), counts)
}

/// Fold all references for one example into a single profile.
///
/// `refs` must be non-empty; the accumulator and orchestrator boundaries
/// enforce that before calling in.
pub fn cook_refs(refs: &[String], policy: LengthPolicy, n: usize) -> ReferenceProfile {
    let mut lengths = Vec::with_capacity(refs.len());
    let mut max_counts = NGramCounts::new();

    for reference in refs {
        let (len, counts) = precook(reference, n);
        lengths.push(len);
        for (gram, count) in counts {
            let slot = max_counts.entry(gram).or_insert(0);
            if count > *slot {
                *slot = count;
            }
        }
    }

    let reflen = match policy {
        LengthPolicy::Keep => RefLength::Each(lengths),
        LengthPolicy::Shortest => {
            RefLength::Fixed(lengths.iter().copied().min().unwrap_or(0) as f64)
        }
        LengthPolicy::Average => {
            RefLength::Fixed(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64)
        }
    };

    ReferenceProfile { reflen, max_counts }
}

/// Compare one hypothesis against its example's reference profile.
///
/// With `eff = Some(option)` the reference length is resolved immediately
/// when the profile still holds the per-reference list; with `None` the
/// profile's length state is carried as-is and resolved at scoring time.
pub fn cook_test(
    test: &str,
    profile: &ReferenceProfile,
    eff: Option<ReflenOption>,
    n: usize,
) -> CandidateStats {
    let (testlen, counts) = precook(test, n);

    let reflen = match (eff, &profile.reflen) {
        (Some(option), RefLength::Each(lengths)) => {
            RefLength::Fixed(resolve_reflen(lengths, option, testlen))
        }
        _ => profile.reflen.clone(),
    };

    let mut guess = Vec::with_capacity(n);
    for k in 0..n {
        guess.push(testlen.saturating_sub(k));
    }

    // Credit for each hypothesis n-gram is clipped at what the references
    // jointly support, so repeating a matched word cannot inflate the score.
    let mut correct = vec![0usize; n];
    for (gram, count) in &counts {
        let supported = profile.max_counts.get(gram).copied().unwrap_or(0);
        correct[gram.len() - 1] += (*count).min(supported);
    }

    CandidateStats {
        testlen,
        guess,
        correct,
        reflen,
    }
}

/// Collapse a list of reference lengths to one effective value.
///
/// `Closest` scans in stored order and keeps the first length on a tie, so
/// resolution is deterministic for any input ordering.
pub fn resolve_reflen(lengths: &[usize], option: ReflenOption, testlen: usize) -> f64 {
    match option {
        ReflenOption::Shortest => lengths.iter().copied().min().unwrap_or(0) as f64,
        ReflenOption::Average => lengths.iter().sum::<usize>() as f64 / lengths.len() as f64,
        ReflenOption::Closest => {
            let mut best = 0usize;
            let mut best_diff = usize::MAX;
            for &len in lengths {
                let diff = len.abs_diff(testlen);
                if diff < best_diff {
                    best_diff = diff;
                    best = len;
                }
            }
            best as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gram(words: &[&str]) -> NGram {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_precook_counts_all_orders() {
        let (len, counts) = precook("the cat sat on the mat", 2);
        assert_eq!(len, 6);
        assert_eq!(counts[&gram(&["the"])], 2);
        assert_eq!(counts[&gram(&["cat"])], 1);
        assert_eq!(counts[&gram(&["the", "cat"])], 1);
        assert_eq!(counts[&gram(&["the", "mat"])], 1);
        // 6 distinct unigrams minus the repeat, plus 5 bigrams
        assert_eq!(counts.len(), 5 + 5);
    }

    #[test]
    fn test_precook_empty_string() {
        let (len, counts) = precook("", 4);
        assert_eq!(len, 0);
        assert!(counts.is_empty());
    }

    #[test]
    fn test_precook_shorter_than_order() {
        let (len, counts) = precook("hello", 4);
        assert_eq!(len, 1);
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&gram(&["hello"])], 1);
    }

    #[test]
    fn test_cook_refs_takes_max_count_per_gram() {
        let refs = vec!["the the cat".to_string(), "the dog".to_string()];
        let profile = cook_refs(&refs, LengthPolicy::Keep, 1);
        // "the" appears twice in the first reference, once in the second
        assert_eq!(profile.max_counts[&gram(&["the"])], 2);
        assert_eq!(profile.max_counts[&gram(&["dog"])], 1);
        assert_eq!(profile.reflen, RefLength::Each(vec![3, 2]));
    }

    #[test]
    fn test_cook_refs_length_policies() {
        let refs = vec!["a b c".to_string(), "a b c d e".to_string()];
        let shortest = cook_refs(&refs, LengthPolicy::Shortest, 1);
        assert_eq!(shortest.reflen, RefLength::Fixed(3.0));
        let average = cook_refs(&refs, LengthPolicy::Average, 1);
        assert_eq!(average.reflen, RefLength::Fixed(4.0));
    }

    #[test]
    fn test_cook_test_guess_counts() {
        let profile = cook_refs(&["a b c d".to_string()], LengthPolicy::Keep, 4);
        let stats = cook_test("x y z", &profile, None, 4);
        assert_eq!(stats.testlen, 3);
        assert_eq!(stats.guess, vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_cook_test_clips_repeated_grams() {
        let profile = cook_refs(&["the the".to_string()], LengthPolicy::Keep, 1);
        let stats = cook_test("the the the the", &profile, None, 1);
        // four occurrences in the hypothesis, but only two are supported
        assert_eq!(stats.correct, vec![2]);
        assert_eq!(stats.guess, vec![4]);
    }

    #[test]
    fn test_correct_never_exceeds_guess() {
        let refs = vec!["a a b c".to_string(), "b c d".to_string()];
        let profile = cook_refs(&refs, LengthPolicy::Keep, 4);
        let stats = cook_test("a a b c d", &profile, None, 4);
        for k in 0..4 {
            assert!(
                stats.correct[k] <= stats.guess[k],
                "order {}: correct {} > guess {}",
                k + 1,
                stats.correct[k],
                stats.guess[k]
            );
        }
    }

    #[test]
    fn test_cook_test_resolves_closest_eagerly() {
        let refs = vec!["a b c d e".to_string(), "a b c d e f g h i j".to_string()];
        let profile = cook_refs(&refs, LengthPolicy::Keep, 1);
        let stats = cook_test("q w e r t y u", &profile, Some(ReflenOption::Closest), 1);
        // |7-5| = 2 beats |7-10| = 3
        assert_eq!(stats.reflen, RefLength::Fixed(5.0));
    }

    #[test]
    fn test_closest_tie_keeps_first_occurrence() {
        assert_eq!(resolve_reflen(&[5, 9], ReflenOption::Closest, 7), 5.0);
        assert_eq!(resolve_reflen(&[9, 5], ReflenOption::Closest, 7), 9.0);
    }

    #[test]
    fn test_resolve_reflen_options() {
        let lengths = [5, 10];
        assert_eq!(resolve_reflen(&lengths, ReflenOption::Shortest, 7), 5.0);
        assert_eq!(resolve_reflen(&lengths, ReflenOption::Average, 7), 7.5);
        assert_eq!(resolve_reflen(&lengths, ReflenOption::Closest, 7), 5.0);
    }

    #[test]
    fn test_reflen_option_parsing() {
        assert_eq!("closest".parse::<ReflenOption>().unwrap(), ReflenOption::Closest);
        assert_eq!("shortest".parse::<ReflenOption>().unwrap(), ReflenOption::Shortest);
        assert_eq!("average".parse::<ReflenOption>().unwrap(), ReflenOption::Average);
        assert!(matches!(
            "longest".parse::<ReflenOption>(),
            Err(ScoreError::UnknownOption(_))
        ));
    }
}
