//! Incremental corpus BLEU.
//!
//! `BleuScorer` ingests (hypothesis, references) pairs one at a time, keeping
//! per-example statistics so that the corpus score is an exact aggregate
//! rather than an average of sentence scores. Scores are computed lazily and
//! cached; any mutation drops the cache.

use std::collections::BTreeMap;

use crate::error::{Result, ScoreError};
use crate::ngram::{
    cook_refs, cook_test, resolve_reflen, CandidateStats, LengthPolicy, RefLength,
    ReferenceProfile, ReflenOption,
};
use crate::score::{ExampleId, Metric, MetricName, MetricScores};

/// Additive smoothing applied to every precision fraction so that an example
/// with zero matches (or an empty hypothesis) still yields a finite,
/// near-zero score instead of a division fault. The numerator constant is
/// several orders smaller than the denominator one, which keeps smoothed
/// fractions well below 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Smoothing {
    pub numerator_epsilon: f64,
    pub denominator_epsilon: f64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self {
            numerator_epsilon: 1e-15,
            denominator_epsilon: 1e-9,
        }
    }
}

/// Output of one scoring pass.
///
/// `corpus[k]` is BLEU-(k+1) on the percentage scale; `per_example[k]` holds
/// the fractional BLEU-(k+1) value of every stored example, in append order.
#[derive(Debug, Clone, PartialEq)]
pub struct BleuScores {
    pub corpus: Vec<f64>,
    pub per_example: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct BleuScorer {
    n: usize,
    crefs: Vec<ReferenceProfile>,
    ctest: Vec<Option<CandidateStats>>,
    special_reflen: Option<f64>,
    smoothing: Smoothing,
    testlen_total: f64,
    reflen_total: f64,
    cache: Option<BleuScores>,
}

impl BleuScorer {
    pub fn new(n: usize) -> Self {
        Self::with_smoothing(n, Smoothing::default())
    }

    pub fn with_smoothing(n: usize, smoothing: Smoothing) -> Self {
        Self {
            n,
            crefs: Vec::new(),
            ctest: Vec::new(),
            special_reflen: None,
            smoothing,
            testlen_total: 0.0,
            reflen_total: 0.0,
            cache: None,
        }
    }

    /// Fix the effective reference length of every example to one value,
    /// bypassing per-example reconciliation. Used by length-normalized
    /// variants of the metric.
    pub fn with_special_reflen(mut self, reflen: f64) -> Self {
        self.special_reflen = Some(reflen);
        self
    }

    pub fn max_order(&self) -> usize {
        self.n
    }

    /// Cook one example and append it.
    ///
    /// Passing `test = None` stages a references-only entry whose hypothesis
    /// arrives later via `retest`. The reference lengths stay undecided here;
    /// the reconciliation option chosen at scoring time resolves them.
    pub fn append(&mut self, test: Option<&str>, refs: &[String]) -> Result<()> {
        if refs.is_empty() {
            return Err(ScoreError::EmptyReferences);
        }
        let profile = cook_refs(refs, LengthPolicy::Keep, self.n);
        let stats = test.map(|t| cook_test(t, &profile, None, self.n));
        self.crefs.push(profile);
        self.ctest.push(stats);
        self.cache = None;
        Ok(())
    }

    /// Concatenate another accumulator's examples onto this one.
    pub fn merge(&mut self, other: BleuScorer) -> Result<()> {
        if self.n != other.n {
            return Err(ScoreError::IncompatibleOrder(self.n, other.n));
        }
        self.crefs.extend(other.crefs);
        self.ctest.extend(other.ctest);
        self.cache = None;
        Ok(())
    }

    /// Replace every stored hypothesis, keeping the reference profiles.
    pub fn retest(&mut self, new_tests: &[String]) -> Result<()> {
        if new_tests.len() != self.crefs.len() {
            return Err(ScoreError::SizeMismatch {
                tests: new_tests.len(),
                refs: self.crefs.len(),
            });
        }
        self.ctest = new_tests
            .iter()
            .zip(&self.crefs)
            .map(|(test, profile)| Some(cook_test(test, profile, None, self.n)))
            .collect();
        self.cache = None;
        Ok(())
    }

    pub fn rescore(&mut self, new_tests: &[String]) -> Result<BleuScores> {
        self.retest(new_tests)?;
        self.compute_score(None)
    }

    /// Number of stored examples, after checking the parallel-list invariant.
    pub fn size(&self) -> Result<usize> {
        if self.ctest.len() != self.crefs.len() {
            return Err(ScoreError::SizeMismatch {
                tests: self.ctest.len(),
                refs: self.crefs.len(),
            });
        }
        Ok(self.crefs.len())
    }

    fn single_reflen(&self, reflen: &RefLength, option: ReflenOption, testlen: usize) -> f64 {
        match reflen {
            RefLength::Fixed(value) => *value,
            RefLength::Each(lengths) => resolve_reflen(lengths, option, testlen),
        }
    }

    /// Compute corpus BLEU-1..N and the parallel per-example lists.
    ///
    /// `option` defaults to `Average` when exactly one example is stored and
    /// `Closest` otherwise. The result is cached; calls with no intervening
    /// mutation return the cached value unchanged.
    pub fn compute_score(&mut self, option: Option<ReflenOption>) -> Result<BleuScores> {
        if let Some(cached) = &self.cache {
            return Ok(cached.clone());
        }
        self.size()?;

        let option = option.unwrap_or(if self.crefs.len() == 1 {
            ReflenOption::Average
        } else {
            ReflenOption::Closest
        });

        let n = self.n;
        let Smoothing {
            numerator_epsilon: tiny,
            denominator_epsilon: small,
        } = self.smoothing;

        let mut per_example: Vec<Vec<f64>> = vec![Vec::with_capacity(self.ctest.len()); n];
        let mut total_testlen = 0.0f64;
        let mut total_reflen = 0.0f64;
        let mut total_guess = vec![0usize; n];
        let mut total_correct = vec![0usize; n];

        for (idx, comps) in self.ctest.iter().enumerate() {
            let comps = comps
                .as_ref()
                .ok_or(ScoreError::PendingHypothesis(idx))?;
            let testlen = comps.testlen;
            total_testlen += testlen as f64;

            let reflen = match self.special_reflen {
                Some(special) => special,
                None => self.single_reflen(&comps.reflen, option, testlen),
            };
            total_reflen += reflen;

            for k in 0..n {
                total_guess[k] += comps.guess[k];
                total_correct[k] += comps.correct[k];
            }

            // Running product over orders: taking the k-th partial product to
            // the power 1/(k+1) is the geometric mean of the first k+1
            // precisions, i.e. BLEU-(k+1) for this example.
            let mut bleu = 1.0f64;
            let ratio = (testlen as f64 + tiny) / (reflen + small);
            for k in 0..n {
                bleu *= (comps.correct[k] as f64 + tiny) / (comps.guess[k] as f64 + small);
                let mut value = bleu.powf(1.0 / (k as f64 + 1.0));
                if ratio < 1.0 {
                    value *= (1.0 - 1.0 / ratio).exp();
                }
                per_example[k].push(value);
            }
        }

        // Same computation once more over the corpus sums. This is not the
        // mean of the per-example values: pooling guess/correct before the
        // geometric mean is what keeps corpus BLEU consistent under merge.
        let mut corpus = Vec::with_capacity(n);
        let mut bleu = 1.0f64;
        let ratio = (total_testlen + tiny) / (total_reflen + small);
        for k in 0..n {
            bleu *= (total_correct[k] as f64 + tiny) / (total_guess[k] as f64 + small);
            let mut value = bleu.powf(1.0 / (k as f64 + 1.0));
            if ratio < 1.0 {
                value *= (1.0 - 1.0 / ratio).exp();
            }
            corpus.push(100.0 * value);
        }

        self.testlen_total = total_testlen;
        self.reflen_total = total_reflen;

        let scores = BleuScores { corpus, per_example };
        self.cache = Some(scores.clone());
        Ok(scores)
    }

    /// Drop the cache and score again under `option`.
    pub fn recompute_score(&mut self, option: Option<ReflenOption>) -> Result<BleuScores> {
        self.cache = None;
        self.compute_score(option)
    }

    /// Summed hypothesis length across the corpus.
    pub fn testlen(&mut self, option: Option<ReflenOption>) -> Result<f64> {
        self.compute_score(option)?;
        Ok(self.testlen_total)
    }

    /// Summed effective reference length across the corpus.
    pub fn reflen(&mut self, option: Option<ReflenOption>) -> Result<f64> {
        self.compute_score(option)?;
        Ok(self.reflen_total)
    }

    /// Corpus length ratio, the quantity the brevity penalty tests.
    pub fn ratio(&mut self, option: Option<ReflenOption>) -> Result<f64> {
        self.compute_score(option)?;
        Ok((self.testlen_total + self.smoothing.numerator_epsilon)
            / (self.reflen_total + self.smoothing.denominator_epsilon))
    }
}

/// Multi-order BLEU as an orchestrated metric. Feeds examples in sorted id
/// order and scores with `closest` reconciliation.
#[derive(Debug, Clone, Copy)]
pub struct Bleu {
    n: usize,
}

impl Bleu {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl Metric for Bleu {
    fn name(&self) -> MetricName {
        MetricName::Vector((1..=self.n).map(|k| format!("BLEU-{k}")).collect())
    }

    fn compute_score(
        &self,
        refs: &BTreeMap<ExampleId, Vec<String>>,
        hypos: &BTreeMap<ExampleId, Vec<String>>,
    ) -> Result<MetricScores> {
        let mut scorer = BleuScorer::new(self.n);
        for (id, ref_list) in refs {
            let hypo = hypos.get(id).ok_or(ScoreError::KeyMismatch {
                id: *id,
                present: "references",
                missing: "hypotheses",
            })?;
            let first = hypo.first().ok_or(ScoreError::HypothesisShape {
                id: *id,
                found: 0,
            })?;
            scorer.append(Some(first), ref_list)?;
        }
        let scores = scorer.compute_score(Some(ReflenOption::Closest))?;
        Ok(MetricScores::Vector {
            corpus: scores.corpus,
            per_example: scores.per_example,
        })
    }
}
