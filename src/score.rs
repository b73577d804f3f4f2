//! Metric interface and corpus orchestration.
//!
//! Every metric, including external ones such as alignment- or TF-IDF-based
//! scorers, is driven through the same `Metric` trait: score the whole
//! corpus, hand back a corpus value (or vector of values) plus per-example
//! scores. The `Evaluator` runs an ordered list of metrics over validated
//! input maps and merges the named corpus results.

use std::collections::BTreeMap;

use futures::future::join_all;

use crate::bleu::{Bleu, BleuScorer};
use crate::error::{Result, ScoreError};
use crate::rouge::RougeL;
use crate::utils::Sequence;

pub type ExampleId = u32;
pub type ExampleMap = BTreeMap<ExampleId, Vec<String>>;

/// Display name(s) of a metric. A vector metric (multi-order BLEU) declares
/// one name per corpus value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricName {
    Scalar(String),
    Vector(Vec<String>),
}

impl MetricName {
    fn display(&self) -> String {
        match self {
            MetricName::Scalar(name) => name.clone(),
            MetricName::Vector(names) => names.join("/"),
        }
    }
}

/// Corpus and per-example results, tagged to match the metric's name shape.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricScores {
    Scalar { corpus: f64, per_example: Vec<f64> },
    Vector { corpus: Vec<f64>, per_example: Vec<Vec<f64>> },
}

pub trait Metric: Send + Sync {
    fn name(&self) -> MetricName;
    fn compute_score(&self, refs: &ExampleMap, hypos: &ExampleMap) -> Result<MetricScores>;
}

/// Check the input contract once, at the boundary: identical key sets,
/// exactly one hypothesis per example, at least one reference per example.
pub fn validate_inputs(refs: &ExampleMap, hypos: &ExampleMap) -> Result<()> {
    for id in refs.keys() {
        if !hypos.contains_key(id) {
            return Err(ScoreError::KeyMismatch {
                id: *id,
                present: "references",
                missing: "hypotheses",
            });
        }
    }
    for (id, hypo) in hypos {
        if !refs.contains_key(id) {
            return Err(ScoreError::KeyMismatch {
                id: *id,
                present: "hypotheses",
                missing: "references",
            });
        }
        if hypo.len() != 1 {
            return Err(ScoreError::HypothesisShape {
                id: *id,
                found: hypo.len(),
            });
        }
    }
    for (id, ref_list) in refs {
        if ref_list.is_empty() {
            return Err(ScoreError::ReferenceShape { id: *id });
        }
    }
    Ok(())
}

fn lowercased(map: &ExampleMap) -> ExampleMap {
    map.iter()
        .map(|(id, texts)| {
            (*id, texts.iter().map(|t| t.to_lowercase()).collect())
        })
        .collect()
}

pub struct Evaluator {
    metrics: Vec<Box<dyn Metric>>,
    lowercase: bool,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Evaluator {
    /// The standard metric list: BLEU-1..4 and ROUGE-L.
    pub fn new(lowercase: bool) -> Self {
        let metrics: Vec<Box<dyn Metric>> =
            vec![Box::new(Bleu::new(4)), Box::new(RougeL::default())];
        Self::with_metrics(metrics, lowercase)
    }

    pub fn with_metrics(metrics: Vec<Box<dyn Metric>>, lowercase: bool) -> Self {
        Self { metrics, lowercase }
    }

    /// Run every metric and merge the named corpus scores.
    ///
    /// A failing metric aborts the whole evaluation; there is no partial
    /// result to hand back.
    pub fn score(&self, refs: &ExampleMap, hypos: &ExampleMap) -> Result<BTreeMap<String, f64>> {
        validate_inputs(refs, hypos)?;

        let folded_refs;
        let folded_hypos;
        let (refs, hypos) = if self.lowercase {
            folded_refs = lowercased(refs);
            folded_hypos = lowercased(hypos);
            (&folded_refs, &folded_hypos)
        } else {
            (refs, hypos)
        };

        let mut final_scores = BTreeMap::new();
        for metric in &self.metrics {
            let name = metric.name();
            match (name, metric.compute_score(refs, hypos)?) {
                (MetricName::Scalar(name), MetricScores::Scalar { corpus, .. }) => {
                    final_scores.insert(name, corpus);
                }
                (MetricName::Vector(names), MetricScores::Vector { corpus, .. }) => {
                    if names.len() != corpus.len() {
                        return Err(ScoreError::ScoreShape {
                            name: names.join("/"),
                            names: names.len(),
                            values: corpus.len(),
                        });
                    }
                    for (name, value) in names.into_iter().zip(corpus) {
                        final_scores.insert(name, value);
                    }
                }
                (name, scores) => {
                    let values = match scores {
                        MetricScores::Scalar { .. } => 1,
                        MetricScores::Vector { corpus, .. } => corpus.len(),
                    };
                    let names = match &name {
                        MetricName::Scalar(_) => 1,
                        MetricName::Vector(names) => names.len(),
                    };
                    return Err(ScoreError::ScoreShape {
                        name: name.display(),
                        names,
                        values,
                    });
                }
            }
        }
        Ok(final_scores)
    }
}

/// Per-example scores computed by the parallel batch path.
#[derive(Debug, Clone)]
pub struct ExampleScores {
    /// Fractional BLEU-1..N for this example alone.
    pub bleu: Vec<f64>,
    /// Fractional ROUGE-L.
    pub rouge_l: f64,
}

fn score_example(hypo: &str, refs: &[String], n: usize) -> Result<ExampleScores> {
    let mut scorer = BleuScorer::new(n);
    scorer.append(Some(hypo), refs)?;
    let scores = scorer.compute_score(None)?;
    let bleu = scores
        .per_example
        .iter()
        .map(|per_order| per_order[0])
        .collect();

    let candidate = Sequence::new(hypo);
    let references: Vec<Sequence> = refs.iter().map(|r| Sequence::new(r)).collect();
    let rouge_l = RougeL::default().calc_score(&candidate, &references);

    Ok(ExampleScores { bleu, rouge_l })
}

/// Score every (hypothesis, references) pair of a batch concurrently.
///
/// Examples carry no shared mutable state, so each one is cooked in its own
/// future; `join_all` hands the results back in input order, which keeps any
/// downstream corpus reduction deterministic.
pub async fn score_batch(
    hypos: Vec<String>,
    refs: Vec<Vec<String>>,
    n: usize,
) -> Result<Vec<ExampleScores>> {
    if hypos.len() != refs.len() {
        return Err(ScoreError::SizeMismatch {
            tests: hypos.len(),
            refs: refs.len(),
        });
    }

    let tasks = hypos
        .into_iter()
        .zip(refs)
        .map(|(hypo, ref_list)| async move { score_example(&hypo, &ref_list, n) });

    join_all(tasks).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::runtime::Runtime;

    fn example_maps(pairs: &[(&str, Vec<&str>)]) -> (ExampleMap, ExampleMap) {
        let mut refs = ExampleMap::new();
        let mut hypos = ExampleMap::new();
        for (idx, (hypo, ref_texts)) in pairs.iter().enumerate() {
            hypos.insert(idx as u32, vec![hypo.to_string()]);
            refs.insert(idx as u32, ref_texts.iter().map(|r| r.to_string()).collect());
        }
        (refs, hypos)
    }

    #[test]
    fn test_evaluator_emits_all_metric_names() {
        let (refs, hypos) = example_maps(&[("a b", vec!["a b", "a c"])]);
        let scores = Evaluator::default().score(&refs, &hypos).unwrap();

        let names: Vec<&str> = scores.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["BLEU-1", "BLEU-2", "BLEU-3", "BLEU-4", "ROUGE-L"]);

        let bleu_1 = scores["BLEU-1"];
        assert!(bleu_1.is_finite());
        assert!((0.0..=100.0).contains(&bleu_1), "BLEU-1 out of range: {}", bleu_1);
        // The hypothesis reproduces one reference exactly.
        assert!((scores["ROUGE-L"] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluator_rejects_key_mismatch() {
        let (refs, mut hypos) = example_maps(&[("a b", vec!["a b"]), ("c d", vec!["c d"])]);
        hypos.remove(&1);
        let err = Evaluator::default().score(&refs, &hypos).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::KeyMismatch { id: 1, present: "references", .. }
        ));

        let (refs, mut hypos) = example_maps(&[("a b", vec!["a b"])]);
        hypos.insert(9, vec!["extra".to_string()]);
        let err = Evaluator::default().score(&refs, &hypos).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::KeyMismatch { id: 9, present: "hypotheses", .. }
        ));
    }

    #[test]
    fn test_evaluator_rejects_bad_shapes() {
        let (refs, mut hypos) = example_maps(&[("a b", vec!["a b"])]);
        hypos.insert(0, vec!["one".to_string(), "two".to_string()]);
        let err = Evaluator::default().score(&refs, &hypos).unwrap_err();
        assert!(matches!(err, ScoreError::HypothesisShape { id: 0, found: 2 }));

        let (mut refs, hypos) = example_maps(&[("a b", vec!["a b"])]);
        refs.insert(0, vec![]);
        let err = Evaluator::default().score(&refs, &hypos).unwrap_err();
        assert!(matches!(err, ScoreError::ReferenceShape { id: 0 }));
    }

    #[test]
    fn test_lowercase_folding() {
        let (refs, hypos) = example_maps(&[("The Cat Sat", vec!["the cat sat"])]);

        let cased = Evaluator::new(false).score(&refs, &hypos).unwrap();
        assert_eq!(cased["ROUGE-L"], 0.0);

        let folded = Evaluator::new(true).score(&refs, &hypos).unwrap();
        assert!((folded["ROUGE-L"] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_validate_passes_well_formed_inputs() {
        let (refs, hypos) = example_maps(&[("a", vec!["a", "b"]), ("c", vec!["c"])]);
        assert!(validate_inputs(&refs, &hypos).is_ok());
    }

    #[test]
    fn test_batch_scorer() {
        let hypos = vec!["the cat sat".to_string(), "a dog barked".to_string()];
        let refs = vec![
            vec!["the cat sat".to_string()],
            vec!["the dog barked loudly".to_string(), "a dog barked".to_string()],
        ];

        let rt = Runtime::new().expect("Failed to create async runtime");
        let scores = rt.block_on(score_batch(hypos, refs, 4)).unwrap();

        assert_eq!(scores.len(), 2);
        // Results come back in input order: the first example is the exact
        // match, so every order of BLEU and ROUGE-L all sit at 1.
        assert!((scores[0].rouge_l - 1.0).abs() < 1e-9);
        for value in &scores[0].bleu {
            assert!((value - 1.0).abs() < 1e-6);
        }
        assert!((scores[1].rouge_l - 1.0).abs() < 1e-9);
        for example in &scores {
            assert_eq!(example.bleu.len(), 4);
            for value in &example.bleu {
                assert!((0.0..=1.0 + 1e-9).contains(value));
            }
        }
    }

    #[test]
    fn test_batch_scorer_size_mismatch() {
        let rt = Runtime::new().expect("Failed to create async runtime");
        let err = rt
            .block_on(score_batch(
                vec!["a".to_string()],
                vec![vec!["a".to_string()], vec!["b".to_string()]],
                4,
            ))
            .unwrap_err();
        assert!(matches!(err, ScoreError::SizeMismatch { tests: 1, refs: 2 }));
    }
}
