//! ROUGE-L: longest-common-subsequence F-measure.

use std::collections::BTreeMap;

use crate::error::{Result, ScoreError};
use crate::score::{ExampleId, Metric, MetricName, MetricScores};
use crate::utils::{DPMatrix, Sequence};

/// Recall weight used by the F-measure.
const DEFAULT_BETA: f64 = 1.2;

/// LCS length between two token sequences via the classic O(a*b) dynamic
/// program. The sequences are swapped so the shorter one runs along the
/// inner (contiguous) dimension of the table; the result is symmetric, so
/// this is purely a cache-locality move.
fn lcs(a: &Sequence, b: &Sequence) -> usize {
    let (outer, inner) = if a.n_words < b.n_words { (b, a) } else { (a, b) };

    let mut lengths = DPMatrix::new(outer.n_words + 1, inner.n_words + 1);
    for i in 1..=outer.n_words {
        for j in 1..=inner.n_words {
            if outer.tokens[i - 1] == inner.tokens[j - 1] {
                // A match extends the best subsequence of both prefixes.
                lengths.set(i, j, lengths.at(i - 1, j - 1) + 1);
            } else {
                // Otherwise skip a token from one side or the other; order is
                // preserved either way since LCS does not require contiguity.
                lengths.set(i, j, lengths.at(i - 1, j).max(lengths.at(i, j - 1)));
            }
        }
    }
    lengths.at(outer.n_words, inner.n_words) as usize
}

pub struct RougeL {
    beta: f64,
}

impl Default for RougeL {
    fn default() -> Self {
        Self { beta: DEFAULT_BETA }
    }
}

impl RougeL {
    pub fn new(beta: f64) -> Self {
        Self { beta }
    }

    /// Score one candidate against its references.
    ///
    /// Precision and recall are each maximized independently over the
    /// references; the best precision and the best recall need not come from
    /// the same reference. Empty candidates or references fall through to the
    /// zero branch instead of erroring.
    pub fn calc_score(&self, candidate: &Sequence, references: &[Sequence]) -> f64 {
        if candidate.n_words == 0 {
            return 0.0;
        }

        let mut prec_max = 0.0f64;
        let mut rec_max = 0.0f64;

        for reference in references {
            if reference.n_words == 0 {
                continue;
            }
            let lcs_len = lcs(reference, candidate) as f64;
            prec_max = prec_max.max(lcs_len / candidate.n_words as f64);
            rec_max = rec_max.max(lcs_len / reference.n_words as f64);
        }

        if prec_max != 0.0 && rec_max != 0.0 {
            let beta_sq = self.beta * self.beta;
            ((1.0 + beta_sq) * prec_max * rec_max) / (rec_max + beta_sq * prec_max)
        } else {
            0.0
        }
    }
}

impl Metric for RougeL {
    fn name(&self) -> MetricName {
        MetricName::Scalar("ROUGE-L".to_string())
    }

    fn compute_score(
        &self,
        refs: &BTreeMap<ExampleId, Vec<String>>,
        hypos: &BTreeMap<ExampleId, Vec<String>>,
    ) -> Result<MetricScores> {
        let mut per_example = Vec::with_capacity(refs.len());
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

            let candidate = Sequence::new(first);
            let references: Vec<Sequence> =
                ref_list.iter().map(|r| Sequence::new(r)).collect();
            per_example.push(self.calc_score(&candidate, &references));
        }

        let corpus = if per_example.is_empty() {
            0.0
        } else {
            100.0 * per_example.iter().sum::<f64>() / per_example.len() as f64
        };

        Ok(MetricScores::Scalar { corpus, per_example })
    }
}
