pub mod bleu;
pub mod error;
pub mod ngram;
pub mod rouge;
pub mod score;
pub mod utils;

// NOTE: All hypothesis and reference text is presumed to be PRE-TOKENIZED
//       upstream: whitespace-joined tokens, one sentence per string. The
//       scoring path never touches the filesystem; file ingestion lives on
//       the Python side.

use std::collections::HashMap;

use pyo3::prelude::*;
use tokio::runtime::Runtime;

use crate::error::ScoreError;
use crate::score::{score_batch as batch_scores, Evaluator, ExampleMap};

/// Corpus-level evaluation: BLEU-1..4 and ROUGE-L over parallel lists of
/// hypotheses and per-example reference lists, returned as a name -> score
/// mapping on the percentage scale.
#[pyfunction]
#[pyo3(signature = (hypos, refs, lowercase = false))]
fn evaluate(
    py: Python,
    hypos: Vec<String>,
    refs: Vec<Vec<String>>,
    lowercase: bool,
) -> PyResult<HashMap<String, f64>> {
    let final_scores = py.allow_threads(move || {
        if hypos.len() != refs.len() {
            return Err(ScoreError::SizeMismatch {
                tests: hypos.len(),
                refs: refs.len(),
            });
        }

        let mut ref_map = ExampleMap::new();
        let mut hypo_map = ExampleMap::new();
        for (idx, (hypo, ref_list)) in hypos.into_iter().zip(refs).enumerate() {
            hypo_map.insert(idx as u32, vec![hypo]);
            ref_map.insert(idx as u32, ref_list);
        }

        Evaluator::new(lowercase).score(&ref_map, &hypo_map)
    })?;

    Ok(final_scores.into_iter().collect())
}

/// Per-example scores for a batch: a BLEU-1..4 vector per example plus a
/// ROUGE-L value per example, both fractional and in input order.
#[pyfunction]
fn score_batch(
    py: Python,
    hypos: Vec<String>,
    refs: Vec<Vec<String>>,
) -> PyResult<(Vec<Vec<f64>>, Vec<f64>)> {
    let scores = py.allow_threads(|| {
        let rt = Runtime::new().expect("Failed to create async runtime");
        rt.block_on(batch_scores(hypos, refs, 4))
    })?;

    let bleu = scores.iter().map(|example| example.bleu.clone()).collect();
    let rouge_l = scores.iter().map(|example| example.rouge_l).collect();
    Ok((bleu, rouge_l))
}

#[pymodule]
fn _rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(evaluate, m)?)?;
    m.add_function(wrap_pyfunction!(score_batch, m)?)?;
    Ok(())
}
