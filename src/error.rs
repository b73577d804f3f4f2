//! Contract errors for the scoring engine.
//!
//! Every variant is caller misuse. Degenerate-but-scoreable inputs (an empty
//! hypothesis, zero matching n-grams) never raise; they are handled by the
//! smoothing constants in `bleu` and the zero branch in `rouge`.

use pyo3::exceptions::PyValueError;
use pyo3::PyErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("unknown reflen option: {0:?}")]
    UnknownOption(String),

    #[error("incompatible scorers: max n-gram order {0} vs {1}")]
    IncompatibleOrder(usize, usize),

    #[error("test({tests})/refs({refs}) mismatch")]
    SizeMismatch { tests: usize, refs: usize },

    #[error("reference list is empty")]
    EmptyReferences,

    #[error("example at position {0} has no hypothesis to score")]
    PendingHypothesis(usize),

    #[error("example {id}: expected exactly one hypothesis, found {found}")]
    HypothesisShape { id: u32, found: usize },

    #[error("example {id}: reference list is empty")]
    ReferenceShape { id: u32 },

    #[error("example {id} present in {present} but missing from {missing}")]
    KeyMismatch {
        id: u32,
        present: &'static str,
        missing: &'static str,
    },

    #[error("metric {name}: {names} names for {values} corpus values")]
    ScoreShape {
        name: String,
        names: usize,
        values: usize,
    },
}

pub type Result<T> = std::result::Result<T, ScoreError>;

impl From<ScoreError> for PyErr {
    fn from(err: ScoreError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoreError::SizeMismatch { tests: 3, refs: 5 };
        assert_eq!(format!("{}", err), "test(3)/refs(5) mismatch");

        let err = ScoreError::UnknownOption("longest".to_string());
        assert!(format!("{}", err).contains("longest"));

        let err = ScoreError::KeyMismatch {
            id: 7,
            present: "references",
            missing: "hypotheses",
        };
        assert!(format!("{}", err).contains("missing from hypotheses"));
    }
}
