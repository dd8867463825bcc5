use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NnError>;

/// A source file the loader had to skip, and why.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Every user-facing failure of the loader, trainer and predictor.
///
/// All variants describe malformed input or a call made out of order; none
/// of them signal an internal bug. Numerical trouble (NaN, divergence) is not
/// an error here and shows up in the validation metrics instead.
#[derive(Debug, Error)]
pub enum NnError {
    #[error("record {index}: {reason}")]
    LabelEncoding { index: usize, reason: String },

    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid architecture: {0}")]
    Architecture(String),

    #[error("no valid training data ({} source(s) failed{})", failures.len(), format_failures(failures))]
    NoData { failures: Vec<SourceFailure> },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("no model loaded: train or import an artifact before predicting")]
    ModelNotLoaded,

    #[error("invalid training config: {0}")]
    InvalidConfig(String),

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NnError {
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> NnError {
        NnError::ShapeMismatch { context: context.into(), expected, actual }
    }
}

fn format_failures(failures: &[SourceFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
    format!(": {}", joined.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_reports_dimensions() {
        let err = NnError::shape("predict input", 64, 63);
        assert_eq!(err.to_string(), "shape mismatch in predict input: expected 64, got 63");
    }

    #[test]
    fn no_data_lists_every_failed_source() {
        let err = NnError::NoData {
            failures: vec![
                SourceFailure { path: PathBuf::from("a.json"), reason: "bad json".into() },
                SourceFailure { path: PathBuf::from("b.json"), reason: "empty".into() },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 source(s) failed"));
        assert!(msg.contains("a.json: bad json"));
        assert!(msg.contains("b.json: empty"));
    }

    #[test]
    fn no_data_without_sources() {
        let err = NnError::NoData { failures: vec![] };
        assert_eq!(err.to_string(), "no valid training data (0 source(s) failed)");
    }
}
