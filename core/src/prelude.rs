pub use crate::actions::{Action, ActionKind, ArtifactSet};
pub use crate::model::{Image, Mask, TimeFrequencyData};
pub use crate::progress::ProgressListener;

/// Common error type for action and pipeline execution.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RfiError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("usage error: {0}")]
    Usage(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("data source failure: {0}")]
    Source(String),
    #[error("{failed} baseline(s) failed; first failure{}: {cause}", baseline_suffix(.baseline))]
    Concurrency {
        failed: usize,
        baseline: Option<String>,
        cause: String,
    },
    #[error("internal failure: {0}")]
    Internal(String),
}

fn baseline_suffix(baseline: &Option<String>) -> String {
    match baseline {
        Some(description) => format!(" in {}", description),
        None => String::new(),
    }
}

pub type RfiResult<T> = Result<T, RfiError>;
