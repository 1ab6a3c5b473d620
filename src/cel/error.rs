//! Error types for condition evaluation

use thiserror::Error;

/// Condition evaluation errors
#[derive(Error, Debug)]
pub enum CelError {
    #[error("compilation failed: {0}")]
    Compilation(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("expression did not return a boolean result")]
    NonBooleanResult,
}

/// Result type for condition evaluation
pub type Result<T> = std::result::Result<T, CelError>;
