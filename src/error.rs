//! Error types for the decision engine

use thiserror::Error;

/// Decision engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid input (nil principal, empty actions, malformed policy)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Derived-roles dependency graph contains a cycle
    #[error("circular dependency in derived roles: {path}")]
    CircularDependency {
        /// Cycle path, e.g. `"a -> b -> a"`
        path: String,
    },

    /// A policy or derived role with this name already exists
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// No policy or derived role with this name
    #[error("not found: {0}")]
    NotFound(String),

    /// Condition evaluation failed
    #[error("expression error: {0}")]
    Expression(#[from] crate::cel::CelError),

    /// The request's cancellation signal fired mid-evaluation
    #[error("evaluation cancelled")]
    Cancelled,
}

/// Result type for decision engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
