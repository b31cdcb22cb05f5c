//! Shared primitives for all Rust crates in Reportflow.

#![forbid(unsafe_code)]

/// Strongly-typed identifiers shared across services.
pub mod ids;

use thiserror::Error;

pub use ids::{PrincipalId, ProjectId, StepId, SubjectId, WorkflowId};

/// Result type used across Reportflow crates.
pub type AppResult<T> = Result<T, AppError>;

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Acting principal lacks the authority for the operation.
    ///
    /// Carries no detail so responses cannot leak role topology.
    #[error("unauthorized: insufficient authority")]
    Unauthorized,

    /// Requested state transition is not legal from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
