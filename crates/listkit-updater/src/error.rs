//! Error types for the updater crate.

use listkit_diff::DiffError;

/// Errors reported by a [`crate::ListView`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// The batch does not match the counts the view currently displays.
    #[error("inconsistent update: {reason}")]
    Inconsistent { reason: String },

    /// The view has no backing store to apply updates to.
    #[error("list view unavailable")]
    Unavailable,
}

impl ViewError {
    pub fn inconsistent(reason: impl Into<String>) -> Self {
        Self::Inconsistent {
            reason: reason.into(),
        }
    }
}

/// Errors produced by the updater.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// A submitted snapshot could not be diffed.
    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    /// The view refused an operation.
    #[error("view error: {0}")]
    View(#[from] ViewError),

    /// Submission happened outside a Tokio runtime.
    #[error("no tokio runtime available to drive updates")]
    NoRuntime,

    /// The driver task failed before reporting an outcome.
    #[error("update driver failed: {0}")]
    Driver(String),
}

/// Convenience alias for updater results.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Convenience alias for view results.
pub type ViewResult<T> = Result<T, ViewError>;
