//! Error types for the diff crate.

use std::fmt;

/// Which side of a diff a sequence came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The sequence being transformed.
    Before,
    /// The target sequence.
    After,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::After => f.write_str("after"),
        }
    }
}

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Two items of one sequence share an identifier.
    #[error("duplicate identity {id} in {side} sequence at positions {first} and {second}")]
    DuplicateIdentity {
        /// Debug rendering of the repeated identifier.
        id: String,
        side: Side,
        first: usize,
        second: usize,
    },

    /// Two items of one section share an identifier.
    #[error("duplicate identity {id} in {side} section {section} at rows {first} and {second}")]
    DuplicateItemIdentity {
        id: String,
        side: Side,
        section: usize,
        first: usize,
        second: usize,
    },
}

impl DiffError {
    /// The debug rendering of the offending identifier.
    pub fn identity(&self) -> &str {
        match self {
            Self::DuplicateIdentity { id, .. } | Self::DuplicateItemIdentity { id, .. } => id,
        }
    }

    /// Re-anchor a flat duplicate error inside a section.
    pub(crate) fn in_section(self, section: usize) -> Self {
        match self {
            Self::DuplicateIdentity {
                id,
                side,
                first,
                second,
            } => Self::DuplicateItemIdentity {
                id,
                side,
                section,
                first,
                second,
            },
            other => other,
        }
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
