use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::batch::UpdateBatch;
use crate::error::UpdateError;

/// Why a transition was applied as a full reload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ReloadReason {
    /// The caller asked for a reload.
    Requested,
    /// The view was detached.
    Detached,
    /// The batch was larger than the configured threshold.
    TooManyUpdates { operations: usize },
    /// The snapshots could not be diffed.
    DiffFailed,
    /// The view refused the batch.
    Rejected,
}

impl fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::Detached => f.write_str("detached"),
            Self::TooManyUpdates { operations } => write!(f, "too many updates ({operations})"),
            Self::DiffFailed => f.write_str("diff failed"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// Observer of transition progress, for instrumentation only.
///
/// Every method has an empty default. Callbacks run on the updater's driver
/// task and must not block.
#[allow(unused_variables)]
pub trait UpdaterDelegate: Send + Sync {
    fn will_diff(&self, from_sections: usize, to_sections: usize) {}

    fn did_diff(&self, elapsed: Duration, operations: usize) {}

    fn will_apply(&self, batch: &UpdateBatch) {}

    fn did_apply(&self, success: bool) {}

    fn will_reload(&self, reason: ReloadReason) {}

    fn did_reload(&self, success: bool) {}

    /// An error the updater recovered from (or failed to).
    fn did_recover(&self, error: &UpdateError) {}
}
