//! Coalescing list updater for listkit.
//!
//! A [`ListUpdater`] receives target states for a sectioned list, merges
//! submissions that arrive while a transition is running, diffs the last
//! committed state against the newest target and hands the resulting
//! [`UpdateBatch`] to a [`ListView`]. Large batches, detached views and
//! rejected batches fall back to a full reload.
//!
//! # Key Types
//!
//! - [`ListUpdater`] -- submission API and driver
//! - [`ListView`] -- the list being updated; [`InMemoryListView`] is a
//!   validating reference implementation
//! - [`UpdateBatch`] / [`build_batch`] -- index-level operations and the
//!   policy producing them
//! - [`UpdaterConfig`] -- heuristics
//! - [`UpdaterDelegate`] -- progress observer

pub mod batch;
pub mod config;
pub mod delegate;
pub mod error;
pub mod memory;
pub mod policy;
pub mod transition;
pub mod updater;
pub mod view;

pub use batch::UpdateBatch;
pub use config::UpdaterConfig;
pub use delegate::{ReloadReason, UpdaterDelegate};
pub use error::{UpdateError, UpdateResult, ViewError, ViewResult};
pub use memory::{InMemoryListView, ViewCall};
pub use policy::{all_single_item_sections, build_batch};
pub use transition::{ApplyMode, Completion, Snapshot, TransitionOutcome};
pub use updater::ListUpdater;
pub use view::{ListItem, ListView};
