use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use listkit_diff::Section;
use serde::Serialize;

use crate::delegate::ReloadReason;
use crate::view::ListItem;

/// An immutable, shareable list state.
pub type Snapshot<S, T> = Arc<Vec<Section<S, T>>>;

/// Callback fired once the transition carrying it has been applied.
pub type Completion = Box<dyn FnOnce(&TransitionOutcome) + Send + 'static>;

/// How a transition reached the view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ApplyMode {
    /// Incremental batch.
    Batched,
    /// Full reload.
    Reloaded(ReloadReason),
}

/// What happened to a submitted transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    /// Sequence number of the applied transition, starting at 1.
    pub generation: u64,
    pub mode: ApplyMode,
    /// `false` only when the final reload failed as well.
    pub applied: bool,
    /// Operations in the applied batch (0 for reloads).
    pub operations: usize,
    /// Number of submissions merged into this transition.
    pub coalesced: usize,
}

impl TransitionOutcome {
    pub fn is_reload(&self) -> bool {
        matches!(self.mode, ApplyMode::Reloaded(_))
    }
}

/// A requested target state waiting in the pending slot.
pub(crate) struct TransitionRequest<S: ListItem, T: ListItem> {
    pub to: Snapshot<S, T>,
    pub completions: Vec<Completion>,
    pub reloaded_sections: HashSet<S::Id>,
    pub force_reload: bool,
    pub submissions: usize,
}

impl<S: ListItem, T: ListItem> TransitionRequest<S, T> {
    pub fn new(to: Snapshot<S, T>, completion: Option<Completion>) -> Self {
        Self {
            to,
            completions: completion.into_iter().collect(),
            reloaded_sections: HashSet::new(),
            force_reload: false,
            submissions: 1,
        }
    }

    /// Fold a newer request into this one: the newer target wins, every
    /// completion is kept in submission order.
    pub fn merge(&mut self, newer: Self) {
        self.to = newer.to;
        self.completions.extend(newer.completions);
        self.reloaded_sections.extend(newer.reloaded_sections);
        self.force_reload |= newer.force_reload;
        self.submissions += newer.submissions;
    }
}

impl<S: ListItem, T: ListItem> fmt::Debug for TransitionRequest<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRequest")
            .field("sections", &self.to.len())
            .field("completions", &self.completions.len())
            .field("reloaded_sections", &self.reloaded_sections.len())
            .field("force_reload", &self.force_reload)
            .field("submissions", &self.submissions)
            .finish()
    }
}
