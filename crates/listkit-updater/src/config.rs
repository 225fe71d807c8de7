use serde::{Deserialize, Serialize};

/// Heuristics controlling how the updater turns diffs into view updates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Rewrite every move as a deletion followed by an insertion.
    pub moves_as_deletes_inserts: bool,
    /// When every section holds exactly one row, pass section moves through
    /// and express row changes as row reloads. Disabled for a transition as
    /// soon as any section has a different row count.
    pub single_item_section_updates: bool,
    /// Turn an explicit section reload into row reloads when the section's
    /// row count is unchanged, instead of deleting and inserting it.
    pub prefer_item_reloads_for_section_reloads: bool,
    /// Skip diffing and reload everything while the view is detached.
    pub allows_background_reloading: bool,
    /// Reload everything when a batch exceeds [`Self::reload_threshold`].
    pub allows_reloading_on_too_many_updates: bool,
    /// Largest batch applied incrementally.
    pub reload_threshold: usize,
    /// Run diffs on the blocking thread pool instead of the driver task.
    pub background_diffing: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            moves_as_deletes_inserts: false,
            single_item_section_updates: false,
            prefer_item_reloads_for_section_reloads: false,
            allows_background_reloading: true,
            allows_reloading_on_too_many_updates: true,
            reload_threshold: 100,
            background_diffing: false,
        }
    }
}

impl UpdaterConfig {
    /// Always apply diffs, never fall back to a full reload on purpose.
    ///
    /// Rejected batches still recover through a reload.
    pub fn no_fallbacks() -> Self {
        Self {
            allows_background_reloading: false,
            allows_reloading_on_too_many_updates: false,
            ..Default::default()
        }
    }

    /// Returns `true` if a batch of `operations` should become a reload.
    pub fn exceeds_threshold(&self, operations: usize) -> bool {
        self.allows_reloading_on_too_many_updates && operations > self.reload_threshold
    }
}
