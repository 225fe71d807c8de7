//! Index-level operations handed to a list view in one batch.

use std::collections::BTreeSet;
use std::fmt;

use listkit_diff::{IndexPath, IndexPathMove, Move};
use serde::{Deserialize, Serialize};

/// One batch of section and row operations.
///
/// Deletions, reloads, header updates and move sources index the state
/// before the batch; insertions and move targets index the state after it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub section_deletes: BTreeSet<usize>,
    pub section_inserts: BTreeSet<usize>,
    pub section_moves: BTreeSet<Move>,
    /// Sections whose header changed in place.
    pub section_updates: BTreeSet<usize>,
    pub item_deletes: BTreeSet<IndexPath>,
    pub item_inserts: BTreeSet<IndexPath>,
    pub item_moves: BTreeSet<IndexPathMove>,
    pub item_reloads: BTreeSet<IndexPath>,
}

impl UpdateBatch {
    /// Total number of operations.
    pub fn len(&self) -> usize {
        self.section_deletes.len()
            + self.section_inserts.len()
            + self.section_moves.len()
            + self.section_updates.len()
            + self.item_deletes.len()
            + self.item_inserts.len()
            + self.item_moves.len()
            + self.item_reloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace a surviving section with a delete plus an insert, dropping
    /// every row operation and any move or header update that touched it.
    pub fn replace_section(&mut self, from: usize, to: usize) {
        self.section_moves.retain(|m| m.from != from);
        self.section_updates.remove(&from);
        self.item_deletes.retain(|p| p.section != from);
        self.item_reloads.retain(|p| p.section != from);
        self.item_inserts.retain(|p| p.section != to);
        self.item_moves
            .retain(|m| m.from.section != from && m.to.section != to);
        self.section_deletes.insert(from);
        self.section_inserts.insert(to);
    }
}

impl fmt::Display for UpdateBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sections(-{} +{} ~{} ^{}) items(-{} +{} ~{} ^{})",
            self.section_deletes.len(),
            self.section_inserts.len(),
            self.section_moves.len(),
            self.section_updates.len(),
            self.item_deletes.len(),
            self.item_inserts.len(),
            self.item_moves.len(),
            self.item_reloads.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_counts_every_operation() {
        let mut batch = UpdateBatch::default();
        assert!(batch.is_empty());
        batch.section_inserts.insert(0);
        batch.item_reloads.insert(IndexPath::new(1, 0));
        batch.section_moves.insert(Move { from: 2, to: 3 });
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.to_string(), "sections(-0 +1 ~1 ^0) items(-0 +0 ~0 ^1)");
    }

    #[test]
    fn replace_section_drops_row_operations() {
        let mut batch = UpdateBatch::default();
        batch.section_moves.insert(Move { from: 0, to: 2 });
        batch.item_deletes.insert(IndexPath::new(0, 1));
        batch.item_inserts.insert(IndexPath::new(2, 0));
        batch.item_inserts.insert(IndexPath::new(1, 0));
        batch.replace_section(0, 2);

        assert!(batch.section_moves.is_empty());
        assert!(batch.item_deletes.is_empty());
        assert_eq!(batch.item_inserts.len(), 1);
        assert!(batch.section_deletes.contains(&0));
        assert!(batch.section_inserts.contains(&2));
    }
}
