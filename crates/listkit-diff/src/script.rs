//! The edit script produced by a diff.
//!
//! Positions are anchored to two coordinate spaces: deletions, move sources
//! and update sources index the *before* sequence; insertions, move targets
//! and update targets index the *after* sequence.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// An entity that changed position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

/// An entity whose identity matched but whose value did not.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Update {
    pub from: usize,
    pub to: usize,
}

/// Per-position outcome of a diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Position of the same entity on the other side, if it survived.
    pub link: Option<usize>,
    pub updated: bool,
    pub moved: bool,
}

/// Deletions, insertions, updates and moves between two sequences.
#[derive(Clone, Debug, Serialize)]
pub struct EditScript<K> {
    pub inserts: BTreeSet<usize>,
    pub deletes: BTreeSet<usize>,
    pub updates: Vec<Update>,
    pub moves: Vec<Move>,
    /// One record per before position.
    pub old_records: Vec<Record>,
    /// One record per after position.
    pub new_records: Vec<Record>,
    #[serde(skip)]
    pub(crate) old_index: HashMap<K, usize>,
    #[serde(skip)]
    pub(crate) new_index: HashMap<K, usize>,
}

impl<K: Eq + Hash> EditScript<K> {
    /// A script with no operations over sequences of the given lengths.
    pub fn empty(old_len: usize, new_len: usize) -> Self {
        Self {
            inserts: BTreeSet::new(),
            deletes: BTreeSet::new(),
            updates: Vec::new(),
            moves: Vec::new(),
            old_records: vec![Record::default(); old_len],
            new_records: vec![Record::default(); new_len],
            old_index: HashMap::new(),
            new_index: HashMap::new(),
        }
    }

    /// Returns `true` if applying the script changes anything.
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Total number of operations.
    pub fn change_count(&self) -> usize {
        self.inserts.len() + self.deletes.len() + self.updates.len() + self.moves.len()
    }

    /// Length of the before sequence.
    pub fn old_len(&self) -> usize {
        self.old_records.len()
    }

    /// Length of the after sequence.
    pub fn new_len(&self) -> usize {
        self.new_records.len()
    }

    /// Before position of the entity with this identifier.
    pub fn old_index_of(&self, id: &K) -> Option<usize> {
        self.old_index.get(id).copied()
    }

    /// After position of the entity with this identifier.
    pub fn new_index_of(&self, id: &K) -> Option<usize> {
        self.new_index.get(id).copied()
    }

    /// The same transformation expressed for a batched list update.
    ///
    /// A batched update cannot reload and move the same row, so every move
    /// that is also an update becomes a deletion plus an insertion.
    pub fn for_batch_updates(&self) -> Self
    where
        K: Clone,
    {
        let mut script = self.clone();
        let updated_from: BTreeSet<usize> = self.updates.iter().map(|u| u.from).collect();
        let (converted, kept): (Vec<Move>, Vec<Move>) = self
            .moves
            .iter()
            .partition(|m| updated_from.contains(&m.from));

        for m in &converted {
            script.deletes.insert(m.from);
            script.inserts.insert(m.to);
            script.old_records[m.from] = Record::default();
            script.new_records[m.to] = Record::default();
        }
        let converted_from: BTreeSet<usize> = converted.iter().map(|m| m.from).collect();
        script.updates.retain(|u| !converted_from.contains(&u.from));
        script.moves = kept;
        script
    }

    /// Rebuild the after sequence from `old`, taking inserted, moved and
    /// updated values from `new`.
    ///
    /// Deletions and move sources are removed first, then insertions and
    /// move targets are placed in ascending order. Returns `None` when the
    /// script does not fit the two sequences.
    pub fn apply<T: Clone>(&self, old: &[T], new: &[T]) -> Option<Vec<T>> {
        let removed: BTreeSet<usize> = self
            .deletes
            .iter()
            .copied()
            .chain(self.moves.iter().map(|m| m.from))
            .collect();
        let added: BTreeSet<usize> = self
            .inserts
            .iter()
            .copied()
            .chain(self.moves.iter().map(|m| m.to))
            .collect();
        if removed.iter().any(|&i| i >= old.len()) || added.iter().any(|&i| i >= new.len()) {
            return None;
        }

        let mut kept = old
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(i))
            .map(|(_, item)| item);
        let mut result = Vec::with_capacity(new.len());
        for (i, item) in new.iter().enumerate() {
            if added.contains(&i) {
                result.push(item.clone());
            } else {
                result.push(kept.next()?.clone());
            }
        }
        if kept.next().is_some() {
            return None;
        }

        for update in &self.updates {
            if !added.contains(&update.to) {
                result[update.to] = new.get(update.to)?.clone();
            }
        }
        Some(result)
    }
}
