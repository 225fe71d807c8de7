//! Single-level diff: one ordered sequence against another.
//!
//! Uses a symbol table keyed by identifier instead of a longest common
//! subsequence, so the cost is linear in the combined length:
//!
//! 1. walk the after sequence, counting occurrences and pushing a
//!    "not found" marker per occurrence;
//! 2. walk the before sequence backwards, counting occurrences and pushing
//!    each position, so the top of an entry's stack is its lowest unused
//!    before position;
//! 3. walk the after sequence again, popping one position per occurrence
//!    and linking the two sides;
//! 4. classify: unlinked before positions are deletions, unlinked after
//!    positions insertions, linked unequal pairs updates, and linked pairs
//!    whose position is not explained by the surrounding inserts and deletes
//!    are moves.

use std::collections::HashMap;
use std::hash::Hash;

use crate::diffable::Diffable;
use crate::error::{DiffError, DiffResult, Side};
use crate::script::{EditScript, Move, Record, Update};

/// How to treat an identifier that occurs more than once in one sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with [`DiffError::DuplicateIdentity`].
    #[default]
    Reject,
    /// Pair the n-th after occurrence with the n-th before occurrence.
    PairInOrder,
}

/// Options for [`diff_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DiffOptions {
    pub duplicates: DuplicatePolicy,
}

impl DiffOptions {
    /// Options that pair duplicate identifiers instead of rejecting them.
    pub fn pairing_duplicates() -> Self {
        Self {
            duplicates: DuplicatePolicy::PairInOrder,
        }
    }
}

#[derive(Default)]
struct Entry {
    old_count: usize,
    new_count: usize,
    old_indexes: Vec<Option<usize>>,
}

/// Diff two sequences, rejecting duplicate identifiers.
pub fn diff<T: Diffable>(old: &[T], new: &[T]) -> DiffResult<EditScript<T::Id>> {
    diff_with(old, new, DiffOptions::default())
}

/// Diff two sequences with explicit options.
pub fn diff_with<T: Diffable>(
    old: &[T],
    new: &[T],
    options: DiffOptions,
) -> DiffResult<EditScript<T::Id>> {
    let old_keys: Vec<T::Id> = old.iter().map(T::diff_identifier).collect();
    let new_keys: Vec<T::Id> = new.iter().map(T::diff_identifier).collect();

    if options.duplicates == DuplicatePolicy::Reject {
        ensure_unique(&old_keys, Side::Before)?;
        ensure_unique(&new_keys, Side::After)?;
    }

    let mut slots: HashMap<&T::Id, usize> = HashMap::with_capacity(old.len().max(new.len()));
    let mut entries: Vec<Entry> = Vec::new();

    let mut new_slots = Vec::with_capacity(new.len());
    for key in &new_keys {
        let slot = slot_for(&mut slots, &mut entries, key);
        let entry = &mut entries[slot];
        entry.new_count += 1;
        entry.old_indexes.push(None);
        new_slots.push(slot);
    }

    for (i, key) in old_keys.iter().enumerate().rev() {
        let slot = slot_for(&mut slots, &mut entries, key);
        let entry = &mut entries[slot];
        entry.old_count += 1;
        entry.old_indexes.push(Some(i));
    }

    let mut old_links: Vec<Option<usize>> = vec![None; old.len()];
    let mut new_links: Vec<Option<usize>> = vec![None; new.len()];
    let mut updated = vec![false; new.len()];
    for (i, &slot) in new_slots.iter().enumerate() {
        let entry = &mut entries[slot];
        let Some(original) = entry.old_indexes.pop().flatten() else {
            continue;
        };
        if entry.new_count > 0 && entry.old_count > 0 {
            updated[i] = !new[i].is_equal_to(&old[original]);
            new_links[i] = Some(original);
            old_links[original] = Some(i);
        }
    }

    let mut script = EditScript::empty(old.len(), new.len());

    let mut delete_offsets = vec![0usize; old.len()];
    let mut running = 0;
    for (i, link) in old_links.iter().enumerate() {
        delete_offsets[i] = running;
        script.old_records[i].link = *link;
        if link.is_none() {
            script.deletes.insert(i);
            running += 1;
        }
        script.old_index.entry(old_keys[i].clone()).or_insert(i);
    }

    running = 0;
    for (i, link) in new_links.iter().enumerate() {
        match *link {
            None => {
                script.inserts.insert(i);
                running += 1;
            }
            Some(from) => {
                let moved = from - delete_offsets[from] + running != i;
                if updated[i] {
                    script.updates.push(Update { from, to: i });
                }
                if moved {
                    script.moves.push(Move { from, to: i });
                }
                let record = Record {
                    link: Some(from),
                    updated: updated[i],
                    moved,
                };
                script.new_records[i] = record;
                script.old_records[from] = Record {
                    link: Some(i),
                    ..record
                };
            }
        }
        script.new_index.entry(new_keys[i].clone()).or_insert(i);
    }

    Ok(script)
}

/// Fail if any identifier occurs twice in `keys`.
pub(crate) fn ensure_unique<K: Eq + Hash + std::fmt::Debug>(
    keys: &[K],
    side: Side,
) -> DiffResult<()> {
    let mut seen: HashMap<&K, usize> = HashMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        if let Some(&first) = seen.get(key) {
            return Err(DiffError::DuplicateIdentity {
                id: format!("{key:?}"),
                side,
                first,
                second: i,
            });
        }
        seen.insert(key, i);
    }
    Ok(())
}

/// Check that a sequence has no repeated identifiers.
pub fn check_unique<T: Diffable>(items: &[T], side: Side) -> DiffResult<()> {
    let keys: Vec<T::Id> = items.iter().map(T::diff_identifier).collect();
    ensure_unique(&keys, side)
}

fn slot_for<'k, K: Eq + Hash>(
    slots: &mut HashMap<&'k K, usize>,
    entries: &mut Vec<Entry>,
    key: &'k K,
) -> usize {
    *slots.entry(key).or_insert_with(|| {
        entries.push(Entry::default());
        entries.len() - 1
    })
}

/// Identifiers deleted by `script`, in before order.
pub fn deleted_identities<T: Diffable>(old: &[T], script: &EditScript<T::Id>) -> Vec<T::Id> {
    script
        .deletes
        .iter()
        .filter_map(|&i| old.get(i).map(T::diff_identifier))
        .collect()
}

/// Identifiers inserted by `script`, in after order.
pub fn inserted_identities<T: Diffable>(new: &[T], script: &EditScript<T::Id>) -> Vec<T::Id> {
    script
        .inserts
        .iter()
        .filter_map(|&i| new.get(i).map(T::diff_identifier))
        .collect()
}
