//! Two-level diff over sections of rows.
//!
//! Section headers are diffed first. Every section present on both sides
//! then gets its own row diff, and row positions are translated into
//! [`IndexPath`]s: deletions and update sources use the section's before
//! index, insertions and move targets its after index. A section that moved
//! keeps its row diff; callers that cannot combine a section move with row
//! changes decide what to do with it (see `listkit-updater`'s policy layer).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diffable::{Diffable, Section};
use crate::error::{DiffError, DiffResult, Side};
use crate::flat::{check_unique, diff_with, DiffOptions, DuplicatePolicy};
use crate::script::EditScript;

/// A row inside a section.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexPath {
    pub section: usize,
    pub item: usize,
}

impl IndexPath {
    pub fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.item)
    }
}

/// A row that changed position, possibly across sections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexPathMove {
    pub from: IndexPath,
    pub to: IndexPath,
}

/// A row whose value changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexPathUpdate {
    pub from: IndexPath,
    pub to: IndexPath,
}

/// Row diff of one section that exists before and after.
#[derive(Clone, Debug, Serialize)]
pub struct RowDiff<K> {
    pub from_section: usize,
    pub to_section: usize,
    pub script: EditScript<K>,
}

impl<K> RowDiff<K> {
    /// Returns `true` if the section itself changed position.
    pub fn section_moved(&self) -> bool {
        self.from_section != self.to_section
    }
}

/// Result of a two-level diff.
#[derive(Clone, Debug, Serialize)]
pub struct SectionedScript<SK, IK> {
    pub sections: EditScript<SK>,
    /// One entry per surviving section, in after order.
    pub rows: Vec<RowDiff<IK>>,
}

impl<SK, IK> SectionedScript<SK, IK>
where
    SK: Eq + std::hash::Hash + Clone,
    IK: Eq + std::hash::Hash + Clone,
{
    /// Total operations across both levels.
    pub fn change_count(&self) -> usize {
        self.sections.change_count()
            + self
                .rows
                .iter()
                .map(|r| r.script.change_count())
                .sum::<usize>()
    }

    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Row diff of the section at after position `to_section`.
    pub fn rows_for(&self, to_section: usize) -> Option<&RowDiff<IK>> {
        self.rows.iter().find(|r| r.to_section == to_section)
    }

    pub fn item_deletes(&self) -> Vec<IndexPath> {
        self.rows
            .iter()
            .flat_map(|r| {
                r.script
                    .deletes
                    .iter()
                    .map(move |&i| IndexPath::new(r.from_section, i))
            })
            .collect()
    }

    pub fn item_inserts(&self) -> Vec<IndexPath> {
        self.rows
            .iter()
            .flat_map(|r| {
                r.script
                    .inserts
                    .iter()
                    .map(move |&i| IndexPath::new(r.to_section, i))
            })
            .collect()
    }

    pub fn item_updates(&self) -> Vec<IndexPathUpdate> {
        self.rows
            .iter()
            .flat_map(|r| {
                r.script.updates.iter().map(move |u| IndexPathUpdate {
                    from: IndexPath::new(r.from_section, u.from),
                    to: IndexPath::new(r.to_section, u.to),
                })
            })
            .collect()
    }

    pub fn item_moves(&self) -> Vec<IndexPathMove> {
        self.rows
            .iter()
            .flat_map(|r| {
                r.script.moves.iter().map(move |m| IndexPathMove {
                    from: IndexPath::new(r.from_section, m.from),
                    to: IndexPath::new(r.to_section, m.to),
                })
            })
            .collect()
    }

    /// Both levels rewritten with [`EditScript::for_batch_updates`].
    pub fn for_batch_updates(&self) -> Self {
        Self {
            sections: self.sections.for_batch_updates(),
            rows: self
                .rows
                .iter()
                .map(|r| RowDiff {
                    from_section: r.from_section,
                    to_section: r.to_section,
                    script: r.script.for_batch_updates(),
                })
                .collect(),
        }
    }
}

/// Diff two sectioned sequences, rejecting duplicate identifiers.
pub fn diff_sections<S, T>(
    old: &[Section<S, T>],
    new: &[Section<S, T>],
) -> DiffResult<SectionedScript<S::Id, T::Id>>
where
    S: Diffable,
    T: Diffable,
{
    diff_sections_with(old, new, DiffOptions::default())
}

/// Diff two sectioned sequences with explicit options.
pub fn diff_sections_with<S, T>(
    old: &[Section<S, T>],
    new: &[Section<S, T>],
    options: DiffOptions,
) -> DiffResult<SectionedScript<S::Id, T::Id>>
where
    S: Diffable,
    T: Diffable,
{
    if options.duplicates == DuplicatePolicy::Reject {
        check_sections_unique(old, Side::Before)?;
        check_sections_unique(new, Side::After)?;
    }

    let sections = diff_with(old, new, options)?;

    let mut rows = Vec::new();
    for (to_section, record) in sections.new_records.iter().enumerate() {
        let Some(from_section) = record.link else {
            continue;
        };
        let script = diff_with(&old[from_section].items, &new[to_section].items, options)
            .map_err(|e| {
                let before = matches!(e, DiffError::DuplicateIdentity { side: Side::Before, .. });
                let section = if before {
                    from_section
                } else {
                    to_section
                };
                e.in_section(section)
            })?;
        rows.push(RowDiff {
            from_section,
            to_section,
            script,
        });
    }

    Ok(SectionedScript { sections, rows })
}

/// Check section identifiers, and row identifiers within every section.
pub fn check_sections_unique<S, T>(sections: &[Section<S, T>], side: Side) -> DiffResult<()>
where
    S: Diffable,
    T: Diffable,
{
    check_unique(sections, side)?;
    for (index, section) in sections.iter().enumerate() {
        check_unique(&section.items, side).map_err(|e| e.in_section(index))?;
    }
    Ok(())
}
