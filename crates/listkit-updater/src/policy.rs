//! Turns a sectioned diff into the batch a list view can apply.
//!
//! Every heuristic here is a pure function of the diff, the two snapshots,
//! the sections the caller asked to reload and the [`UpdaterConfig`].

use std::collections::HashSet;
use std::hash::Hash;

use listkit_diff::{Diffable, IndexPath, IndexPathMove, Section, SectionedScript};

use crate::batch::UpdateBatch;
use crate::config::UpdaterConfig;

/// Returns `true` if every section on both sides holds exactly one row.
pub fn all_single_item_sections<S, T>(before: &[Section<S, T>], after: &[Section<S, T>]) -> bool {
    before.iter().chain(after).all(|s| s.len() == 1)
}

/// Build the batch for one transition.
///
/// - moves that also update become delete + insert at both levels;
/// - with `moves_as_deletes_inserts` every move becomes delete + insert;
/// - with `single_item_section_updates` (and only single-row sections)
///   section moves pass through and row changes become row reloads;
/// - otherwise a section move that also has row changes becomes a section
///   delete + insert, and row operations inside deleted or inserted
///   sections are dropped;
/// - explicitly reloaded sections become row reloads (when preferred and
///   the row count is unchanged) or a section delete + insert.
pub fn build_batch<S, T>(
    script: &SectionedScript<S::Id, T::Id>,
    before: &[Section<S, T>],
    after: &[Section<S, T>],
    reloaded: &HashSet<S::Id>,
    config: &UpdaterConfig,
) -> UpdateBatch
where
    S: Diffable,
    T: Diffable,
    S::Id: Eq + Hash,
{
    let single_item =
        config.single_item_section_updates && all_single_item_sections(before, after);
    let script = script.for_batch_updates();

    let mut batch = UpdateBatch {
        section_deletes: script.sections.deletes.clone(),
        section_inserts: script.sections.inserts.clone(),
        section_updates: script.sections.updates.iter().map(|u| u.from).collect(),
        ..Default::default()
    };

    for m in &script.sections.moves {
        if config.moves_as_deletes_inserts {
            batch.section_deletes.insert(m.from);
            batch.section_inserts.insert(m.to);
        } else {
            batch.section_moves.insert(*m);
        }
    }

    for rows in &script.rows {
        if batch.section_deletes.contains(&rows.from_section)
            || batch.section_inserts.contains(&rows.to_section)
            || !rows.script.has_changes()
        {
            continue;
        }

        if single_item {
            batch
                .item_reloads
                .insert(IndexPath::new(rows.from_section, 0));
            continue;
        }

        if batch
            .section_moves
            .iter()
            .any(|m| m.from == rows.from_section)
        {
            batch.replace_section(rows.from_section, rows.to_section);
            continue;
        }

        let (from, to) = (rows.from_section, rows.to_section);
        batch
            .item_deletes
            .extend(rows.script.deletes.iter().map(|&i| IndexPath::new(from, i)));
        batch
            .item_inserts
            .extend(rows.script.inserts.iter().map(|&i| IndexPath::new(to, i)));
        batch
            .item_reloads
            .extend(rows.script.updates.iter().map(|u| IndexPath::new(from, u.from)));
        for m in &rows.script.moves {
            let (src, dst) = (IndexPath::new(from, m.from), IndexPath::new(to, m.to));
            if config.moves_as_deletes_inserts {
                batch.item_deletes.insert(src);
                batch.item_inserts.insert(dst);
            } else {
                batch.item_moves.insert(IndexPathMove { from: src, to: dst });
            }
        }
    }

    for id in reloaded {
        let (Some(from), Some(to)) = (
            script.sections.old_index_of(id),
            script.sections.new_index_of(id),
        ) else {
            continue;
        };
        if batch.section_deletes.contains(&from) || batch.section_inserts.contains(&to) {
            continue;
        }

        let structural = script.rows_for(to).is_some_and(|rows| {
            !rows.script.deletes.is_empty()
                || !rows.script.inserts.is_empty()
                || !rows.script.moves.is_empty()
        });
        let moved = batch.section_moves.iter().any(|m| m.from == from);
        let same_count = before[from].len() == after[to].len();

        if config.prefer_item_reloads_for_section_reloads && same_count && !structural && !moved {
            batch
                .item_reloads
                .extend((0..before[from].len()).map(|i| IndexPath::new(from, i)));
        } else {
            batch.replace_section(from, to);
        }
    }

    let deleted = batch.section_deletes.clone();
    batch.section_updates.retain(|s| !deleted.contains(s));
    batch
}
