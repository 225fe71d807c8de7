//! In-memory [`ListView`] implementation.
//!
//! Keeps the rendered sections and checks every batch against them the way
//! a batched list widget does: index ranges, final section and row counts,
//! and row operations inside sections that are themselves inserted, deleted
//! or moved. A failed check rejects the batch and leaves the rendered state
//! untouched. Every call is recorded for inspection.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use listkit_diff::Section;
use serde::Serialize;

use crate::batch::UpdateBatch;
use crate::error::{ViewError, ViewResult};
use crate::view::{ListItem, ListView};

/// A call received by an [`InMemoryListView`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ViewCall {
    Begin,
    Apply(UpdateBatch),
    End { accepted: bool },
    ReloadAll { sections: usize, accepted: bool },
}

struct Inner<S, T> {
    rendered: Vec<Section<S, T>>,
    staged: Option<(UpdateBatch, Vec<Section<S, T>>)>,
    in_batch: bool,
    attached: bool,
    reject_next: bool,
    fail_reloads: bool,
    calls: Vec<ViewCall>,
}

/// A list view backed by a `Vec` of sections.
pub struct InMemoryListView<S, T> {
    inner: Mutex<Inner<S, T>>,
}

impl<S: ListItem, T: ListItem> Default for InMemoryListView<S, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ListItem, T: ListItem> InMemoryListView<S, T> {
    /// An attached, empty view.
    pub fn new() -> Self {
        Self::with_sections(Vec::new())
    }

    /// An attached view already showing `sections`.
    pub fn with_sections(sections: Vec<Section<S, T>>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rendered: sections,
                staged: None,
                in_batch: false,
                attached: true,
                reject_next: false,
                fail_reloads: false,
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S, T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The sections currently shown.
    pub fn sections(&self) -> Vec<Section<S, T>> {
        self.lock().rendered.clone()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<ViewCall> {
        self.lock().calls.clone()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<ViewCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Number of batches that were accepted.
    pub fn batch_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, ViewCall::End { accepted: true }))
            .count()
    }

    /// Number of full reloads that were accepted.
    pub fn reload_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, ViewCall::ReloadAll { accepted: true, .. }))
            .count()
    }

    pub fn set_attached(&self, attached: bool) {
        self.lock().attached = attached;
    }

    /// Reject the next batch at `end_updates`, whatever it contains.
    pub fn reject_next_batch(&self) {
        self.lock().reject_next = true;
    }

    /// Make every subsequent `reload_all` fail with [`ViewError::Unavailable`].
    pub fn fail_reloads(&self, fail: bool) {
        self.lock().fail_reloads = fail;
    }
}

#[async_trait]
impl<S: ListItem, T: ListItem> ListView<S, T> for InMemoryListView<S, T> {
    fn is_attached(&self) -> bool {
        self.lock().attached
    }

    async fn begin_updates(&self) -> ViewResult<()> {
        let mut inner = self.lock();
        if inner.in_batch {
            return Err(ViewError::inconsistent("batch already open"));
        }
        inner.in_batch = true;
        inner.calls.push(ViewCall::Begin);
        Ok(())
    }

    async fn apply(&self, batch: &UpdateBatch, data: &[Section<S, T>]) -> ViewResult<()> {
        let mut inner = self.lock();
        if !inner.in_batch {
            return Err(ViewError::inconsistent("apply outside of a batch"));
        }
        inner.calls.push(ViewCall::Apply(batch.clone()));
        inner.staged = Some((batch.clone(), data.to_vec()));
        Ok(())
    }

    async fn end_updates(&self) -> ViewResult<()> {
        let mut inner = self.lock();
        inner.in_batch = false;
        let staged = inner.staged.take();
        let result = match staged {
            None => Ok(()),
            Some(_) if std::mem::take(&mut inner.reject_next) => {
                Err(ViewError::inconsistent("batch rejected"))
            }
            Some((batch, data)) => validate(&inner.rendered, &batch, &data).map(|()| {
                inner.rendered = data;
            }),
        };
        inner.calls.push(ViewCall::End {
            accepted: result.is_ok(),
        });
        result
    }

    async fn reload_all(&self, data: &[Section<S, T>]) -> ViewResult<()> {
        let mut inner = self.lock();
        let accepted = !inner.fail_reloads;
        inner.calls.push(ViewCall::ReloadAll {
            sections: data.len(),
            accepted,
        });
        if !accepted {
            return Err(ViewError::Unavailable);
        }
        inner.rendered = data.to_vec();
        inner.staged = None;
        inner.in_batch = false;
        Ok(())
    }
}

fn check_range(what: &str, index: usize, len: usize) -> ViewResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(ViewError::inconsistent(format!(
            "{what} {index} out of bounds ({len})"
        )))
    }
}

/// Check `batch` takes `before` to the shape of `after`.
pub(crate) fn validate<S, T>(
    before: &[Section<S, T>],
    batch: &UpdateBatch,
    after: &[Section<S, T>],
) -> ViewResult<()> {
    for &s in batch.section_deletes.iter().chain(&batch.section_updates) {
        check_range("section", s, before.len())?;
    }
    for &s in &batch.section_inserts {
        check_range("inserted section", s, after.len())?;
    }
    for m in &batch.section_moves {
        check_range("moved section", m.from, before.len())?;
        check_range("moved section", m.to, after.len())?;
    }

    if before.len() + batch.section_inserts.len() != after.len() + batch.section_deletes.len() {
        return Err(ViewError::inconsistent(format!(
            "section count {} after update, expected {} - {} + {}",
            after.len(),
            before.len(),
            batch.section_deletes.len(),
            batch.section_inserts.len()
        )));
    }

    let moved_from: BTreeSet<usize> = batch.section_moves.iter().map(|m| m.from).collect();
    let moved_to: BTreeSet<usize> = batch.section_moves.iter().map(|m| m.to).collect();

    // before section -> after section
    let mut mapping = vec![None; before.len()];
    for m in &batch.section_moves {
        mapping[m.from] = Some(m.to);
    }
    let free_slots = (0..after.len())
        .filter(|s| !batch.section_inserts.contains(s) && !moved_to.contains(s));
    let staying = (0..before.len())
        .filter(|s| !batch.section_deletes.contains(s) && !moved_from.contains(s));
    for (from, to) in staying.zip(free_slots) {
        mapping[from] = Some(to);
    }

    for p in batch.item_deletes.iter().chain(&batch.item_reloads) {
        if batch.section_deletes.contains(&p.section) {
            return Err(ViewError::inconsistent(format!(
                "row {p} touches a deleted section"
            )));
        }
        check_range("section", p.section, before.len())?;
        check_range("row", p.item, before[p.section].len())?;
    }
    // reloads may target a moved section, structural row changes may not
    if let Some(p) = batch
        .item_deletes
        .iter()
        .find(|p| moved_from.contains(&p.section))
    {
        return Err(ViewError::inconsistent(format!(
            "row {p} deleted from a moved section"
        )));
    }
    for p in &batch.item_inserts {
        if batch.section_inserts.contains(&p.section) || moved_to.contains(&p.section) {
            return Err(ViewError::inconsistent(format!(
                "row {p} inserted into an inserted or moved section"
            )));
        }
        check_range("section", p.section, after.len())?;
        check_range("row", p.item, after[p.section].len())?;
    }
    for m in &batch.item_moves {
        check_range("section", m.from.section, before.len())?;
        check_range("row", m.from.item, before[m.from.section].len())?;
        check_range("section", m.to.section, after.len())?;
        check_range("row", m.to.item, after[m.to.section].len())?;
    }

    for (from, to) in mapping.iter().enumerate() {
        let Some(to) = *to else { continue };
        let removed = batch
            .item_deletes
            .iter()
            .filter(|p| p.section == from)
            .count()
            + batch
                .item_moves
                .iter()
                .filter(|m| m.from.section == from)
                .count();
        let added = batch
            .item_inserts
            .iter()
            .filter(|p| p.section == to)
            .count()
            + batch.item_moves.iter().filter(|m| m.to.section == to).count();
        let expected = (before[from].len() + added).checked_sub(removed);
        if expected != Some(after[to].len()) {
            return Err(ViewError::inconsistent(format!(
                "section {to} has {} rows after update, expected {} - {removed} + {added}",
                after[to].len(),
                before[from].len()
            )));
        }
    }

    Ok(())
}
