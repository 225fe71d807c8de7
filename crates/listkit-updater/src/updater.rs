//! The coalescing transition coordinator.
//!
//! Callers submit target states at any rate. The updater keeps at most one
//! pending request, merging newer submissions into it, and a single driver
//! task applies requests to the view one at a time. The committed state is
//! always the last state the view accepted, and every diff is computed from
//! it, so bursts of submissions collapse into one view update.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use listkit_diff::{check_sections_unique, diff_sections, DiffResult, Section, Side};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::batch::UpdateBatch;
use crate::config::UpdaterConfig;
use crate::delegate::{ReloadReason, UpdaterDelegate};
use crate::error::{UpdateError, UpdateResult, ViewResult};
use crate::policy::build_batch;
use crate::transition::{ApplyMode, Completion, Snapshot, TransitionOutcome, TransitionRequest};
use crate::view::{ListItem, ListView};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Applying,
}

struct State<S: ListItem, T: ListItem> {
    phase: Phase,
    pending: Option<TransitionRequest<S, T>>,
    committed: Option<Snapshot<S, T>>,
    /// Most recently submitted target, in flight or pending.
    target: Option<Snapshot<S, T>>,
    config: UpdaterConfig,
    delegate: Option<Arc<dyn UpdaterDelegate>>,
    generation: u64,
}

struct Shared<S: ListItem, T: ListItem> {
    view: Arc<dyn ListView<S, T>>,
    state: Mutex<State<S, T>>,
}

/// Handle to a coalescing updater bound to one list view.
///
/// Clones share the same state and driver.
pub struct ListUpdater<S: ListItem, T: ListItem> {
    shared: Arc<Shared<S, T>>,
}

impl<S: ListItem, T: ListItem> Clone for ListUpdater<S, T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: ListItem, T: ListItem> ListUpdater<S, T> {
    pub fn new(view: Arc<dyn ListView<S, T>>) -> Self {
        Self::with_config(view, UpdaterConfig::default())
    }

    pub fn with_config(view: Arc<dyn ListView<S, T>>, config: UpdaterConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                view,
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    pending: None,
                    committed: None,
                    target: None,
                    config,
                    delegate: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Request a transition from `from` to `to`.
    ///
    /// `from` only seeds the committed state on the first submission; later
    /// transitions are diffed from whatever the view last accepted. Returns
    /// immediately. Duplicate identifiers in either snapshot are reported
    /// here and nothing is recorded.
    pub fn update(
        &self,
        from: impl Into<Snapshot<S, T>>,
        to: impl Into<Snapshot<S, T>>,
        completion: Option<Completion>,
    ) -> UpdateResult<()> {
        let (from, to) = (from.into(), to.into());
        check_sections_unique(from.as_slice(), Side::Before)?;
        check_sections_unique(to.as_slice(), Side::After)?;
        let handle = Handle::try_current().map_err(|_| UpdateError::NoRuntime)?;

        let mut state = self.shared.lock();
        if state.committed.is_none() {
            state.committed = Some(from);
        }
        self.enqueue(&mut state, &handle, TransitionRequest::new(to, completion));
        Ok(())
    }

    /// Submit a transition and wait for its outcome.
    pub async fn update_and_wait(
        &self,
        from: impl Into<Snapshot<S, T>>,
        to: impl Into<Snapshot<S, T>>,
    ) -> UpdateResult<TransitionOutcome> {
        let (tx, rx) = oneshot::channel();
        self.update(
            from,
            to,
            Some(Box::new(move |outcome: &TransitionOutcome| {
                let _ = tx.send(*outcome);
            })),
        )?;
        rx.await
            .map_err(|_| UpdateError::Driver("transition dropped before completing".into()))
    }

    /// Request a full reload showing `to`.
    ///
    /// Coalesces with pending updates; the merged transition is reloaded.
    pub fn reload_data(
        &self,
        to: impl Into<Snapshot<S, T>>,
        completion: Option<Completion>,
    ) -> UpdateResult<()> {
        let to = to.into();
        check_sections_unique(to.as_slice(), Side::After)?;
        let handle = Handle::try_current().map_err(|_| UpdateError::NoRuntime)?;

        let mut request = TransitionRequest::new(to, completion);
        request.force_reload = true;
        let mut state = self.shared.lock();
        self.enqueue(&mut state, &handle, request);
        Ok(())
    }

    /// Mark sections as reloaded in the next transition.
    ///
    /// With nothing pending, schedules a transition to the latest submitted
    /// state. Does nothing before the first submission.
    pub fn reload_sections(&self, ids: impl IntoIterator<Item = S::Id>) -> UpdateResult<()> {
        let mut state = self.shared.lock();
        if let Some(pending) = state.pending.as_mut() {
            pending.reloaded_sections.extend(ids);
            debug!(
                sections = pending.reloaded_sections.len(),
                "section reloads merged into pending transition"
            );
            return Ok(());
        }
        let Some(target) = state.target.clone() else {
            return Ok(());
        };
        let handle = Handle::try_current().map_err(|_| UpdateError::NoRuntime)?;
        let mut request = TransitionRequest::new(target, None);
        request.reloaded_sections.extend(ids);
        self.enqueue(&mut state, &handle, request);
        Ok(())
    }

    pub fn set_options(&self, config: UpdaterConfig) {
        self.shared.lock().config = config;
    }

    pub fn config(&self) -> UpdaterConfig {
        self.shared.lock().config.clone()
    }

    pub fn set_delegate(&self, delegate: Arc<dyn UpdaterDelegate>) {
        self.shared.lock().delegate = Some(delegate);
    }

    pub fn clear_delegate(&self) {
        self.shared.lock().delegate = None;
    }

    /// The state the view last accepted.
    pub fn committed(&self) -> Option<Snapshot<S, T>> {
        self.shared.lock().committed.clone()
    }

    /// `true` when nothing is pending or being applied.
    pub fn is_idle(&self) -> bool {
        self.shared.lock().phase == Phase::Idle
    }

    fn enqueue(&self, state: &mut State<S, T>, handle: &Handle, request: TransitionRequest<S, T>) {
        state.target = Some(Arc::clone(&request.to));
        match state.pending.as_mut() {
            Some(pending) => {
                pending.merge(request);
                debug!(coalesced = pending.submissions, "submission coalesced");
            }
            None => state.pending = Some(request),
        }
        if state.phase == Phase::Idle {
            state.phase = Phase::Applying;
            handle.spawn(Arc::clone(&self.shared).drive());
        }
    }
}

impl<S: ListItem, T: ListItem> Shared<S, T> {
    fn lock(&self) -> MutexGuard<'_, State<S, T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drive(self: Arc<Self>) {
        let mut guard = DriverGuard {
            shared: Arc::clone(&self),
            armed: true,
        };
        // let synchronous submissions from the caller's turn coalesce
        tokio::task::yield_now().await;

        loop {
            let (request, committed, config, delegate, generation) = {
                let mut state = self.lock();
                let Some(request) = state.pending.take() else {
                    state.phase = Phase::Idle;
                    guard.armed = false;
                    return;
                };
                state.generation += 1;
                (
                    request,
                    state.committed.clone(),
                    state.config.clone(),
                    state.delegate.clone(),
                    state.generation,
                )
            };
            let TransitionRequest {
                to,
                completions,
                reloaded_sections,
                force_reload,
                submissions,
            } = request;

            info!(
                generation,
                coalesced = submissions,
                sections = to.len(),
                "transition started"
            );
            let transition = Transition {
                view: self.view.as_ref(),
                config: &config,
                delegate: delegate.as_deref(),
            };
            let (mode, applied, operations) = transition
                .run(committed, &to, reloaded_sections, force_reload)
                .await;

            if applied {
                self.lock().committed = Some(to);
            }
            let outcome = TransitionOutcome {
                generation,
                mode,
                applied,
                operations,
                coalesced: submissions,
            };
            info!(generation, ?mode, applied, operations, "transition committed");
            for completion in completions {
                if panic::catch_unwind(AssertUnwindSafe(|| completion(&outcome))).is_err() {
                    warn!(generation, "completion panicked");
                }
            }
        }
    }
}

/// Keeps the updater live when a driver task unwinds: hands pending work
/// to a fresh driver, or returns to idle.
struct DriverGuard<S: ListItem, T: ListItem> {
    shared: Arc<Shared<S, T>>,
    armed: bool,
}

impl<S: ListItem, T: ListItem> Drop for DriverGuard<S, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("update driver stopped before draining, restarting");
        let mut state = self.shared.lock();
        match Handle::try_current() {
            Ok(handle) if state.pending.is_some() => {
                handle.spawn(Arc::clone(&self.shared).drive());
            }
            _ => state.phase = Phase::Idle,
        }
    }
}

/// One transition's view of the updater, taken at the start of the
/// transition.
struct Transition<'a, S: ListItem, T: ListItem> {
    view: &'a dyn ListView<S, T>,
    config: &'a UpdaterConfig,
    delegate: Option<&'a dyn UpdaterDelegate>,
}

impl<S: ListItem, T: ListItem> Transition<'_, S, T> {
    async fn run(
        &self,
        committed: Option<Snapshot<S, T>>,
        to: &Snapshot<S, T>,
        reloaded: HashSet<S::Id>,
        force_reload: bool,
    ) -> (ApplyMode, bool, usize) {
        if force_reload {
            return self.reload(to, ReloadReason::Requested).await;
        }
        if self.config.allows_background_reloading && !self.view.is_attached() {
            return self.reload(to, ReloadReason::Detached).await;
        }

        let before = committed.unwrap_or_default();
        if let Some(d) = self.delegate {
            d.will_diff(before.len(), to.len());
        }
        let started = Instant::now();
        let planned = if self.config.background_diffing {
            let (after, config) = (Arc::clone(to), self.config.clone());
            tokio::task::spawn_blocking(move || {
                plan(before.as_slice(), after.as_slice(), &reloaded, &config)
            })
            .await
            .map_err(|e| UpdateError::Driver(e.to_string()))
            .and_then(|r| r.map_err(UpdateError::from))
        } else {
            plan(before.as_slice(), to.as_slice(), &reloaded, self.config)
                .map_err(UpdateError::from)
        };

        let batch = match planned {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "diff failed, reloading");
                self.recovered(&e);
                return self.reload(to, ReloadReason::DiffFailed).await;
            }
        };
        let operations = batch.len();
        debug!(elapsed = ?started.elapsed(), operations, %batch, "diff computed");
        if let Some(d) = self.delegate {
            d.did_diff(started.elapsed(), operations);
        }

        if self.config.exceeds_threshold(operations) {
            info!(
                operations,
                threshold = self.config.reload_threshold,
                "too many updates, reloading"
            );
            return self
                .reload(to, ReloadReason::TooManyUpdates { operations })
                .await;
        }

        if let Some(d) = self.delegate {
            d.will_apply(&batch);
        }
        match self.apply(&batch, to).await {
            Ok(()) => {
                if let Some(d) = self.delegate {
                    d.did_apply(true);
                }
                (ApplyMode::Batched, true, operations)
            }
            Err(e) => {
                warn!(error = %e, "view rejected batch, reloading");
                if let Some(d) = self.delegate {
                    d.did_apply(false);
                }
                self.recovered(&e.into());
                self.reload(to, ReloadReason::Rejected).await
            }
        }
    }

    async fn apply(&self, batch: &UpdateBatch, to: &[Section<S, T>]) -> ViewResult<()> {
        self.view.begin_updates().await?;
        let applied = self.view.apply(batch, to).await;
        let ended = self.view.end_updates().await;
        applied.and(ended)
    }

    async fn reload(&self, to: &[Section<S, T>], reason: ReloadReason) -> (ApplyMode, bool, usize) {
        debug!(%reason, sections = to.len(), "reloading");
        if let Some(d) = self.delegate {
            d.will_reload(reason);
        }
        let result = self.view.reload_all(to).await;
        if let Some(d) = self.delegate {
            d.did_reload(result.is_ok());
        }
        if let Err(e) = &result {
            warn!(error = %e, "reload failed, committed state unchanged");
            self.recovered(&e.clone().into());
        }
        (ApplyMode::Reloaded(reason), result.is_ok(), 0)
    }

    fn recovered(&self, error: &UpdateError) {
        if let Some(d) = self.delegate {
            d.did_recover(error);
        }
    }
}

fn plan<S: ListItem, T: ListItem>(
    before: &[Section<S, T>],
    after: &[Section<S, T>],
    reloaded: &HashSet<S::Id>,
    config: &UpdaterConfig,
) -> DiffResult<UpdateBatch> {
    let script = diff_sections(before, after)?;
    Ok(build_batch(&script, before, after, reloaded, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryListView, ViewCall};
    use async_trait::async_trait;
    use listkit_diff::{IndexPath, Keyed};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    type Header = Keyed<&'static str, u32>;
    type Row = Keyed<u32, &'static str>;
    type Sec = Section<Header, Row>;
    type View = InMemoryListView<Header, Row>;

    fn sec(id: &'static str, rows: &[(u32, &'static str)]) -> Sec {
        Section::new(
            Keyed::new(id, 0),
            rows.iter().map(|&(i, v)| Keyed::new(i, v)).collect(),
        )
    }

    fn flat(rows: &[(u32, &'static str)]) -> Vec<Sec> {
        vec![sec("main", rows)]
    }

    fn rows(n: u32) -> Vec<Sec> {
        vec![Section::new(
            Keyed::new("main", 0),
            (0..n).map(|i| Keyed::new(i, "x")).collect(),
        )]
    }

    fn setup(initial: Vec<Sec>, config: UpdaterConfig) -> (Arc<View>, ListUpdater<Header, Row>) {
        let view = Arc::new(View::with_sections(initial));
        let updater: ListUpdater<Header, Row> = ListUpdater::with_config(view.clone(), config);
        (view, updater)
    }

    type Log = Arc<Mutex<Vec<(u32, TransitionOutcome)>>>;

    fn recorder() -> (Log, impl Fn(u32) -> Option<Completion>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let make = move |tag: u32| -> Option<Completion> {
            let sink = sink.clone();
            Some(Box::new(move |o: &TransitionOutcome| {
                sink.lock().unwrap().push((tag, *o));
            }))
        };
        (log, make)
    }

    async fn settle(updater: &ListUpdater<Header, Row>) {
        while !updater.is_idle() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn bursts_coalesce_into_one_batch() {
        let s0 = flat(&[(1, "a"), (2, "b"), (3, "c")]);
        let s1 = flat(&[(3, "c"), (1, "a"), (4, "d")]);
        let s2 = flat(&[(3, "c"), (4, "d"), (5, "e")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());
        let (log, completion) = recorder();

        updater.update(s0.clone(), s1.clone(), completion(1)).unwrap();
        updater.update(s1, s2.clone(), completion(2)).unwrap();
        settle(&updater).await;

        assert_eq!(view.batch_count(), 1);
        assert_eq!(view.sections(), s2);
        assert_eq!(updater.committed().unwrap().as_slice(), s2.as_slice());

        let log = log.lock().unwrap();
        assert_eq!(log.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![1, 2]);
        let (_, outcome) = log[0];
        assert_eq!(outcome.mode, ApplyMode::Batched);
        assert!(outcome.applied);
        assert_eq!(outcome.coalesced, 2);
        assert_eq!(outcome.generation, 1);
        assert_eq!(log[1].1, outcome);
    }

    #[tokio::test]
    async fn reorder_scenario_batch() {
        let s0 = flat(&[(1, "a"), (2, "b"), (3, "c")]);
        let s1 = flat(&[(3, "c"), (1, "a"), (4, "d")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());

        let outcome = updater.update_and_wait(s0, s1.clone()).await.unwrap();
        assert_eq!(outcome.operations, 4);
        assert_eq!(view.sections(), s1);

        let Some(ViewCall::Apply(batch)) = view.calls().get(1).cloned() else {
            panic!("expected an apply call");
        };
        assert_eq!(batch.item_deletes.len(), 1);
        assert_eq!(batch.item_inserts.len(), 1);
        assert_eq!(batch.item_moves.len(), 2);
    }

    #[tokio::test]
    async fn threshold_falls_back_to_reload() {
        let (view, updater) = setup(rows(0), UpdaterConfig::default());
        let outcome = updater.update_and_wait(rows(0), rows(101)).await.unwrap();
        assert_eq!(
            outcome.mode,
            ApplyMode::Reloaded(ReloadReason::TooManyUpdates { operations: 101 })
        );
        assert_eq!(view.reload_count(), 1);
        assert_eq!(view.batch_count(), 0);

        let (view, updater) = setup(rows(0), UpdaterConfig::default());
        let outcome = updater.update_and_wait(rows(0), rows(99)).await.unwrap();
        assert_eq!(outcome.mode, ApplyMode::Batched);
        assert_eq!(outcome.operations, 99);
        assert_eq!(view.batch_count(), 1);
        assert_eq!(view.reload_count(), 0);
    }

    #[tokio::test]
    async fn threshold_disabled_applies_large_batches() {
        let (view, updater) = setup(rows(0), UpdaterConfig::no_fallbacks());
        let outcome = updater.update_and_wait(rows(0), rows(150)).await.unwrap();
        assert_eq!(outcome.mode, ApplyMode::Batched);
        assert_eq!(view.sections().first().map(Section::len), Some(150));
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl UpdaterDelegate for Events {
        fn will_diff(&self, _: usize, _: usize) {
            self.0.lock().unwrap().push("will_diff".into());
        }
        fn did_apply(&self, success: bool) {
            self.0.lock().unwrap().push(format!("did_apply {success}"));
        }
        fn will_reload(&self, reason: ReloadReason) {
            self.0.lock().unwrap().push(format!("will_reload {reason}"));
        }
        fn did_reload(&self, success: bool) {
            self.0.lock().unwrap().push(format!("did_reload {success}"));
        }
        fn did_recover(&self, _: &UpdateError) {
            self.0.lock().unwrap().push("did_recover".into());
        }
    }

    #[tokio::test]
    async fn detached_view_reloads_without_diffing() {
        let s0 = flat(&[(1, "a")]);
        let s1 = flat(&[(1, "a"), (2, "b")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());
        let events = Arc::new(Events::default());
        updater.set_delegate(events.clone());
        view.set_attached(false);

        let outcome = updater.update_and_wait(s0, s1.clone()).await.unwrap();
        assert_eq!(outcome.mode, ApplyMode::Reloaded(ReloadReason::Detached));
        assert_eq!(view.sections(), s1);
        assert_eq!(
            *events.0.lock().unwrap(),
            vec!["will_reload detached".to_string(), "did_reload true".to_string()]
        );
    }

    #[tokio::test]
    async fn rejected_batch_recovers_with_reload() {
        let s0 = flat(&[(1, "a")]);
        let s1 = flat(&[(2, "b")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());
        let events = Arc::new(Events::default());
        updater.set_delegate(events.clone());
        view.reject_next_batch();

        let outcome = updater.update_and_wait(s0, s1.clone()).await.unwrap();
        assert_eq!(outcome.mode, ApplyMode::Reloaded(ReloadReason::Rejected));
        assert!(outcome.applied);
        assert_eq!(view.sections(), s1);
        assert_eq!(updater.committed().unwrap().as_slice(), s1.as_slice());
        assert_eq!(
            *events.0.lock().unwrap(),
            vec![
                "will_diff".to_string(),
                "did_apply false".to_string(),
                "did_recover".to_string(),
                "will_reload rejected".to_string(),
                "did_reload true".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failed_reload_keeps_committed_state() {
        let s0 = flat(&[(1, "a")]);
        let s1 = flat(&[(2, "b")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());
        view.reject_next_batch();
        view.fail_reloads(true);

        let outcome = updater.update_and_wait(s0.clone(), s1).await.unwrap();
        assert!(!outcome.applied);
        assert_eq!(view.sections(), s0);
        assert_eq!(updater.committed().unwrap().as_slice(), s0.as_slice());
    }

    #[tokio::test]
    async fn duplicate_identifiers_are_rejected_synchronously() {
        let s0 = flat(&[(1, "a")]);
        let bad = flat(&[(5, "x"), (6, "y"), (5, "z")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());

        match updater.update(s0, bad, None) {
            Err(UpdateError::Diff(diff)) => assert_eq!(diff.identity(), "5"),
            other => panic!("expected a diff error, got {other:?}"),
        }
        assert!(updater.is_idle());
        assert!(updater.committed().is_none());
        assert!(view.calls().is_empty());
    }

    #[test]
    fn update_outside_runtime_fails() {
        let (_, updater) = setup(Vec::new(), UpdaterConfig::default());
        let err = updater.update(Vec::new(), flat(&[(1, "a")]), None).unwrap_err();
        assert!(matches!(err, UpdateError::NoRuntime));
    }

    /// A view whose `begin_updates` waits for a permit.
    struct GatedView {
        inner: View,
        gate: Semaphore,
    }

    #[async_trait]
    impl ListView<Header, Row> for GatedView {
        async fn begin_updates(&self) -> ViewResult<()> {
            self.gate
                .acquire()
                .await
                .map_err(|_| crate::error::ViewError::Unavailable)?
                .forget();
            self.inner.begin_updates().await
        }
        async fn apply(&self, batch: &UpdateBatch, data: &[Sec]) -> ViewResult<()> {
            self.inner.apply(batch, data).await
        }
        async fn end_updates(&self) -> ViewResult<()> {
            self.inner.end_updates().await
        }
        async fn reload_all(&self, data: &[Sec]) -> ViewResult<()> {
            self.inner.reload_all(data).await
        }
    }

    #[tokio::test]
    async fn submissions_during_apply_run_next() {
        let s0 = flat(&[(1, "a")]);
        let s1 = flat(&[(1, "a"), (2, "b")]);
        let s2 = flat(&[(2, "b"), (3, "c")]);
        let s3 = flat(&[(3, "c")]);
        let view = Arc::new(GatedView {
            inner: View::with_sections(s0.clone()),
            gate: Semaphore::new(0),
        });
        let updater: ListUpdater<Header, Row> = ListUpdater::new(view.clone());
        let (log, completion) = recorder();

        updater.update(s0, s1.clone(), completion(1)).unwrap();
        // let the driver start and block on the gate
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(!updater.is_idle());

        // arbitrary `from`: diffs start from the committed state
        updater.update(s1.clone(), s2, completion(2)).unwrap();
        updater.update(flat(&[(9, "stale")]), s3.clone(), completion(3)).unwrap();
        view.gate.add_permits(2);
        settle(&updater).await;

        assert_eq!(view.inner.batch_count(), 2);
        assert_eq!(view.inner.sections(), s3);
        let log = log.lock().unwrap();
        let tags: Vec<_> = log.iter().map(|(t, o)| (*t, o.generation)).collect();
        assert_eq!(tags, vec![(1, 1), (2, 2), (3, 2)]);
        assert_eq!(log[2].1.coalesced, 2);
    }

    #[tokio::test]
    async fn reload_data_coalesces_with_updates() {
        let s0 = flat(&[(1, "a")]);
        let s1 = flat(&[(2, "b")]);
        let s2 = flat(&[(3, "c")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());
        let (log, completion) = recorder();

        updater.update(s0, s1, completion(1)).unwrap();
        updater.reload_data(s2.clone(), completion(2)).unwrap();
        settle(&updater).await;

        assert_eq!(view.reload_count(), 1);
        assert_eq!(view.batch_count(), 0);
        assert_eq!(view.sections(), s2);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log
            .iter()
            .all(|(_, o)| o.mode == ApplyMode::Reloaded(ReloadReason::Requested)));
    }

    #[tokio::test]
    async fn reload_sections_after_commit() {
        let s0 = vec![sec("a", &[(1, "x"), (2, "y")]), sec("b", &[(3, "z")])];
        let config = UpdaterConfig {
            prefer_item_reloads_for_section_reloads: true,
            ..Default::default()
        };
        let (view, updater) = setup(s0.clone(), config);
        updater.update_and_wait(s0.clone(), s0.clone()).await.unwrap();
        view.take_calls();

        updater.reload_sections(["a"]).unwrap();
        settle(&updater).await;

        let calls = view.calls();
        let Some(ViewCall::Apply(batch)) = calls.get(1) else {
            panic!("expected an apply call, got {calls:?}");
        };
        assert_eq!(
            batch.item_reloads.iter().copied().collect::<Vec<_>>(),
            vec![IndexPath::new(0, 0), IndexPath::new(0, 1)]
        );
        assert_eq!(view.sections(), s0);
    }

    #[tokio::test]
    async fn reload_sections_merge_into_pending() {
        let s0 = vec![sec("a", &[(1, "x")]), sec("b", &[(3, "z")])];
        let s1 = vec![sec("a", &[(1, "x")]), sec("b", &[(3, "z"), (4, "w")])];
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());

        updater.update(s0, s1.clone(), None).unwrap();
        updater.reload_sections(["a"]).unwrap();
        settle(&updater).await;

        let Some(ViewCall::Apply(batch)) = view.calls().get(1).cloned() else {
            panic!("expected an apply call");
        };
        assert_eq!(batch.section_deletes.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(batch.section_inserts.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(batch.item_inserts.len(), 1);
        assert_eq!(view.sections(), s1);
    }

    #[tokio::test]
    async fn reload_sections_before_first_update_is_a_no_op() {
        let (view, updater) = setup(Vec::new(), UpdaterConfig::default());
        updater.reload_sections(["a"]).unwrap();
        assert!(updater.is_idle());
        assert!(view.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn background_diffing_applies_the_same_batch() {
        let s0 = flat(&[(1, "a"), (2, "b"), (3, "c")]);
        let s1 = flat(&[(3, "c"), (1, "A"), (4, "d")]);
        let config = UpdaterConfig {
            background_diffing: true,
            ..Default::default()
        };
        let (view, updater) = setup(s0.clone(), config);
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            updater.update_and_wait(s0, s1.clone()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(outcome.mode, ApplyMode::Batched);
        assert_eq!(view.sections(), s1);
    }

    #[tokio::test]
    async fn options_and_delegate_can_change() {
        let (_, updater) = setup(Vec::new(), UpdaterConfig::default());
        updater.set_options(UpdaterConfig::no_fallbacks());
        assert_eq!(updater.config(), UpdaterConfig::no_fallbacks());
        updater.set_delegate(Arc::new(Events::default()));
        updater.clear_delegate();
        assert!(updater.shared.lock().delegate.is_none());
    }

    #[tokio::test]
    async fn panicking_completion_does_not_stall_updates() {
        let s0 = flat(&[(1, "a")]);
        let s1 = flat(&[(1, "a"), (2, "b")]);
        let s2 = flat(&[(2, "b")]);
        let (view, updater) = setup(s0.clone(), UpdaterConfig::default());
        let (log, completion) = recorder();

        updater
            .update(
                s0,
                s1.clone(),
                Some(Box::new(|_: &TransitionOutcome| panic!("completion failed"))),
            )
            .unwrap();
        updater.update(s1.clone(), s1.clone(), completion(2)).unwrap();
        settle(&updater).await;
        assert_eq!(log.lock().unwrap().len(), 1);

        let outcome = tokio::time::timeout(
            Duration::from_millis(500),
            updater.update_and_wait(s1, s2.clone()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(outcome.mode, ApplyMode::Batched);
        assert_eq!(view.sections(), s2);
    }

    /// A view whose first `begin_updates` panics.
    struct PanicOnceView {
        inner: View,
        armed: AtomicBool,
    }

    #[async_trait]
    impl ListView<Header, Row> for PanicOnceView {
        async fn begin_updates(&self) -> ViewResult<()> {
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("view failed");
            }
            self.inner.begin_updates().await
        }
        async fn apply(&self, batch: &UpdateBatch, data: &[Sec]) -> ViewResult<()> {
            self.inner.apply(batch, data).await
        }
        async fn end_updates(&self) -> ViewResult<()> {
            self.inner.end_updates().await
        }
        async fn reload_all(&self, data: &[Sec]) -> ViewResult<()> {
            self.inner.reload_all(data).await
        }
    }

    #[tokio::test]
    async fn panicking_view_restarts_the_driver() {
        let s0 = flat(&[(1, "a")]);
        let s1 = flat(&[(1, "a"), (2, "b")]);
        let s2 = flat(&[(3, "c")]);
        let view = Arc::new(PanicOnceView {
            inner: View::with_sections(s0.clone()),
            armed: AtomicBool::new(true),
        });
        let updater: ListUpdater<Header, Row> = ListUpdater::new(view.clone());

        let lost = updater.update_and_wait(s0.clone(), s1).await;
        assert!(matches!(lost, Err(UpdateError::Driver(_))));
        settle(&updater).await;
        assert_eq!(updater.committed().unwrap().as_slice(), s0.as_slice());

        let outcome = tokio::time::timeout(
            Duration::from_millis(500),
            updater.update_and_wait(s0, s2.clone()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(outcome.mode, ApplyMode::Batched);
        assert_eq!(view.inner.sections(), s2);
    }
}
