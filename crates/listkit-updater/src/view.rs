use async_trait::async_trait;
use listkit_diff::{Diffable, Section};

use crate::batch::UpdateBatch;
use crate::error::ViewResult;

/// Bounds shared by section headers and rows handed to the updater.
pub trait ListItem: Diffable<Id: Send + Sync + 'static> + Clone + Send + Sync + 'static {}

impl<T> ListItem for T
where
    T: Diffable + Clone + Send + Sync + 'static,
    T::Id: Send + Sync + 'static,
{
}

/// The externally owned list the updater drives.
///
/// One transition issues either `begin_updates`, `apply`, `end_updates` in
/// that order, or a single `reload_all`. Calls never interleave across
/// transitions.
#[async_trait]
pub trait ListView<S: ListItem, T: ListItem>: Send + Sync {
    /// Whether the list is attached to a display surface. A detached list
    /// may be reloaded wholesale instead of animated.
    fn is_attached(&self) -> bool {
        true
    }

    /// Open a batch.
    async fn begin_updates(&self) -> ViewResult<()>;

    /// Stage the batch together with the data it leads to.
    async fn apply(&self, batch: &UpdateBatch, data: &[Section<S, T>]) -> ViewResult<()>;

    /// Close the batch. An inconsistent batch is reported here.
    async fn end_updates(&self) -> ViewResult<()>;

    /// Discard the displayed state and show `data`.
    async fn reload_all(&self, data: &[Section<S, T>]) -> ViewResult<()>;
}
