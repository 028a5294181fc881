//! Row selection and guarded bulk actions.
//!
//! # Design
//! - The selection is a set of ids shared by clones of one [`SelectionController`].
//! - A bulk action never runs against an empty selection.
//! - The selection is cleared only after the action reports success; a failure leaves it
//!   untouched and hands the frozen request back for a retry.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};
use thiserror::Error;

use crate::client::ResourceClient;
use crate::entity::EntityId;
use crate::envelope::ensure_success;
use crate::error::RequestError;
use crate::liveness::Liveness;

/// Frozen input of one bulk action.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkActionRequest {
    selected_ids: Vec<EntityId>,
    payload: Value,
}

impl BulkActionRequest {
    /// Ids the action targets, in ascending order.
    #[must_use]
    pub fn selected_ids(&self) -> &[EntityId] {
        &self.selected_ids
    }

    /// Body sent to the bulk endpoint.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }
}

/// `{"ids": [...]}` with integer-looking ids kept numeric.
#[must_use]
pub fn ids_payload(ids: &[EntityId]) -> Value {
    json!({ "ids": ids.iter().map(EntityId::to_json).collect::<Vec<_>>() })
}

/// Result of a guarded bulk action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Nothing was selected; the action was not called.
    Skipped,
    /// The action succeeded and the selection was cleared.
    Completed {
        /// Number of ids the action targeted.
        affected: usize,
        /// The page no longer reflects the server and must be fetched again.
        refetch_required: bool,
    },
    /// The owner went away; nothing was mutated.
    Detached,
}

/// A bulk action failed; the selection was left intact.
#[derive(Debug, Error)]
#[error("bulk action on {} row(s) failed: {source}", .request.selected_ids.len())]
pub struct BulkActionError {
    /// Underlying failure.
    #[source]
    pub source: RequestError,
    /// The request that failed, for a retry.
    pub request: BulkActionRequest,
}

/// Selected row ids for one screen.
#[derive(Clone, Debug, Default)]
pub struct SelectionController {
    selected: Arc<Mutex<BTreeSet<EntityId>>>,
    liveness: Liveness,
}

impl SelectionController {
    /// Empty selection bound to a screen's liveness.
    #[must_use]
    pub fn new(liveness: Liveness) -> Self {
        Self {
            selected: Arc::default(),
            liveness,
        }
    }

    /// Add ids to the selection.
    pub fn select(&self, ids: impl IntoIterator<Item = EntityId>) {
        self.lock().extend(ids);
    }

    /// Flip one id; returns whether it is now selected.
    pub fn toggle(&self, id: EntityId) -> bool {
        let mut selected = self.lock();
        if selected.remove(&id) {
            false
        } else {
            selected.insert(id);
            true
        }
    }

    /// Select every id in `visible`, or clear when all of them are already selected.
    pub fn select_all_or_clear(&self, visible: &[EntityId]) {
        let mut selected = self.lock();
        if !visible.is_empty() && visible.iter().all(|id| selected.contains(id)) {
            selected.clear();
        } else {
            *selected = visible.iter().cloned().collect();
        }
    }

    /// Drop every selected id.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Keep only ids present on the page; returns how many were dropped.
    pub fn prune(&self, page_ids: &[EntityId]) -> usize {
        let keep: BTreeSet<&EntityId> = page_ids.iter().collect();
        let mut selected = self.lock();
        let before = selected.len();
        selected.retain(|id| keep.contains(id));
        before - selected.len()
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.lock().contains(id)
    }

    /// Number of selected ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Selected ids in ascending order.
    #[must_use]
    pub fn selected(&self) -> Vec<EntityId> {
        self.lock().iter().cloned().collect()
    }

    /// Freeze the selection into a request; `None` when nothing is selected.
    pub fn snapshot(
        &self,
        payload: impl FnOnce(&[EntityId]) -> Value,
    ) -> Option<BulkActionRequest> {
        let selected_ids = self.selected();
        if selected_ids.is_empty() {
            return None;
        }
        let payload = payload(&selected_ids);
        Some(BulkActionRequest {
            selected_ids,
            payload,
        })
    }

    /// Run `action` against the current selection.
    ///
    /// # Errors
    /// Returns [`BulkActionError`] when `action` fails. The selection is left as it was.
    pub async fn invoke<F, Fut>(
        &self,
        payload: impl FnOnce(&[EntityId]) -> Value,
        action: F,
    ) -> Result<BulkOutcome, BulkActionError>
    where
        F: FnOnce(BulkActionRequest) -> Fut,
        Fut: Future<Output = Result<(), RequestError>>,
    {
        if !self.liveness.is_alive() {
            return Ok(BulkOutcome::Detached);
        }
        let Some(request) = self.snapshot(payload) else {
            tracing::debug!("bulk action skipped with empty selection");
            return Ok(BulkOutcome::Skipped);
        };

        let result = action(request.clone()).await;
        if !self.liveness.is_alive() {
            tracing::debug!("bulk action finished after detach; selection untouched");
            return Ok(BulkOutcome::Detached);
        }
        match result {
            Ok(()) => {
                self.clear();
                let affected = request.selected_ids.len();
                tracing::info!(affected, "bulk action completed");
                Ok(BulkOutcome::Completed {
                    affected,
                    refetch_required: true,
                })
            }
            Err(source) => {
                tracing::warn!(error = %source, "bulk action failed; selection kept");
                Err(BulkActionError { source, request })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<EntityId>> {
        self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `POST` endpoint that applies one bulk action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkEndpoint {
    /// Path relative to the API base.
    pub path: String,
}

impl BulkEndpoint {
    /// Endpoint at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Post the payload and check the response envelope.
    ///
    /// # Errors
    /// Any [`RequestError`] from the client, or [`RequestError::Rejected`] for an error envelope.
    pub async fn execute(
        &self,
        client: &ResourceClient,
        request: &BulkActionRequest,
    ) -> Result<(), RequestError> {
        let body = client.post(&self.path, request.payload()).await?;
        ensure_success(&body)
    }
}
