//! Paginated collection store.
//!
//! # Design
//! - A page is replaced wholesale on every fetch; rows are never patched in place.
//! - Each `load` takes a generation number under the lock. Only the latest generation may
//!   commit, so a slow early response can never overwrite a newer one.
//! - `Loading` is set before the request starts. A drop guard restores the settled state if
//!   the load future is abandoned, so no exit path leaves the flag stuck.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::client::ResourceClient;
use crate::entity::{DecodeEntity, Entity, EntityId};
use crate::envelope::{EnvelopeShape, EnvelopeStatus, envelope_message, normalize};
use crate::error::{ErrorKind, RequestError};
use crate::liveness::Liveness;
use crate::paging::{PageIndex, PageRequest, PageSize, clamp_index, page_count};

/// One page of entities plus pagination metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<E> {
    /// Rows in server order; never longer than `size`.
    pub entities: Vec<E>,
    /// Zero-based index of this page.
    pub index: PageIndex,
    /// Page size the page was requested with.
    pub size: PageSize,
    /// Total rows across all pages.
    pub total: usize,
}

impl<E> Page<E> {
    /// Empty page at the given position.
    #[must_use]
    pub const fn empty(index: PageIndex, size: PageSize) -> Self {
        Self {
            entities: Vec::new(),
            index,
            size,
            total: 0,
        }
    }

    /// Number of pages available for the reported total.
    #[must_use]
    pub fn page_count(&self) -> usize {
        page_count(self.total, self.size)
    }

    /// Whether this page carries no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<E: Entity> Page<E> {
    /// Identifiers of the rows on this page.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(Entity::id).collect()
    }
}

/// Why the last load failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadFailure {
    /// Error classification.
    pub kind: ErrorKind,
    /// Message suitable for display.
    pub message: String,
    /// Whether offering a retry makes sense.
    pub retryable: bool,
}

impl From<&RequestError> for LoadFailure {
    fn from(err: &RequestError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Store lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing requested yet.
    Idle,
    /// A request is in flight.
    Loading,
    /// The current page reflects the last completed request.
    Loaded,
    /// The last request failed.
    Errored(LoadFailure),
}

/// Result of one `load` call.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    /// A new page was committed.
    Loaded {
        /// Index actually committed (may differ from the request).
        index: PageIndex,
        /// `true` when the server (or local clamping) moved the page index.
        index_corrected: bool,
        /// Rows on the committed page.
        rows: usize,
        /// Total rows reported.
        total: usize,
    },
    /// The request failed; state was updated accordingly.
    Failed(RequestError),
    /// A newer load superseded this one; nothing was committed.
    Stale,
    /// The owning screen went away; nothing was committed.
    Detached,
}

struct StoreState<E> {
    page: Page<E>,
    state: LoadState,
    generation: u64,
    loaded_once: bool,
}

impl<E> StoreState<E> {
    fn settled_state(&self) -> LoadState {
        if self.loaded_once {
            LoadState::Loaded
        } else {
            LoadState::Idle
        }
    }
}

/// Holds the current page of one screen.
pub struct CollectionStore<E> {
    shared: Arc<Mutex<StoreState<E>>>,
    liveness: Liveness,
}

impl<E> Clone for CollectionStore<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            liveness: self.liveness.clone(),
        }
    }
}

impl<E> fmt::Debug for CollectionStore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CollectionStore")
            .field("state", &state.state)
            .field("index", &state.page.index)
            .field("rows", &state.page.entities.len())
            .field("total", &state.page.total)
            .finish()
    }
}

impl<E> CollectionStore<E> {
    /// Empty store in the `Idle` state.
    #[must_use]
    pub fn new(size: PageSize, liveness: Liveness) -> Self {
        Self {
            shared: Arc::new(Mutex::new(StoreState {
                page: Page::empty(PageIndex::FIRST, size),
                state: LoadState::Idle,
                generation: 0,
                loaded_once: false,
            })),
            liveness,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.lock().state.clone()
    }

    /// Whether a request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().state == LoadState::Loading
    }

    /// Index of the committed page.
    #[must_use]
    pub fn index(&self) -> PageIndex {
        self.lock().page.index
    }

    /// Total rows of the committed page.
    #[must_use]
    pub fn total(&self) -> usize {
        self.lock().page.total
    }

    /// Read the committed page.
    pub fn with_page<R>(&self, read: impl FnOnce(&Page<E>) -> R) -> R {
        read(&self.lock().page)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<E>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.state = LoadState::Loading;
        state.generation
    }
}

impl<E: Entity + DecodeEntity> CollectionStore<E> {
    /// Fetch one page from `endpoint` and commit it if this is still the latest request.
    pub async fn load(
        &self,
        client: &ResourceClient,
        endpoint: &str,
        request: &PageRequest,
    ) -> LoadOutcome {
        let generation = self.begin();
        let mut guard = LoadingGuard {
            shared: &self.shared,
            generation,
            settled: false,
        };

        let result = client.get(endpoint, &request.query_pairs()).await;
        let prepared = result.and_then(|body| prepare_page::<E>(body, request));

        let mut state = self.lock();
        guard.settled = true;
        if state.generation != generation {
            tracing::debug!(
                endpoint,
                generation,
                latest = state.generation,
                "discarding stale page"
            );
            return LoadOutcome::Stale;
        }
        if !self.liveness.is_alive() {
            tracing::debug!(endpoint, "screen detached; dropping page");
            state.state = state.settled_state();
            return LoadOutcome::Detached;
        }

        match prepared {
            Ok(prepared) => {
                let index_corrected = prepared.page.index != request.index;
                if index_corrected {
                    tracing::info!(
                        endpoint,
                        requested = request.index.get(),
                        actual = prepared.page.index.get(),
                        "page index corrected to match the server"
                    );
                }
                let outcome = LoadOutcome::Loaded {
                    index: prepared.page.index,
                    index_corrected,
                    rows: prepared.page.entities.len(),
                    total: prepared.page.total,
                };
                state.page = prepared.page;
                state.state = LoadState::Loaded;
                state.loaded_once = true;
                outcome
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::Unauthenticated => {
                        state.page = Page::empty(request.index, request.size);
                        state.state = LoadState::Loaded;
                        state.loaded_once = true;
                    }
                    ErrorKind::SessionInvalid => {
                        state.page = Page::empty(request.index, request.size);
                        state.state = LoadState::Errored(LoadFailure::from(&err));
                    }
                    ErrorKind::NetworkOrServer => {
                        tracing::warn!(
                            endpoint,
                            error = %err,
                            "keeping last page after failed load"
                        );
                        state.state = LoadState::Errored(LoadFailure::from(&err));
                    }
                }
                LoadOutcome::Failed(err)
            }
        }
    }
}

struct PreparedPage<E> {
    page: Page<E>,
}

fn prepare_page<E: DecodeEntity>(
    body: Value,
    request: &PageRequest,
) -> Result<PreparedPage<E>, RequestError> {
    if EnvelopeStatus::of(&body) == EnvelopeStatus::Error {
        return Err(RequestError::Rejected {
            message: envelope_message(&body).unwrap_or_else(|| "list request was rejected".into()),
        });
    }
    let normalized = normalize(body);
    let shape = normalized.shape;
    let reported_total = normalized.total;
    let reported_page = normalized.current_page;
    let size = request.size;
    let mut entities: Vec<E> = normalized.decode();

    if shape == EnvelopeShape::Flat && reported_page.is_none() {
        let total = entities.len();
        let index = clamp_index(request.index, total, size);
        let entities = entities
            .into_iter()
            .skip(index.get() * size.get())
            .take(size.get())
            .collect();
        return Ok(PreparedPage {
            page: Page {
                entities,
                index,
                size,
                total,
            },
        });
    }

    if entities.len() > size.get() {
        tracing::warn!(
            received = entities.len(),
            page_size = size.get(),
            "server returned more rows than requested; truncating"
        );
        entities.truncate(size.get());
    }
    let total = reported_total.unwrap_or(entities.len()).max(entities.len());
    let index = reported_page.map_or(request.index, |page| page.to_index());
    Ok(PreparedPage {
        page: Page {
            entities,
            index,
            size,
            total,
        },
    })
}

struct LoadingGuard<'a, E> {
    shared: &'a Mutex<StoreState<E>>,
    generation: u64,
    settled: bool,
}

impl<E> Drop for LoadingGuard<'_, E> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.generation && state.state == LoadState::Loading {
            state.state = state.settled_state();
            tracing::debug!(generation = self.generation, "abandoned load cleared loading flag");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Record;
    use crate::testing::client_for;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn request(index: usize, size: usize) -> PageRequest {
        PageRequest::new(PageIndex::new(index), PageSize::new(size))
    }

    fn store() -> CollectionStore<Record> {
        CollectionStore::new(PageSize::new(10), Liveness::new())
    }

    #[tokio::test]
    async fn total_defaults_to_row_count() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/leads");
            then.status(200)
                .json_body(json!({"data": [{"id": "a"}, {"id": "b"}, {"id": "c"}]}));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let store = store();

        let outcome = store.load(&client, "/leads", &request(0, 10)).await;

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                index: PageIndex::FIRST,
                index_corrected: false,
                rows: 3,
                total: 3
            }
        );
        assert_eq!(store.total(), 3);
        assert_eq!(store.state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn sends_one_based_page_and_adopts_server_page() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/employees")
                .query_param("page", "9")
                .query_param("per_page", "5");
            then.status(200).json_body(json!({
                "status": "success",
                "data": {"data": [{"id": 41}, {"id": 42}], "total": 22, "current_page": 5}
            }));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let store = store();

        let outcome = store.load(&client, "/employees", &request(8, 5)).await;

        mock.assert();
        assert!(matches!(
            outcome,
            LoadOutcome::Loaded { index, index_corrected: true, .. } if index == PageIndex::new(4)
        ));
        assert_eq!(store.index(), PageIndex::new(4));
        assert_eq!(store.with_page(Page::page_count), 5);
    }

    #[tokio::test]
    async fn flat_arrays_are_paginated_locally() {
        let server = MockServer::start_async().await;
        let rows: Vec<_> = (1..=12).map(|id| json!({"id": id})).collect();
        server.mock(move |when, then| {
            when.method(GET).path("/activity-tracking");
            then.status(200).json_body(json!(rows));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let store = store();

        let outcome = store
            .load(&client, "/activity-tracking", &request(7, 5))
            .await;

        assert!(matches!(
            outcome,
            LoadOutcome::Loaded { index_corrected: true, rows: 2, total: 12, .. }
        ));
        let ids = store.with_page(Page::ids);
        assert_eq!(ids, vec![EntityId::from("11"), EntityId::from("12")]);
    }

    #[tokio::test]
    async fn short_flat_array_moves_back_to_its_only_page() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/activity-tracking");
            then.status(200)
                .json_body(json!([{"id": 1}, {"id": 2}, {"id": 3}]));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let store = store();

        let outcome = store
            .load(&client, "/activity-tracking", &request(4, 10))
            .await;

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                index: PageIndex::FIRST,
                index_corrected: true,
                rows: 3,
                total: 3
            }
        );
        assert_eq!(store.index(), PageIndex::FIRST);
        assert_eq!(store.with_page(Page::page_count), 1);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_last_good_page() {
        let server = MockServer::start_async().await;
        let mut ok = server.mock(|when, then| {
            when.method(GET).path("/attendance/report");
            then.status(200).json_body(json!([{"id": 1}]));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let store = store();
        store.load(&client, "/attendance/report", &request(0, 10)).await;
        ok.delete();
        server.mock(|when, then| {
            when.method(GET).path("/attendance/report");
            then.status(500).json_body(json!({"message": "db down"}));
        });

        let outcome = store.load(&client, "/attendance/report", &request(0, 10)).await;

        assert!(matches!(outcome, LoadOutcome::Failed(RequestError::Http { status: 500, .. })));
        assert_eq!(store.with_page(|page| page.entities.len()), 1);
        assert!(matches!(
            store.state(),
            LoadState::Errored(LoadFailure {
                kind: ErrorKind::NetworkOrServer,
                retryable: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn error_envelope_is_a_failed_load() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/leads");
            then.status(200)
                .json_body(json!({"status": "error", "message": "report unavailable"}));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let store = store();
        let outcome = store.load(&client, "/leads", &request(0, 10)).await;
        assert_eq!(
            outcome,
            LoadOutcome::Failed(RequestError::Rejected {
                message: "report unavailable".into()
            })
        );
    }

    #[tokio::test]
    async fn unauthenticated_is_an_empty_result() {
        let (client, _, _) = client_for("http://127.0.0.1:9", None);
        let store = store();
        let outcome = store.load(&client, "/employees", &request(0, 10)).await;
        assert_eq!(outcome, LoadOutcome::Failed(RequestError::Unauthenticated));
        assert_eq!(store.state(), LoadState::Loaded);
        assert!(store.with_page(Page::is_empty));
    }

    #[tokio::test]
    async fn session_invalid_empties_page_and_errors() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.any_request();
            then.status(401);
        });
        let (client, _, navigator) = client_for(&server.base_url(), Some("tok"));
        let store = store();
        let outcome = store.load(&client, "/employees", &request(0, 10)).await;
        assert_eq!(
            outcome,
            LoadOutcome::Failed(RequestError::SessionInvalid { status: 401 })
        );
        assert!(matches!(
            store.state(),
            LoadState::Errored(LoadFailure { kind: ErrorKind::SessionInvalid, .. })
        ));
        assert_eq!(navigator.visits().len(), 1);
    }

    #[tokio::test]
    async fn detached_store_does_not_commit() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.any_request();
            then.status(200).json_body(json!([{"id": 1}]));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let liveness = Liveness::new();
        let store: CollectionStore<Record> =
            CollectionStore::new(PageSize::new(10), liveness.clone());
        liveness.detach();

        let outcome = store.load(&client, "/employees", &request(0, 10)).await;

        assert_eq!(outcome, LoadOutcome::Detached);
        assert!(store.with_page(Page::is_empty));
        assert_eq!(store.state(), LoadState::Idle);
    }

    #[tokio::test]
    async fn abandoned_load_clears_loading() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.any_request();
            then.status(200)
                .delay(Duration::from_secs(5))
                .json_body(json!([]));
        });
        let (client, _, _) = client_for(&server.base_url(), Some("tok"));
        let store = store();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            store.load(&client, "/slow", &request(0, 10)),
        )
        .await;

        assert!(abandoned.is_err());
        assert!(!store.is_loading());
        assert_eq!(store.state(), LoadState::Idle);
    }
}
