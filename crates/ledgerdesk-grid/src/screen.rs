//! One list screen: page store, filters, selection, and columns wired together.
//!
//! # Design
//! - Each screen owns its store, filter state, selection, and liveness flag; nothing is shared
//!   between screen instances except the client.
//! - Page and server-filter changes go to the network; local filter changes never do.
//! - After every committed load the selection is pruned to the ids on the new page.
//! - `unmount` detaches the screen. Loads and bulk actions still in flight then commit nothing.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::client::ResourceClient;
use crate::entity::{DecodeEntity, Entity, EntityId};
use crate::error::ErrorKind;
use crate::filter::{FilterSchema, FilterState, apply};
use crate::liveness::Liveness;
use crate::paging::{PageIndex, PageRequest, PageSize, ServerQuery};
use crate::present::{ColumnSpec, Presenter};
use crate::selection::{BulkActionError, BulkEndpoint, BulkOutcome, SelectionController};
use crate::store::{CollectionStore, LoadOutcome, LoadState, Page};

/// One rendered row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresentedRow {
    /// Row identity.
    pub id: EntityId,
    /// Whether the row is in the selection.
    pub selected: bool,
    /// Display values in column order.
    pub cells: Vec<String>,
}

/// What a screen should show right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScreenView {
    /// Not loaded yet.
    Idle,
    /// A request is in flight.
    Loading,
    /// The load succeeded but no rows are visible.
    Empty,
    /// The last load failed. `rows` holds the last good page, if any.
    Error {
        /// Message for the user.
        message: String,
        /// Whether a retry makes sense.
        retryable: bool,
        /// Last known good rows, after filtering.
        rows: Vec<PresentedRow>,
    },
    /// Visible rows after filtering.
    Rows(Vec<PresentedRow>),
}

struct Cursor {
    request: PageRequest,
    revision: u64,
}

/// Generic list screen over entities of type `E`.
pub struct Screen<E> {
    client: ResourceClient,
    endpoint: String,
    schema: FilterSchema<E>,
    columns: Vec<ColumnSpec>,
    presenter: Presenter,
    store: CollectionStore<E>,
    selection: SelectionController,
    filter: Mutex<FilterState>,
    cursor: Mutex<Cursor>,
    liveness: Liveness,
}

impl<E> fmt::Debug for Screen<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("endpoint", &self.endpoint)
            .field("store", &self.store)
            .field("selected", &self.selection.len())
            .finish_non_exhaustive()
    }
}

impl<E> Screen<E> {
    /// Screen listing `endpoint` with default page size.
    #[must_use]
    pub fn new(
        client: ResourceClient,
        endpoint: impl Into<String>,
        schema: FilterSchema<E>,
        columns: Vec<ColumnSpec>,
    ) -> Self {
        let liveness = Liveness::new();
        let size = PageSize::default();
        Self {
            client,
            endpoint: endpoint.into(),
            schema,
            columns,
            presenter: Presenter::new(),
            store: CollectionStore::new(size, liveness.clone()),
            selection: SelectionController::new(liveness.clone()),
            filter: Mutex::new(FilterState::default()),
            cursor: Mutex::new(Cursor {
                request: PageRequest::new(PageIndex::FIRST, size),
                revision: 0,
            }),
            liveness,
        }
    }

    /// Use a different presenter (placeholder, clock).
    #[must_use]
    pub fn with_presenter(mut self, presenter: Presenter) -> Self {
        self.presenter = presenter;
        self
    }

    /// Start from a specific page request instead of the first page.
    #[must_use]
    pub fn with_request(self, request: PageRequest) -> Self {
        {
            let mut cursor = self.cursor_lock();
            cursor.request = request;
        }
        self
    }

    /// Endpoint the screen lists.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Column definitions in display order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Filter schema.
    #[must_use]
    pub const fn schema(&self) -> &FilterSchema<E> {
        &self.schema
    }

    /// Page store.
    #[must_use]
    pub const fn store(&self) -> &CollectionStore<E> {
        &self.store
    }

    /// Row selection.
    #[must_use]
    pub const fn selection(&self) -> &SelectionController {
        &self.selection
    }

    /// Store lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.store.state()
    }

    /// Request the next load will send.
    #[must_use]
    pub fn request(&self) -> PageRequest {
        self.cursor_lock().request.clone()
    }

    /// Current filter state.
    #[must_use]
    pub fn filter(&self) -> FilterState {
        self.filter_lock().clone()
    }

    /// Replace the local filter state. No network access.
    pub fn set_filter(&self, state: FilterState) {
        *self.filter_lock() = state;
    }

    /// Whether the screen is still mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Tear the screen down; in-flight work commits nothing afterwards.
    pub fn unmount(&self) {
        tracing::debug!(endpoint = %self.endpoint, "screen unmounted");
        self.liveness.detach();
    }

    /// Number of pages for the committed total.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.store.with_page(Page::page_count)
    }

    fn cursor_lock(&self) -> MutexGuard<'_, Cursor> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn filter_lock(&self) -> MutexGuard<'_, FilterState> {
        self.filter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, change: impl FnOnce(&mut PageRequest)) -> (PageRequest, u64) {
        let mut cursor = self.cursor_lock();
        change(&mut cursor.request);
        cursor.revision += 1;
        (cursor.request.clone(), cursor.revision)
    }
}

impl<E: Entity> Screen<E> {
    /// Ids of the rows on the committed page.
    #[must_use]
    pub fn page_ids(&self) -> Vec<EntityId> {
        self.store.with_page(Page::ids)
    }

    /// Rows of the committed page that pass the local filters.
    #[must_use]
    pub fn visible(&self) -> Vec<E>
    where
        E: Clone,
    {
        let filter = self.filter();
        self.store.with_page(|page| {
            apply(&page.entities, &self.schema, &filter)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Ids of the visible rows, for "select all".
    #[must_use]
    pub fn visible_ids(&self) -> Vec<EntityId> {
        let filter = self.filter();
        self.store.with_page(|page| {
            apply(&page.entities, &self.schema, &filter)
                .into_iter()
                .map(Entity::id)
                .collect()
        })
    }

    /// Render the current state.
    #[must_use]
    pub fn view(&self) -> ScreenView {
        match self.store.state() {
            LoadState::Idle => ScreenView::Idle,
            LoadState::Loading => ScreenView::Loading,
            LoadState::Errored(failure) => ScreenView::Error {
                message: failure.message,
                retryable: failure.retryable,
                rows: self.rows(),
            },
            LoadState::Loaded => {
                let rows = self.rows();
                if rows.is_empty() {
                    ScreenView::Empty
                } else {
                    ScreenView::Rows(rows)
                }
            }
        }
    }

    fn rows(&self) -> Vec<PresentedRow> {
        let filter = self.filter();
        self.store.with_page(|page| {
            apply(&page.entities, &self.schema, &filter)
                .into_iter()
                .map(|entity| {
                    let id = entity.id();
                    PresentedRow {
                        selected: self.selection.contains(&id),
                        cells: self.presenter.present_row(entity, &self.columns),
                        id,
                    }
                })
                .collect()
        })
    }
}

impl<E: Entity + DecodeEntity> Screen<E> {
    /// First load after the screen appears.
    pub async fn mount(&self) -> LoadOutcome {
        tracing::debug!(endpoint = %self.endpoint, "screen mounted");
        self.refetch().await
    }

    /// Load the current request again.
    pub async fn refetch(&self) -> LoadOutcome {
        let (request, revision) = self.update(|_| {});
        self.load(request, revision).await
    }

    /// Move to another page.
    pub async fn set_page(&self, index: PageIndex) -> LoadOutcome {
        let (request, revision) = self.update(|request| request.index = index);
        self.load(request, revision).await
    }

    /// Change the page size and go back to the first page.
    pub async fn set_page_size(&self, size: PageSize) -> LoadOutcome {
        let (request, revision) = self.update(|request| {
            request.size = size;
            request.index = PageIndex::FIRST;
        });
        self.load(request, revision).await
    }

    /// Replace the server-side filters and go back to the first page.
    pub async fn set_server_query(&self, query: ServerQuery) -> LoadOutcome {
        let (request, revision) = self.update(|request| {
            request.query = query;
            request.index = PageIndex::FIRST;
        });
        self.load(request, revision).await
    }

    /// Run a bulk action on the selection, then reload when it succeeded.
    ///
    /// # Errors
    /// Returns [`BulkActionError`] when the endpoint fails; the selection is left intact.
    pub async fn run_bulk(
        &self,
        endpoint: &BulkEndpoint,
        payload: impl FnOnce(&[EntityId]) -> Value,
    ) -> Result<BulkOutcome, BulkActionError> {
        let client = &self.client;
        let outcome = self
            .selection
            .invoke(payload, |request| async move {
                endpoint.execute(client, &request).await
            })
            .await?;
        if let BulkOutcome::Completed {
            refetch_required: true,
            ..
        } = outcome
        {
            self.refetch().await;
        }
        Ok(outcome)
    }

    async fn load(&self, request: PageRequest, revision: u64) -> LoadOutcome {
        let outcome = self.store.load(&self.client, &self.endpoint, &request).await;
        match &outcome {
            LoadOutcome::Loaded {
                index,
                index_corrected,
                ..
            } => {
                if *index_corrected {
                    let mut cursor = self.cursor_lock();
                    if cursor.revision == revision {
                        cursor.request.index = *index;
                    }
                }
                self.prune_selection();
            }
            LoadOutcome::Failed(err) if err.kind() != ErrorKind::NetworkOrServer => {
                self.prune_selection();
            }
            LoadOutcome::Failed(_) | LoadOutcome::Stale | LoadOutcome::Detached => {}
        }
        outcome
    }

    fn prune_selection(&self) {
        let dropped = self.selection.prune(&self.page_ids());
        if dropped > 0 {
            tracing::debug!(endpoint = %self.endpoint, dropped, "selection pruned to page");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Record;
    use crate::present::Formatter;
    use crate::selection::ids_payload;
    use crate::testing::client_for;
    use httpmock::prelude::*;
    use serde_json::json;

    fn screen(base_url: &str, token: Option<&str>) -> Screen<Record> {
        let (client, _, _) = client_for(base_url, token);
        Screen::new(
            client,
            "/employees",
            FilterSchema::new().search(["name", "department.name"]),
            vec![
                ColumnSpec::new("name", "Name", "name"),
                ColumnSpec::new("dept", "Department", "department.name"),
                ColumnSpec::new("worked", "Worked", "worked_seconds").format(Formatter::Duration),
            ],
        )
    }

    #[tokio::test]
    async fn starts_idle_and_renders_rows_after_mount() {
        let server = MockServer::start_async().await;
        let list = server.mock(|when, then| {
            when.method(GET)
                .path("/employees")
                .query_param("page", "1")
                .query_param("per_page", "10");
            then.status(200).json_body(json!({
                "status": "success",
                "data": {"data": [
                    {"id": 1, "name": "Ana", "department": {"name": "Ops"}, "worked_seconds": 3661},
                    {"id": 2, "name": "Bo"}
                ], "total": 2, "current_page": 1}
            }));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        assert_eq!(screen.view(), ScreenView::Idle);

        let outcome = screen.mount().await;
        list.assert();
        assert!(matches!(outcome, LoadOutcome::Loaded { rows: 2, .. }));
        let ScreenView::Rows(rows) = screen.view() else {
            panic!("expected rows");
        };
        assert_eq!(rows[0].cells, vec!["Ana", "Ops", "1h 1m"]);
        assert_eq!(rows[1].cells, vec!["Bo", "—", "0h 0m"]);
    }

    #[tokio::test]
    async fn local_filter_narrows_without_network() {
        let server = MockServer::start_async().await;
        let list = server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(200)
                .json_body(json!([{"id": 1, "name": "Ana"}, {"id": 2, "name": "Bo"}]));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        screen.mount().await;
        screen.set_filter(FilterState {
            query: "zed".into(),
            ..FilterState::default()
        });
        assert_eq!(screen.view(), ScreenView::Empty);
        screen.set_filter(FilterState {
            query: "an".into(),
            ..FilterState::default()
        });
        assert_eq!(screen.visible_ids(), vec![EntityId::from(1)]);
        assert_eq!(list.hits(), 1);
    }

    #[tokio::test]
    async fn server_correction_moves_the_cursor() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/employees").query_param("page", "9");
            then.status(200).json_body(json!({
                "data": {"data": [{"id": 5}], "total": 21, "current_page": 3}
            }));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        let outcome = screen.set_page(PageIndex::new(8)).await;
        assert!(matches!(
            outcome,
            LoadOutcome::Loaded {
                index_corrected: true,
                ..
            }
        ));
        assert_eq!(screen.request().index, PageIndex::new(2));
        assert_eq!(screen.page_count(), 3);
    }

    #[tokio::test]
    async fn page_size_change_resets_to_first_page() {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/employees")
                .query_param("page", "1")
                .query_param("per_page", "25");
            then.status(200).json_body(json!({"data": []}));
        });
        let screen = screen(&server.base_url(), Some("tok"))
            .with_request(PageRequest::new(PageIndex::new(4), PageSize::default()));
        screen.set_page_size(PageSize::new(25)).await;
        first.assert();
        assert_eq!(screen.view(), ScreenView::Empty);
    }

    #[tokio::test]
    async fn server_query_is_forwarded() {
        let server = MockServer::start_async().await;
        let filtered = server.mock(|when, then| {
            when.method(GET)
                .path("/employees")
                .query_param("page", "1")
                .query_param("status", "active");
            then.status(200).json_body(json!({"data": [{"id": 1}]}));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        let mut query = ServerQuery::new();
        query.set("status", "active");
        screen.set_server_query(query).await;
        filtered.assert();
    }

    #[tokio::test]
    async fn refetch_prunes_selection_to_new_page() {
        let server = MockServer::start_async().await;
        let mut first = server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(200)
                .json_body(json!({"data": [{"id": 1}, {"id": 2}, {"id": 3}]}));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        screen.mount().await;
        screen
            .selection()
            .select([EntityId::from(1), EntityId::from(2), EntityId::from(3)]);
        first.delete();
        server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(200).json_body(json!({"data": [{"id": 2}, {"id": 4}]}));
        });
        screen.refetch().await;
        assert_eq!(screen.selection().selected(), vec![EntityId::from(2)]);
    }

    #[tokio::test]
    async fn failed_refetch_shows_error_with_last_rows() {
        let server = MockServer::start_async().await;
        let mut ok = server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(200).json_body(json!({"data": [{"id": 1, "name": "Ana"}]}));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        screen.mount().await;
        screen.selection().select([EntityId::from(1)]);
        ok.delete();
        server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(503).json_body(json!({"message": "maintenance"}));
        });
        screen.refetch().await;
        let ScreenView::Error {
            message,
            retryable,
            rows,
        } = screen.view()
        else {
            panic!("expected error view");
        };
        assert!(message.contains("maintenance"));
        assert!(retryable);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].selected);
    }

    #[tokio::test]
    async fn bulk_success_clears_selection_and_reloads() {
        let server = MockServer::start_async().await;
        let list = server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(200).json_body(json!({"data": [{"id": 1}, {"id": 2}]}));
        });
        let bulk = server.mock(|when, then| {
            when.method(POST)
                .path("/employees/bulk-status")
                .json_body(json!({"ids": [2]}));
            then.status(200).json_body(json!({"status": "success"}));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        screen.mount().await;
        screen.selection().select([EntityId::from(2)]);

        let outcome = screen
            .run_bulk(&BulkEndpoint::new("/employees/bulk-status"), ids_payload)
            .await
            .expect("bulk");
        bulk.assert();
        assert_eq!(
            outcome,
            BulkOutcome::Completed {
                affected: 1,
                refetch_required: true
            }
        );
        assert!(screen.selection().is_empty());
        assert_eq!(list.hits(), 2);
    }

    #[tokio::test]
    async fn unmounted_screen_commits_nothing() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/employees");
            then.status(200).json_body(json!({"data": [{"id": 1}]}));
        });
        let screen = screen(&server.base_url(), Some("tok"));
        screen.unmount();
        assert_eq!(screen.mount().await, LoadOutcome::Detached);
        assert_eq!(screen.view(), ScreenView::Idle);
        assert!(!screen.is_mounted());
    }
}
