//! Client-side snapshot of one paginated server resource.
//!
//! A [`ResourceStore`] holds exactly the last page it loaded, issues CRUD
//! requests through a [`Transport`], and re-reads the current page after
//! every successful mutation. It never patches its snapshot locally.
//!
//! Every operation settles: failures are returned as [`StoreError`] and
//! also kept in [`ResourceStore::last_error`], while the previous snapshot
//! stays in place.
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::client::{ApiRequest, ApiResponse, Transport};
use crate::descriptor::{
    decode_mutation_body, decode_page, decode_references, project_payload, ReferenceKind,
    ResourceDescriptor,
};
use crate::error::{Operation, StoreError};
use crate::model::{PageState, ReferenceItem, Resource, SortOrder, SortState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub page_size: u32,
    pub request_timeout: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            request_timeout: Duration::from_secs(10),
        }
    }
}

struct Inner<T> {
    page: PageState<T>,
    last_error: Option<StoreError>,
    references: HashMap<&'static str, Vec<ReferenceItem>>,
    /// Newest load started per reference slot.
    reference_seq: HashMap<&'static str, u64>,
}

pub struct ResourceStore<T: Resource> {
    descriptor: ResourceDescriptor,
    transport: Arc<dyn Transport>,
    settings: StoreSettings,
    inner: Mutex<Inner<T>>,
    /// Sequence number of the newest `fetch_page` started.
    fetch_seq: watch::Sender<u64>,
    in_flight: AtomicUsize,
}

/// Keeps `in_flight` accurate even when a request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Resource> ResourceStore<T> {
    pub fn new(
        descriptor: ResourceDescriptor,
        transport: Arc<dyn Transport>,
        settings: StoreSettings,
    ) -> Self {
        let sort = descriptor.sorting.map(|spec| spec.default_state());
        let page_size = settings.page_size.max(1);
        let (fetch_seq, _) = watch::channel(0);
        Self {
            descriptor,
            transport,
            settings: StoreSettings { page_size, ..settings },
            inner: Mutex::new(Inner {
                page: PageState::empty(page_size, sort),
                last_error: None,
                references: HashMap::new(),
                reference_seq: HashMap::new(),
            }),
            fetch_seq,
            in_flight: AtomicUsize::new(0),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn page_size(&self) -> u32 {
        self.settings.page_size
    }

    pub fn snapshot(&self) -> PageState<T> {
        self.inner().page.clone()
    }

    pub fn items(&self) -> Vec<T> {
        self.inner().page.items.clone()
    }

    pub fn current_page(&self) -> u32 {
        self.inner().page.current_page
    }

    pub fn total_items(&self) -> u64 {
        self.inner().page.total_items
    }

    pub fn total_pages(&self) -> u64 {
        self.inner().page.total_pages()
    }

    /// Sort state the next fetch will use; `None` for unsortable resources.
    pub fn sort(&self) -> Option<SortState> {
        self.inner().page.sort.clone()
    }

    pub fn last_error(&self) -> Option<StoreError> {
        self.inner().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.inner().last_error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Reference list loaded into slot `name`; empty until loaded.
    pub fn references(&self, name: &str) -> Vec<ReferenceItem> {
        self.inner()
            .references
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, err: StoreError) -> StoreError {
        warn!(resource = self.descriptor.name, error = %err, "store operation failed");
        self.inner().last_error = Some(err.clone());
        err
    }

    /// One exchange, bounded by the request timeout; non-2xx becomes `Status`.
    async fn exchange(&self, request: ApiRequest) -> Result<ApiResponse, StoreError> {
        let _guard = InFlight::enter(&self.in_flight);
        let timeout = self.settings.request_timeout;
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Err(_) => return Err(StoreError::Timeout(timeout.as_millis() as u64)),
            Ok(Err(err)) => return Err(StoreError::network(&err)),
            Ok(Ok(response)) => response,
        };
        if !response.is_success() {
            return Err(StoreError::Status {
                status: response.status,
                body: response.body,
            });
        }
        Ok(response)
    }

    fn resolve_sort(&self, requested: Option<SortState>) -> Result<Option<SortState>, StoreError> {
        let Some(spec) = self.descriptor.sorting else {
            return match requested {
                Some(_) => Err(StoreError::SortingUnsupported(self.descriptor.name)),
                None => Ok(None),
            };
        };
        let sort = requested
            .or_else(|| self.inner().page.sort.clone())
            .unwrap_or_else(|| spec.default_state());
        if !spec.allows(&sort.column) {
            return Err(StoreError::UnknownSortColumn {
                resource: self.descriptor.name,
                column: sort.column,
            });
        }
        Ok(Some(sort))
    }

    fn list_request(&self, page: u32, sort: Option<&SortState>) -> ApiRequest {
        let request = ApiRequest::get(self.descriptor.route)
            .with_query("page", page)
            .with_query("limit", self.settings.page_size);
        match sort {
            Some(sort) => request
                .with_query("sortColumn", &sort.column)
                .with_query("sortOrder", sort.order),
            None => request,
        }
    }

    /// Load `page` and replace the snapshot with it as one unit.
    ///
    /// Starting a newer fetch cancels this one, which then resolves to
    /// [`StoreError::Superseded`] without touching the snapshot.
    #[instrument(skip_all, fields(resource = self.descriptor.name, page = page))]
    pub async fn fetch_page(
        &self,
        page: u32,
        sort: Option<SortState>,
    ) -> Result<PageState<T>, StoreError> {
        if page == 0 {
            return Err(self.record(StoreError::InvalidPage(page)));
        }
        let explicit_sort = sort.is_some();
        let sort = self.resolve_sort(sort).map_err(|e| self.record(e))?;

        let mut seq = 0;
        self.fetch_seq.send_modify(|latest| {
            *latest += 1;
            seq = *latest;
        });
        let newer = self.fetch_seq.subscribe();

        let request = self.list_request(page, sort.as_ref());
        let outcome = tokio::select! {
            biased;
            _ = superseded(newer, seq) => Err(StoreError::Superseded),
            res = self.exchange(request) => res,
        };

        let decoded = outcome.and_then(|response| {
            let (items, total) = decode_page::<T>(&self.descriptor, &response.body)?;
            if items.len() > self.settings.page_size as usize {
                return Err(StoreError::Decode(format!(
                    "page holds {} records, page size is {}",
                    items.len(),
                    self.settings.page_size
                )));
            }
            Ok((items, total))
        });

        match decoded {
            Ok((items, total)) => {
                let mut inner = self.inner();
                // Checked under the lock so a newer fetch cannot be overwritten.
                if *self.fetch_seq.borrow() != seq {
                    debug!(seq, "discarding response of superseded fetch");
                    return Err(StoreError::Superseded);
                }
                inner.page.items = items;
                inner.page.total_items = total;
                inner.page.current_page = page;
                // A retained sort may have been changed while this was in flight.
                if explicit_sort {
                    inner.page.sort = sort;
                }
                inner.last_error = None;
                debug!(total, "page loaded");
                Ok(inner.page.clone())
            }
            Err(StoreError::Superseded) => {
                debug!(seq, "fetch superseded");
                Err(StoreError::Superseded)
            }
            Err(err) if *self.fetch_seq.borrow() != seq => {
                debug!(seq, error = %err, "dropping failure of superseded fetch");
                Err(StoreError::Superseded)
            }
            Err(err) => Err(self.record(err)),
        }
    }

    /// Re-read the current page with the retained sort state.
    pub async fn refresh(&self) -> Result<PageState<T>, StoreError> {
        let page = self.current_page();
        self.fetch_page(page, None).await
    }

    /// Update the retained sort state. Never fetches.
    pub fn set_sorting(&self, column: &str, order: SortOrder) -> Result<(), StoreError> {
        let Some(spec) = self.descriptor.sorting else {
            return Err(self.record(StoreError::SortingUnsupported(self.descriptor.name)));
        };
        if !spec.allows(column) {
            return Err(self.record(StoreError::UnknownSortColumn {
                resource: self.descriptor.name,
                column: column.to_string(),
            }));
        }
        self.inner().page.sort = Some(SortState::new(column, order));
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.descriptor.read_only {
            return Err(self.record(StoreError::ReadOnly(self.descriptor.name)));
        }
        Ok(())
    }

    fn ensure_id(&self, id: &str) -> Result<(), StoreError> {
        if id.trim().is_empty() {
            return Err(self.record(StoreError::Payload("record id is empty".into())));
        }
        Ok(())
    }

    async fn refresh_after(
        &self,
        operation: Operation,
        response: Option<Value>,
    ) -> Result<Option<Value>, StoreError> {
        match self.refresh().await {
            // A newer fetch already owns the snapshot.
            Ok(_) | Err(StoreError::Superseded) => Ok(response),
            Err(source) => Err(self.record(StoreError::StaleAfterMutation {
                operation,
                response,
                source: Box::new(source),
            })),
        }
    }

    /// POST a new record, then re-read the current page.
    ///
    /// Returns whatever the server sent back for the created record.
    #[instrument(skip_all, fields(resource = self.descriptor.name))]
    pub async fn create<P: Serialize + ?Sized>(
        &self,
        record: &P,
    ) -> Result<Option<Value>, StoreError> {
        self.ensure_writable()?;
        let body = project_payload(self.descriptor.writable, record).map_err(|e| self.record(e))?;
        let response = self
            .exchange(ApiRequest::post(self.descriptor.route, body))
            .await
            .map_err(|e| self.record(e))?;
        info!("record created");
        self.refresh_after(Operation::Create, decode_mutation_body(&response.body))
            .await
    }

    /// PUT `patch` to `{route}/{id}`; the body never carries the id.
    #[instrument(skip_all, fields(resource = self.descriptor.name, id = id))]
    pub async fn update<P: Serialize + ?Sized>(
        &self,
        id: &str,
        patch: &P,
    ) -> Result<Option<Value>, StoreError> {
        self.ensure_writable()?;
        self.ensure_id(id)?;
        let body = project_payload(self.descriptor.writable, patch).map_err(|e| self.record(e))?;
        let response = self
            .exchange(ApiRequest::put(self.descriptor.item_path(id), body))
            .await
            .map_err(|e| self.record(e))?;
        info!("record updated");
        self.refresh_after(Operation::Update, decode_mutation_body(&response.body))
            .await
    }

    /// DELETE `{route}/{id}`, then re-read the current page. An emptied last
    /// page is left for the caller to step back from.
    #[instrument(skip_all, fields(resource = self.descriptor.name, id = id))]
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.ensure_id(id)?;
        self.exchange(ApiRequest::delete(self.descriptor.item_path(id)))
            .await
            .map_err(|e| self.record(e))?;
        info!("record deleted");
        self.refresh_after(Operation::Delete, None).await.map(|_| ())
    }

    /// Load one unpaginated lookup list into its named slot.
    ///
    /// On failure the slot keeps whatever it held before. When a newer load
    /// of the same slot starts first, this one resolves to
    /// [`StoreError::Superseded`] and leaves the slot alone.
    #[instrument(skip_all, fields(resource = self.descriptor.name, kind = kind.name))]
    pub async fn fetch_reference_list(
        &self,
        kind: &ReferenceKind,
    ) -> Result<Vec<ReferenceItem>, StoreError> {
        let seq = {
            let mut inner = self.inner();
            let latest = inner.reference_seq.entry(kind.name).or_insert(0);
            *latest += 1;
            *latest
        };
        let loaded = async {
            let response = self.exchange(ApiRequest::get(kind.route)).await?;
            decode_references(kind, &response.body)
        }
        .await;

        let mut inner = self.inner();
        if inner.reference_seq.get(kind.name) != Some(&seq) {
            debug!(seq, "discarding superseded reference load");
            return Err(StoreError::Superseded);
        }
        match loaded {
            Ok(items) => {
                debug!(count = items.len(), "reference list loaded");
                inner.references.insert(kind.name, items.clone());
                Ok(items)
            }
            Err(err) => {
                drop(inner);
                Err(self.record(err))
            }
        }
    }

    /// Load every reference list the descriptor declares, concurrently.
    pub async fn load_references(&self) -> Vec<(&'static str, Result<usize, StoreError>)> {
        let loads = self.descriptor.references.iter().map(|kind| async move {
            let res = self.fetch_reference_list(kind).await.map(|items| items.len());
            (kind.name, res)
        });
        futures::future::join_all(loads).await
    }

    /// POST a new lookup entry (e.g. an ingredient type from the ingredient
    /// form), then reload that reference slot.
    #[instrument(skip_all, fields(resource = self.descriptor.name, kind = kind.name))]
    pub async fn create_reference<P: Serialize + ?Sized>(
        &self,
        kind: &ReferenceKind,
        record: &P,
    ) -> Result<Option<Value>, StoreError> {
        let body = project_payload(kind.writable, record).map_err(|e| self.record(e))?;
        let response = self
            .exchange(ApiRequest::post(kind.route, body))
            .await
            .map_err(|e| self.record(e))?;
        let created = decode_mutation_body(&response.body);
        match self.fetch_reference_list(kind).await {
            Ok(_) | Err(StoreError::Superseded) => Ok(created),
            Err(source) => Err(self.record(StoreError::StaleAfterMutation {
                operation: Operation::CreateReference,
                response: created,
                source: Box::new(source),
            })),
        }
    }

    /// GET `{route}/{id}/{segment}` without touching page state.
    #[instrument(skip_all, fields(resource = self.descriptor.name, id = id, segment = segment))]
    pub async fn fetch_nested<D: DeserializeOwned>(
        &self,
        id: &str,
        segment: &str,
    ) -> Result<Vec<D>, StoreError> {
        self.ensure_id(id)?;
        let path = format!("{}/{}", self.descriptor.item_path(id), segment);
        let loaded = async {
            let response = self.exchange(ApiRequest::get(path)).await?;
            serde_json::from_str::<Vec<D>>(&response.body)
                .map_err(|e| StoreError::Decode(format!("{segment}: {e}")))
        }
        .await;
        loaded.map_err(|e| self.record(e))
    }
}

/// Resolves once a fetch newer than `seq` has started.
async fn superseded(mut newer: watch::Receiver<u64>, seq: u64) {
    loop {
        if *newer.borrow_and_update() > seq {
            return;
        }
        if newer.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
