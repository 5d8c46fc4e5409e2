use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{
    domain::{CreatureDetail, CreatureId, CreatureSummary},
    protocol::ResultPage,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::{
    catalog::RemoteCatalog,
    debounce::{Debouncer, SEARCH_DEBOUNCE},
    error::CatalogError,
    plan::{plan_request, total_pages, RequestPlan, SortMode, PAGE_SIZE},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryView {
    pub raw_search_text: String,
    pub committed_search_text: String,
    pub sort_mode: SortMode,
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u64,
    pub results: Vec<CreatureSummary>,
    pub status: QueryStatus,
}

impl Default for QueryView {
    fn default() -> Self {
        Self {
            raw_search_text: String::new(),
            committed_search_text: String::new(),
            sort_mode: SortMode::Unset,
            page: 1,
            total_pages: 0,
            total_results: 0,
            results: Vec::new(),
            status: QueryStatus::Idle,
        }
    }
}

impl QueryView {
    pub fn loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            QueryStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    // never true after a failure
    pub fn is_empty_result(&self) -> bool {
        self.status == QueryStatus::Ready && self.results.is_empty()
    }

    pub fn has_next_page(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev_page(&self) -> bool {
        self.page > 1
    }

    pub fn plan(&self) -> RequestPlan {
        plan_request(&self.committed_search_text, self.sort_mode, self.page)
    }
}

/// A response is applied only if its generation is still the latest issued.
pub struct QueryController {
    catalog: Arc<dyn RemoteCatalog>,
    debouncer: Debouncer,
    generation: AtomicU64,
    state: Mutex<QueryView>,
    view: watch::Sender<QueryView>,
}

impl QueryController {
    pub fn new(catalog: Arc<dyn RemoteCatalog>) -> Arc<Self> {
        Self::with_debounce(catalog, SEARCH_DEBOUNCE)
    }

    pub fn with_debounce(catalog: Arc<dyn RemoteCatalog>, window: Duration) -> Arc<Self> {
        let (view, _) = watch::channel(QueryView::default());
        Arc::new(Self {
            catalog,
            debouncer: Debouncer::new(window),
            generation: AtomicU64::new(0),
            state: Mutex::new(QueryView::default()),
            view,
        })
    }

    pub fn snapshot(&self) -> QueryView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryView> {
        self.view.subscribe()
    }

    pub async fn set_raw_search_text(self: &Arc<Self>, text: impl Into<String>) {
        let text = text.into();
        {
            let mut state = self.state.lock().await;
            state.raw_search_text = text.clone();
            self.publish(&state);
        }

        let controller = Arc::clone(self);
        self.debouncer.schedule(async move {
            controller.commit_search_text(text).await;
        });
    }

    pub async fn set_sort_mode(&self, mode: SortMode) {
        let request = {
            let mut state = self.state.lock().await;
            if state.sort_mode == mode {
                return;
            }
            state.sort_mode = mode;
            state.page = 1;
            self.begin_fetch(&mut state)
        };
        self.run_fetch(request).await;
    }

    pub async fn set_page(&self, page: u32) {
        let request = {
            let mut state = self.state.lock().await;
            let clamped = page.clamp(1, state.total_pages.max(1));
            if clamped != page {
                debug!(requested = page, clamped, "page outside known range");
            }
            if clamped == state.page {
                return;
            }
            state.page = clamped;
            self.begin_fetch(&mut state)
        };
        self.run_fetch(request).await;
    }

    pub async fn next_page(&self) {
        let page = self.state.lock().await.page;
        self.set_page(page.saturating_add(1)).await;
    }

    pub async fn prev_page(&self) {
        let page = self.state.lock().await.page;
        self.set_page(page.saturating_sub(1)).await;
    }

    pub async fn refresh(&self) {
        let request = {
            let mut state = self.state.lock().await;
            self.begin_fetch(&mut state)
        };
        self.run_fetch(request).await;
    }

    pub async fn retry(&self) {
        self.refresh().await;
    }

    pub async fn detail(&self, id: CreatureId) -> Result<CreatureDetail, CatalogError> {
        self.catalog.get_by_identifier(id).await
    }

    async fn commit_search_text(&self, text: String) {
        let request = {
            let mut state = self.state.lock().await;
            if state.committed_search_text == text {
                return;
            }
            state.committed_search_text = text;
            state.page = 1;
            self.begin_fetch(&mut state)
        };
        self.run_fetch(request).await;
    }

    fn begin_fetch(&self, state: &mut QueryView) -> (u64, RequestPlan) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        state.status = QueryStatus::Loading;
        self.publish(state);
        (generation, state.plan())
    }

    async fn run_fetch(&self, (generation, plan): (u64, RequestPlan)) {
        debug!(generation, ?plan, "fetching catalog page");
        let outcome = match &plan {
            RequestPlan::Lookup { ids } => self.catalog.lookup_by_identifiers(ids).await,
            RequestPlan::List(query) => self.catalog.list(query).await,
        };

        let mut state = self.state.lock().await;
        let latest = self.generation.load(Ordering::SeqCst);
        if generation != latest {
            debug!(generation, latest, "discarding stale catalog response");
            return;
        }
        match outcome {
            Ok(page) => apply_page(&mut state, page),
            Err(err) => {
                warn!(error = %err, ?plan, "catalog request failed");
                state.results.clear();
                state.total_results = 0;
                state.total_pages = 0;
                state.status = QueryStatus::Failed(err.user_message());
            }
        }
        self.publish(&state);
    }

    fn publish(&self, state: &QueryView) {
        self.view.send_replace(state.clone());
    }
}

fn apply_page(state: &mut QueryView, page: ResultPage) {
    state.total_results = page.pagination.total;
    state.total_pages = total_pages(page.pagination.total, PAGE_SIZE);
    state.results = page.results;
    state.status = QueryStatus::Ready;
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
