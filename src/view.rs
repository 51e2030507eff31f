//! Client-side view state for embedding consumers: fragment routing and the
//! public listing feed.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::watch;

use crate::{
    models::Listing,
    pagination::{LISTINGS_PER_PAGE, Page, PageRequest},
    repository::RepositoryState,
};

/// Route
///
/// Which top-level view a URL fragment selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Home,
    UserManagement,
}

impl Route {
    /// `#users` (with or without the hash) is the user directory; anything
    /// else, including an empty fragment, is home.
    pub fn from_fragment(fragment: &str) -> Self {
        match fragment.trim().trim_start_matches('#') {
            "users" => Route::UserManagement,
            _ => Route::Home,
        }
    }

    pub fn fragment(&self) -> &'static str {
        match self {
            Route::Home => "",
            Route::UserManagement => "#users",
        }
    }
}

/// FetchSequencer
///
/// Hands out strictly increasing tickets. A fetch result may only be applied
/// if its ticket is still the latest one issued.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    latest: AtomicU64,
}

impl FetchSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

/// ViewState
///
/// `Empty` and `Failed` are distinct on purpose: a backend failure must never
/// render as "no results".
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState<T> {
    #[default]
    Loading,
    Empty,
    Ready(Page<T>),
    Failed { message: String },
}

impl<T> ViewState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }
}

struct FeedInner {
    repo: RepositoryState,
    sequencer: FetchSequencer,
    page: AtomicU32,
    state: watch::Sender<ViewState<Listing>>,
}

/// ListingFeed
///
/// The public listing grid. Every page change starts a new fetch; only the
/// most recently started fetch may publish its result, whatever order the
/// fetches complete in.
#[derive(Clone)]
pub struct ListingFeed {
    inner: Arc<FeedInner>,
}

impl ListingFeed {
    pub fn new(repo: RepositoryState) -> Self {
        let (state, _) = watch::channel(ViewState::Loading);
        Self {
            inner: Arc::new(FeedInner {
                repo,
                sequencer: FetchSequencer::new(),
                page: AtomicU32::new(1),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<Listing>> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> ViewState<Listing> {
        self.inner.state.borrow().clone()
    }

    pub fn current_page(&self) -> u32 {
        self.inner.page.load(Ordering::SeqCst)
    }

    /// Switches to `page` and returns the fetch to drive. The ticket is taken
    /// before this returns, so call order decides which fetch wins.
    pub fn show_page(&self, page: u32) -> impl Future<Output = ()> + Send + 'static {
        let request = PageRequest::new(page, LISTINGS_PER_PAGE);
        let ticket = self.inner.sequencer.issue();
        self.inner.page.store(request.page(), Ordering::SeqCst);
        self.inner.state.send_replace(ViewState::Loading);

        let inner = Arc::clone(&self.inner);
        async move {
            let next = match inner.repo.list_public_listings(request).await {
                Ok(page) if page.is_empty() => ViewState::Empty,
                Ok(page) => ViewState::Ready(page),
                Err(e) => {
                    tracing::error!(operation = "list_public_listings", page = request.page(), error = %e, "listing fetch failed");
                    ViewState::Failed {
                        message: e.to_string(),
                    }
                }
            };

            // The check runs under the channel lock so a newer `show_page`
            // either invalidates this ticket first or publishes after us.
            let applied = inner.state.send_if_modified(|state| {
                if !inner.sequencer.is_latest(ticket) {
                    return false;
                }
                *state = next;
                true
            });
            if !applied {
                tracing::debug!(ticket, "discarded stale listing fetch");
            }
        }
    }

    /// Re-runs the fetch for the current page.
    pub fn retry(&self) -> impl Future<Output = ()> + Send + 'static {
        self.show_page(self.current_page())
    }
}
