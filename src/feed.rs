//! Paged search feed: owns the query, accumulated results and continuation
//! cursor, and decides when scrolling warrants another page.
//!
//! Fetches run as spawned tasks that report back over a channel; results are
//! applied in `check_pending()` on the UI loop. Every request is tagged with a
//! generation number and a completion is applied only if it still carries the
//! current generation, so a superseded search can never overwrite a newer one.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::youtube::{PageRequest, SearchError, SearchPage, SearchProvider, VideoSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
  /// Nothing requested yet.
  Idle,
  InitialLoading,
  Ready,
  LoadingMore,
  /// The last `search()` failed; `error()` holds the reason.
  Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
  Initial,
  More,
}

/// A finished fetch on its way back to the controller.
#[derive(Debug)]
struct FetchOutcome {
  generation: u64,
  kind: FetchKind,
  result: Result<SearchPage, SearchError>,
}

/// What happened to `items` when a completion was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedChange {
  Unchanged,
  Replaced,
  /// This many items were appended after the existing ones.
  Appended(usize),
}

/// True when the viewport's bottom edge is within `threshold` of the content's bottom edge.
pub fn is_near_bottom(visible_height: usize, scroll_offset: usize, content_height: usize, threshold: usize) -> bool {
  visible_height.saturating_add(scroll_offset) >= content_height.saturating_sub(threshold)
}

pub struct PagedFeedController {
  provider: Arc<dyn SearchProvider>,
  page_size: u32,
  query: String,
  items: Vec<VideoSummary>,
  cursor: Option<String>,
  phase: FeedPhase,
  generation: u64,
  error: Option<SearchError>,
  transient_error: Option<SearchError>,
  tx: mpsc::UnboundedSender<FetchOutcome>,
  rx: mpsc::UnboundedReceiver<FetchOutcome>,
  in_flight: Option<JoinHandle<()>>,
}

impl PagedFeedController {
  pub fn new(provider: Arc<dyn SearchProvider>, page_size: u32) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      provider,
      page_size,
      query: String::new(),
      items: Vec::new(),
      cursor: None,
      phase: FeedPhase::Idle,
      generation: 0,
      error: None,
      transient_error: None,
      tx,
      rx,
      in_flight: None,
    }
  }

  pub fn query(&self) -> &str {
    &self.query
  }

  pub fn items(&self) -> &[VideoSummary] {
    &self.items
  }

  #[cfg(test)]
  pub fn cursor(&self) -> Option<&str> {
    self.cursor.as_deref()
  }

  pub fn phase(&self) -> FeedPhase {
    self.phase
  }

  /// The failure behind `FeedPhase::Errored`.
  pub fn error(&self) -> Option<&SearchError> {
    self.error.as_ref()
  }

  /// Take the most recent load-more failure, if any. Each failure is reported once.
  pub fn take_transient_error(&mut self) -> Option<SearchError> {
    self.transient_error.take()
  }

  pub fn has_more(&self) -> bool {
    self.cursor.is_some()
  }

  /// Start a new search. Returns `false` (and changes nothing) for a blank query.
  pub fn search(&mut self, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
      debug!("feed: ignoring blank query");
      return false;
    }
    self.query = query.to_string();
    self.cursor = None;
    self.error = None;
    self.transient_error = None;
    self.phase = FeedPhase::InitialLoading;
    let request = PageRequest { query: self.query.clone(), page_size: self.page_size, page_token: None };
    self.dispatch(FetchKind::Initial, request);
    info!(query = %self.query, generation = self.generation, "feed: search issued");
    true
  }

  /// Re-issue the current query after a failed search.
  pub fn retry(&mut self) -> bool {
    if self.phase != FeedPhase::Errored {
      return false;
    }
    let query = self.query.clone();
    self.search(&query)
  }

  /// Request the next page. Only acts when `Ready` with a cursor.
  pub fn load_more(&mut self) -> bool {
    if self.phase != FeedPhase::Ready {
      return false;
    }
    let Some(token) = self.cursor.clone() else { return false };
    self.phase = FeedPhase::LoadingMore;
    let request = PageRequest { query: self.query.clone(), page_size: self.page_size, page_token: Some(token) };
    self.dispatch(FetchKind::More, request);
    debug!(query = %self.query, generation = self.generation, loaded = self.items.len(), "feed: load more issued");
    true
  }

  /// Scroll callback. Triggers `load_more()` when the viewport is near the end.
  /// Returns whether a request was issued.
  pub fn on_scroll_position_changed(
    &mut self,
    visible_height: usize,
    scroll_offset: usize,
    content_height: usize,
  ) -> bool {
    if !is_near_bottom(visible_height, scroll_offset, content_height, constants().scroll_threshold) {
      return false;
    }
    self.load_more()
  }

  /// Apply any fetch results that have arrived. Non-blocking.
  pub fn check_pending(&mut self) -> FeedChange {
    let mut change = FeedChange::Unchanged;
    while let Ok(outcome) = self.rx.try_recv() {
      change = match (change, self.apply(outcome)) {
        (_, FeedChange::Replaced) => FeedChange::Replaced,
        (FeedChange::Replaced, _) => FeedChange::Replaced,
        (FeedChange::Appended(a), FeedChange::Appended(b)) => FeedChange::Appended(a + b),
        (prev, FeedChange::Unchanged) => prev,
        (FeedChange::Unchanged, next) => next,
      };
    }
    change
  }

  fn dispatch(&mut self, kind: FetchKind, request: PageRequest) {
    if let Some(handle) = self.in_flight.take() {
      handle.abort();
    }
    self.generation += 1;
    let generation = self.generation;
    let tx = self.tx.clone();
    let fetch = self.provider.search(request);
    self.in_flight = Some(tokio::spawn(async move {
      let result = fetch.await;
      let _ = tx.send(FetchOutcome { generation, kind, result });
    }));
  }

  fn apply(&mut self, outcome: FetchOutcome) -> FeedChange {
    if outcome.generation != self.generation {
      debug!(
        stale = outcome.generation,
        current = self.generation,
        "feed: discarding response from superseded request"
      );
      return FeedChange::Unchanged;
    }
    self.in_flight = None;

    match (outcome.kind, outcome.result) {
      (FetchKind::Initial, Ok(page)) => {
        let has_more = page.next_page_token.is_some();
        info!(query = %self.query, count = page.items.len(), has_more, "feed: results");
        self.items = page.items;
        self.cursor = page.next_page_token;
        self.phase = FeedPhase::Ready;
        FeedChange::Replaced
      }
      (FetchKind::Initial, Err(e)) => {
        warn!(query = %self.query, err = %e, "feed: search failed");
        self.error = Some(e);
        self.phase = FeedPhase::Errored;
        FeedChange::Unchanged
      }
      (FetchKind::More, Ok(page)) => {
        let added = page.items.len();
        self.items.extend(page.items);
        self.cursor = page.next_page_token;
        self.phase = FeedPhase::Ready;
        debug!(added, total = self.items.len(), has_more = self.cursor.is_some(), "feed: page appended");
        FeedChange::Appended(added)
      }
      (FetchKind::More, Err(e)) => {
        warn!(query = %self.query, err = %e, "feed: load more failed");
        self.transient_error = Some(e);
        self.phase = FeedPhase::Ready;
        FeedChange::Unchanged
      }
    }
  }

  /// Wait for the next completion and apply it.
  #[cfg(test)]
  async fn next_change(&mut self) -> FeedChange {
    // `self` holds a sender, so the channel stays open while we wait.
    let outcome = self.rx.recv().await.expect("feed channel closed");
    self.apply(outcome)
  }
}

impl Drop for PagedFeedController {
  fn drop(&mut self) {
    if let Some(handle) = self.in_flight.take() {
      handle.abort();
    }
  }
}
