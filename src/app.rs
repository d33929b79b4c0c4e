use anyhow::Result;
use image::DynamicImage;
use ratatui::layout::Rect;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::display::DisplayMode;
use crate::feed::{FeedChange, FeedPhase, PagedFeedController};
use crate::graphics::fit_thumbnail;
use crate::hover::{HoverPhase, HoverPreviewController, HoverTarget};
use crate::layout::{CardRects, GridLayout, card_key, contains};
use crate::pointer::{PointerEvent, PointerTarget, PointerTracker};
use crate::theme::{THEMES, theme_index};
use crate::youtube::{fetch_image, fetch_thumbnail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Search,
  Grid,
}

/// Geometry captured while drawing the last frame; hit-testing and anchor
/// measurement read from here.
#[derive(Debug, Default)]
pub struct ViewGeometry {
  pub grid: Option<GridLayout>,
  pub cards: CardRects,
  /// Overlay rectangles in draw order (last is topmost).
  pub overlays: Vec<(usize, Rect)>,
}

/// Overlay images: video thumbnails keyed by video id, channel avatars keyed by
/// their URL.
#[derive(Default)]
pub struct ThumbnailCache {
  images: HashMap<String, DynamicImage>,
  pending: HashMap<String, oneshot::Receiver<Result<DynamicImage>>>,
  failed: HashSet<String>,
  resized: HashMap<String, (u16, u16, DynamicImage)>,
}

impl ThumbnailCache {
  fn wants(&self, key: &str) -> bool {
    !self.images.contains_key(key) && !self.pending.contains_key(key) && !self.failed.contains(key)
  }

  fn request<F>(&mut self, key: &str, fetch: F)
  where
    F: Future<Output = Result<DynamicImage>> + Send + 'static,
  {
    if !self.wants(key) {
      return;
    }
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(fetch.await);
    });
    self.pending.insert(key.to_string(), rx);
  }

  pub fn is_loading(&self, key: &str) -> bool {
    self.pending.contains_key(key)
  }

  /// The image for `key` resized to `area`, cached until the area changes.
  pub fn fitted(&mut self, key: &str, area: Rect, mode: DisplayMode) -> Option<&DynamicImage> {
    let source = self.images.get(key)?;
    let stale = self.resized.get(key).is_none_or(|(w, h, _)| (*w, *h) != (area.width, area.height));
    if stale {
      let img = fit_thumbnail(source, area, mode);
      self.resized.insert(key.to_string(), (area.width, area.height, img));
    }
    self.resized.get(key).map(|(_, _, img)| img)
  }

  fn drain(&mut self) {
    let images = &mut self.images;
    let failed = &mut self.failed;
    self.pending.retain(|id, rx| match rx.try_recv() {
      Ok(Ok(img)) => {
        images.insert(id.clone(), img);
        false
      }
      Ok(Err(e)) => {
        debug!(image = %id, err = %format!("{:#}", e), "image fetch failed");
        failed.insert(id.clone());
        false
      }
      Err(oneshot::error::TryRecvError::Empty) => true,
      Err(oneshot::error::TryRecvError::Closed) => {
        failed.insert(id.clone());
        false
      }
    });
  }

  fn clear(&mut self) {
    self.images.clear();
    self.pending.clear();
    self.failed.clear();
    self.resized.clear();
  }
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub theme_index: usize,
  pub feed: PagedFeedController,
  /// One controller per feed item, same order.
  pub hovers: Vec<HoverPreviewController>,
  pub pointer: PointerTracker,
  /// Card with keyboard focus.
  pub focused: Option<usize>,
  /// Grid scroll offset in terminal rows.
  pub scroll: usize,
  pub view: ViewGeometry,
  pub thumbs: ThumbnailCache,
  pub display_mode: DisplayMode,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  http_client: reqwest::Client,
  config: Config,
  /// Set when the item list changed; the next drawn frame re-evaluates the
  /// near-bottom check against the new layout.
  scroll_check_due: bool,
  error_time: Option<Instant>,
}

impl App {
  pub fn new(
    feed: PagedFeedController,
    http_client: reqwest::Client,
    display_mode: DisplayMode,
    config: Config,
    initial_query: String,
  ) -> Self {
    let cursor_position = initial_query.chars().count();
    Self {
      input: initial_query,
      cursor_position,
      input_scroll: 0,
      mode: AppMode::Search,
      theme_index: theme_index(config.theme_name.as_deref()),
      feed,
      hovers: Vec::new(),
      pointer: PointerTracker::default(),
      focused: None,
      scroll: 0,
      view: ViewGeometry::default(),
      thumbs: ThumbnailCache::default(),
      display_mode,
      last_error: None,
      status_message: None,
      should_quit: false,
      http_client,
      config,
      scroll_check_due: false,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    &THEMES[self.theme_index % THEMES.len()]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.clear_error();
    }
  }

  // --- Background results ---

  /// Apply feed results, fire due hover timers and collect thumbnails.
  pub fn check_pending(&mut self) {
    match self.feed.check_pending() {
      FeedChange::Replaced => self.rebuild_hovers(),
      FeedChange::Appended(added) => self.extend_hovers(added),
      FeedChange::Unchanged => {}
    }

    if let Some(e) = self.feed.take_transient_error() {
      self.set_error(format!("Couldn't load more results: {}", e));
    }

    for hover in &mut self.hovers {
      hover.poll_timers(&self.view.cards);
    }

    self.request_images();
    self.thumbs.drain();
  }

  fn rebuild_hovers(&mut self) {
    for hover in &mut self.hovers {
      hover.teardown();
    }
    self.hovers = self
      .feed
      .items()
      .iter()
      .enumerate()
      .map(|(i, item)| HoverPreviewController::new(card_key(i, &item.id)))
      .collect();
    self.scroll = 0;
    self.focused = None;
    self.pointer.reset();
    self.view.overlays.clear();
    self.view.cards.0.clear();
    self.thumbs.clear();
    self.scroll_check_due = true;
    if !self.hovers.is_empty() {
      self.mode = AppMode::Grid;
    }
  }

  fn extend_hovers(&mut self, added: usize) {
    let start = self.hovers.len();
    let items = self.feed.items();
    let new = items.iter().enumerate().skip(start).map(|(i, item)| HoverPreviewController::new(card_key(i, &item.id)));
    self.hovers.extend(new);
    debug!(added, total = self.hovers.len(), "hover controllers extended");
    self.scroll_check_due = true;
  }

  fn request_images(&mut self) {
    if !self.display_mode.shows_thumbnails() {
      return;
    }
    for (i, hover) in self.hovers.iter().enumerate() {
      if hover.phase() != HoverPhase::PopupVisible {
        continue;
      }
      let Some(item) = self.feed.items().get(i) else { continue };
      let client = self.http_client.clone();
      let summary = item.clone();
      self.thumbs.request(&item.id, async move { fetch_thumbnail(&client, &summary).await });
      if let Some(url) = &item.channel_avatar_url {
        let client = self.http_client.clone();
        let owned = url.clone();
        self.thumbs.request(url, async move { fetch_image(&client, &owned).await });
      }
    }
  }

  // --- Feed actions ---

  pub fn trigger_search(&mut self) {
    let query = self.input.trim().to_string();
    if self.feed.search(&query) {
      info!(query = %query, "search triggered");
      self.clear_error();
      self.status_message = None;
    }
  }

  pub fn retry(&mut self) {
    if self.feed.retry() {
      self.clear_error();
    }
  }

  /// Re-run the near-bottom check once per item-list change, against the
  /// layout of the frame just drawn.
  pub fn after_draw(&mut self) {
    if std::mem::take(&mut self.scroll_check_due) {
      self.report_scroll();
    }
    self.refresh_pointer();
  }

  fn report_scroll(&mut self) {
    let Some(grid) = self.view.grid else { return };
    let count = self.feed.items().len();
    self.feed.on_scroll_position_changed(grid.visible_height(), self.scroll, grid.content_height(count));
  }

  /// Scroll by whole card rows; negative is up.
  pub fn scroll_by(&mut self, rows: isize) {
    let Some(grid) = self.view.grid else { return };
    let count = self.feed.items().len();
    let step = grid.card_height as usize * rows.unsigned_abs();
    let target = if rows < 0 { self.scroll.saturating_sub(step) } else { self.scroll.saturating_add(step) };
    let clamped = grid.clamp_scroll(target, count);
    if clamped != self.scroll {
      self.scroll = clamped;
      self.report_scroll();
    } else if rows > 0 {
      // Already at the end; still a scroll towards it.
      self.report_scroll();
    }
  }

  /// Move keyboard focus by `delta` cards. Focus behaves like the pointer
  /// entering the new card and leaving the old one.
  pub fn move_focus(&mut self, delta: isize) {
    let count = self.feed.items().len();
    if count == 0 {
      return;
    }
    let next = match self.focused {
      None => 0,
      Some(i) => i.saturating_add_signed(delta).min(count - 1),
    };
    if self.focused == Some(next) {
      return;
    }
    if let Some(old) = self.focused
      && let Some(hover) = self.hovers.get_mut(old)
    {
      hover.pointer_leave(HoverTarget::Card);
      hover.pointer_leave(HoverTarget::Overlay);
    }
    self.focused = Some(next);
    if let Some(hover) = self.hovers.get_mut(next) {
      hover.pointer_enter(HoverTarget::Card);
    }
    if let Some(grid) = self.view.grid {
      let scroll = grid.scroll_to_reveal(next, self.scroll);
      if scroll != self.scroll {
        self.scroll = scroll;
        self.report_scroll();
      }
    }
  }

  /// Focus step for a vertical move: one grid row.
  pub fn row_step(&self) -> isize {
    self.view.grid.map_or(1, |g| g.columns as isize)
  }

  // --- Pointer ---

  pub fn pointer_moved(&mut self, column: u16, row: u16) {
    self.pointer.set_position(column, row);
    self.refresh_pointer();
  }

  /// Re-hit-test the last pointer position against the last frame's geometry
  /// and forward enter/leave changes to the hover controllers.
  pub fn refresh_pointer(&mut self) {
    let Some((column, row)) = self.pointer.position() else { return };
    let hit = self.hit_test(column, row);
    for event in self.pointer.update(hit) {
      self.dispatch_pointer(event);
    }
  }

  fn hit_test(&self, column: u16, row: u16) -> Option<PointerTarget> {
    if let Some((index, _)) = self.view.overlays.iter().rev().find(|(_, r)| contains(*r, column, row)) {
      return Some(PointerTarget::overlay(*index));
    }
    let grid = self.view.grid?;
    grid.hit_test(self.feed.items().len(), self.scroll, column, row).map(PointerTarget::card)
  }

  fn dispatch_pointer(&mut self, event: PointerEvent) {
    match event {
      PointerEvent::Enter(t) => {
        if let Some(hover) = self.hovers.get_mut(t.index) {
          hover.pointer_enter(t.target);
        }
      }
      PointerEvent::Leave(t) => {
        if let Some(hover) = self.hovers.get_mut(t.index) {
          hover.pointer_leave(t.target);
        }
      }
    }
  }

  pub fn click(&mut self, column: u16, row: u16) {
    if let Some(target) = self.hit_test(column, row) {
      self.open_in_browser(target.index);
    }
  }

  pub fn open_focused(&mut self) {
    if let Some(index) = self.focused {
      self.open_in_browser(index);
    }
  }

  fn open_in_browser(&mut self, index: usize) {
    let Some(item) = self.feed.items().get(index) else { return };
    let url = item.watch_url();
    let title = item.title.clone();
    #[cfg(target_os = "macos")]
    let cmd = "open";
    #[cfg(not(target_os = "macos"))]
    let cmd = "xdg-open";
    match std::process::Command::new(cmd)
      .arg(&url)
      .stdin(std::process::Stdio::null())
      .stdout(std::process::Stdio::null())
      .stderr(std::process::Stdio::null())
      .spawn()
    {
      Ok(mut child) => {
        info!(url = %url, "opened in browser");
        self.status_message = Some(format!("Opened “{}”", title));
        std::thread::spawn(move || {
          let _ = child.wait();
        });
      }
      Err(e) => {
        warn!(url = %url, err = %e, "failed to open browser");
        self.set_error(format!("Failed to open browser: {}", e));
      }
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self.feed.phase(), FeedPhase::InitialLoading | FeedPhase::LoadingMore)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hover::{OverlayFrame, OverlayVisual};
  use crate::layout::overlay_rect;
  use crate::youtube::{PageRequest, SearchError, SearchPage, SearchProvider, VideoSummary};
  use futures::future::BoxFuture;
  use ratatui::{Terminal, backend::TestBackend};
  use std::sync::Arc;

  fn video(id: &str) -> VideoSummary {
    VideoSummary {
      id: id.to_string(),
      title: format!("Video {}", id),
      channel_name: "Channel".to_string(),
      thumbnail_url: String::new(),
      upload_time_display: "01/02/2024".to_string(),
      duration_display: Some("3:07".to_string()),
      views_display: None,
      channel_avatar_url: Some("avatar.png".to_string()),
      is_verified: None,
    }
  }

  /// Every search returns the same page of `count` videos.
  struct FixedProvider {
    count: usize,
  }

  impl SearchProvider for FixedProvider {
    fn search(&self, _request: PageRequest) -> BoxFuture<'static, Result<SearchPage, SearchError>> {
      let items = (0..self.count).map(|i| video(&format!("v{}", i))).collect();
      Box::pin(async move { Ok(SearchPage { items, next_page_token: None }) })
    }
  }

  fn app(count: usize) -> App {
    let feed = PagedFeedController::new(Arc::new(FixedProvider { count }), 20);
    App::new(feed, reqwest::Client::new(), DisplayMode::Off, Config::default(), "rust".to_string())
  }

  async fn loaded(count: usize) -> App {
    let mut app = app(count);
    app.trigger_search();
    while app.hovers.is_empty() {
      tokio::time::sleep(Duration::from_millis(1)).await;
      app.check_pending();
    }
    // 100x21 grid: two columns, three rows of cards.
    app.view.grid = Some(GridLayout::new(Rect::new(0, 0, 100, 21)));
    app
  }

  // --- feed wiring ---

  #[tokio::test(start_paused = true)]
  async fn results_build_one_hover_per_card() {
    let app = loaded(5).await;
    assert_eq!(app.mode, AppMode::Grid);
    assert_eq!(app.hovers.len(), 5);
    assert_eq!(app.hovers[3].card_id(), "3:v3");
    assert!(app.hovers.iter().all(|h| h.phase() == HoverPhase::Idle));
  }

  #[tokio::test(start_paused = true)]
  async fn blank_input_is_ignored() {
    let mut app = app(3);
    app.input = "   ".to_string();
    app.trigger_search();
    assert_eq!(app.feed.phase(), FeedPhase::Idle);
    assert!(app.last_error.is_none());
  }

  // --- focus ---

  #[tokio::test(start_paused = true)]
  async fn focus_moves_hover_between_cards() {
    let mut app = loaded(6).await;
    app.move_focus(1);
    assert_eq!(app.focused, Some(0));
    assert_eq!(app.hovers[0].phase(), HoverPhase::Hovering);

    app.move_focus(app.row_step());
    assert_eq!(app.focused, Some(2));
    assert_eq!(app.hovers[0].phase(), HoverPhase::Idle);
    assert_eq!(app.hovers[2].phase(), HoverPhase::Hovering);

    app.move_focus(100);
    assert_eq!(app.focused, Some(5));
    app.move_focus(-100);
    assert_eq!(app.focused, Some(0));
  }

  #[tokio::test(start_paused = true)]
  async fn focus_scrolls_card_into_view() {
    let mut app = loaded(10).await;
    app.move_focus(1);
    app.move_focus(8);
    assert_eq!(app.focused, Some(8));
    assert_eq!(app.scroll, 14);
  }

  // --- pointer ---

  #[tokio::test(start_paused = true)]
  async fn pointer_hover_starts_on_card_under_cursor() {
    let mut app = loaded(6).await;
    app.pointer_moved(60, 10);
    assert_eq!(app.hovers[3].phase(), HoverPhase::Hovering);
    app.pointer_moved(10, 10);
    assert_eq!(app.hovers[3].phase(), HoverPhase::Idle);
    assert_eq!(app.hovers[2].phase(), HoverPhase::Hovering);
  }

  #[tokio::test(start_paused = true)]
  async fn overlay_wins_hit_test() {
    let mut app = loaded(6).await;
    app.view.overlays.push((0, Rect::new(0, 0, 60, 16)));
    assert_eq!(app.hit_test(55, 10), Some(PointerTarget::overlay(0)));
    assert_eq!(app.hit_test(70, 10), Some(PointerTarget::card(3)));
  }

  /// Focus card 2 and wait until its popup is fully visible, drawing first so
  /// the card has an on-screen rectangle to anchor to.
  async fn popup_on_card_two(terminal: &mut Terminal<TestBackend>, app: &mut App) {
    terminal.draw(|frame| crate::ui::ui(frame, app)).unwrap();
    app.move_focus(1);
    app.move_focus(app.row_step());
    assert_eq!(app.focused, Some(2));
    tokio::time::sleep(Duration::from_millis(constants().show_delay_ms + 1)).await;
    app.check_pending();
    tokio::time::sleep(Duration::from_millis(constants().reveal_delay_ms + 1)).await;
    app.check_pending();
    assert_eq!(app.hovers[2].phase(), HoverPhase::PopupVisible);
  }

  #[tokio::test(start_paused = true)]
  async fn overlay_stays_at_captured_anchor_when_scrolled() {
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    let mut app = loaded(10).await;
    popup_on_card_two(&mut terminal, &mut app).await;
    let anchor = app.hovers[2].anchor().unwrap();
    // Results panel sits under the one-row header.
    let main_area = Rect::new(0, 1, 100, 24);
    let expected = overlay_rect(OverlayFrame { anchor, visual: OverlayVisual::Visible }, main_area);

    app.scroll_by(1);
    terminal.draw(|frame| crate::ui::ui(frame, &mut app)).unwrap();
    assert_eq!(app.scroll, 7);
    let card_now = app.view.cards.0[&card_key(2, "v2")];
    assert!(card_now.y < anchor.top);
    assert_eq!(app.view.overlays, vec![(2, expected)]);

    // Card row scrolled out entirely; the overlay is still drawn.
    app.scroll_by(1);
    terminal.draw(|frame| crate::ui::ui(frame, &mut app)).unwrap();
    assert!(!app.view.cards.0.contains_key(&card_key(2, "v2")));
    assert_eq!(app.view.overlays, vec![(2, expected)]);
  }

  #[tokio::test(start_paused = true)]
  async fn visible_popup_loads_and_draws_channel_avatar() {
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    let mut app = loaded(10).await;
    app.display_mode = DisplayMode::Ascii;
    let white = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255])));
    app.thumbs.images.insert("v2".to_string(), white.clone());
    popup_on_card_two(&mut terminal, &mut app).await;
    assert!(!app.thumbs.wants("avatar.png"));

    app.thumbs.failed.remove("avatar.png");
    app.thumbs.pending.remove("avatar.png");
    app.thumbs.images.insert("avatar.png".to_string(), white);
    terminal.draw(|frame| crate::ui::ui(frame, &mut app)).unwrap();
    let (_, overlay) = app.view.overlays[0];
    // Text block is the bottom four rows inside the border; avatar starts
    // after one column of padding.
    let text_top = overlay.bottom() - 5;
    let buffer = terminal.backend().buffer();
    assert_eq!(buffer[(overlay.x + 2, text_top)].symbol(), "@");
    assert_eq!(buffer[(overlay.x + 2, text_top + 3)].symbol(), "@");
  }

  #[tokio::test(start_paused = true)]
  async fn new_results_reset_open_popups() {
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
    let mut app = loaded(10).await;
    popup_on_card_two(&mut terminal, &mut app).await;

    app.trigger_search();
    while app.feed.phase() != FeedPhase::Ready {
      tokio::time::sleep(Duration::from_millis(1)).await;
      app.check_pending();
    }
    assert_eq!(app.focused, None);
    assert!(app.hovers.iter().all(|h| h.phase() == HoverPhase::Idle && h.overlay().is_none()));
    terminal.draw(|frame| crate::ui::ui(frame, &mut app)).unwrap();
    assert!(app.view.overlays.is_empty());
  }

  // --- scroll ---

  #[tokio::test(start_paused = true)]
  async fn scroll_is_clamped_to_content() {
    let mut app = loaded(10).await;
    app.scroll_by(1);
    assert_eq!(app.scroll, 7);
    app.scroll_by(10);
    assert_eq!(app.scroll, 14);
    app.scroll_by(-10);
    assert_eq!(app.scroll, 0);
  }

  // --- errors ---

  #[tokio::test(start_paused = true)]
  async fn errors_expire() {
    let mut app = app(0);
    app.set_error("boom".to_string());
    app.expire_error();
    assert!(app.last_error.is_some());
    app.error_time = Some(Instant::now() - Duration::from_secs(constants().error_dismiss_secs));
    app.expire_error();
    assert!(app.last_error.is_none());
  }
}
