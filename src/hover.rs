//! Per-card hover preview state machine.
//!
//! A card shows an enlarged preview overlay after the pointer rests on it for
//! the show delay. Once the overlay is up, only leaving the overlay closes it;
//! leaving the card underneath is ignored so the pointer can cross between the
//! two. Closing waits a short hide delay so an accidental exit can be undone.
//!
//! Timers are spawned tokio tasks owned by the controller through
//! [`TimerHandle`]s. A firing timer sends its kind and sequence number back
//! over the controller's channel; `poll_timers()` applies it only if that
//! timer is still the armed one, so a timer cancelled after it already fired
//! has no effect.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::constants::constants;

/// Viewport position of a card, captured when its popup is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorGeometry {
  pub top: u16,
  pub left: u16,
  pub width: u16,
}

/// Measures where a card currently sits on screen.
///
/// Returns `None` when the card is not mounted or not visible.
pub trait AnchorSource {
  fn anchor_of(&self, card_id: &str) -> Option<AnchorGeometry>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverPhase {
  Idle,
  /// Pointer is on the card, waiting out the show delay.
  Hovering,
  /// Overlay mounted in its hidden pose for one frame.
  PopupShown,
  PopupVisible,
  /// Pointer left the overlay; hide delay running.
  PopupClosing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverTarget {
  Card,
  Overlay,
}

/// Visual pose the overlay should be drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayVisual {
  Entering,
  Visible,
  Leaving,
}

/// Render instruction: draw the overlay at `anchor` in pose `visual`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayFrame {
  pub anchor: AnchorGeometry,
  pub visual: OverlayVisual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
  Show,
  Reveal,
  Close,
}

#[derive(Debug)]
struct TimerFired {
  kind: TimerKind,
  seq: u64,
}

/// A one-shot timer task. Dropping the handle cancels the timer.
struct TimerHandle {
  seq: u64,
  task: JoinHandle<()>,
}

impl Drop for TimerHandle {
  fn drop(&mut self) {
    self.task.abort();
  }
}

#[derive(Debug, Clone, Copy)]
struct HoverTimings {
  show: Duration,
  reveal: Duration,
  close: Duration,
}

impl Default for HoverTimings {
  fn default() -> Self {
    let c = constants();
    Self { show: c.show_delay(), reveal: c.reveal_delay(), close: c.close_delay() }
  }
}

pub struct HoverPreviewController {
  card_id: String,
  phase: HoverPhase,
  anchor: Option<AnchorGeometry>,
  timings: HoverTimings,
  show_timer: Option<TimerHandle>,
  reveal_timer: Option<TimerHandle>,
  close_timer: Option<TimerHandle>,
  next_seq: u64,
  tx: mpsc::UnboundedSender<TimerFired>,
  rx: mpsc::UnboundedReceiver<TimerFired>,
}

impl HoverPreviewController {
  pub fn new(card_id: impl Into<String>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      card_id: card_id.into(),
      phase: HoverPhase::Idle,
      anchor: None,
      timings: HoverTimings::default(),
      show_timer: None,
      reveal_timer: None,
      close_timer: None,
      next_seq: 0,
      tx,
      rx,
    }
  }

  #[cfg(test)]
  pub fn card_id(&self) -> &str {
    &self.card_id
  }

  pub fn phase(&self) -> HoverPhase {
    self.phase
  }

  pub fn anchor(&self) -> Option<AnchorGeometry> {
    self.anchor
  }

  /// Duration badge is shown whenever the pointer is not resting on the card.
  pub fn show_duration_badge(&self) -> bool {
    matches!(self.phase, HoverPhase::Idle | HoverPhase::PopupClosing)
  }

  /// "Keep hovering" hint while the show delay runs.
  pub fn show_keep_hovering_badge(&self) -> bool {
    self.phase == HoverPhase::Hovering
  }

  /// The card is dimmed while its overlay is mounted.
  pub fn card_dimmed(&self) -> bool {
    matches!(self.phase, HoverPhase::PopupShown | HoverPhase::PopupVisible | HoverPhase::PopupClosing)
  }

  pub fn overlay(&self) -> Option<OverlayFrame> {
    let visual = match self.phase {
      HoverPhase::PopupShown => OverlayVisual::Entering,
      HoverPhase::PopupVisible => OverlayVisual::Visible,
      HoverPhase::PopupClosing => OverlayVisual::Leaving,
      HoverPhase::Idle | HoverPhase::Hovering => return None,
    };
    self.anchor.map(|anchor| OverlayFrame { anchor, visual })
  }

  pub fn pointer_enter(&mut self, target: HoverTarget) {
    match (self.phase, target) {
      (HoverPhase::Idle, HoverTarget::Card) => {
        self.cancel_timers();
        self.show_timer = Some(self.arm(TimerKind::Show, self.timings.show));
        self.set_phase(HoverPhase::Hovering);
      }
      (HoverPhase::PopupClosing, _) => {
        self.close_timer = None;
        self.set_phase(HoverPhase::PopupVisible);
      }
      // Overlay re-entry while visible is a no-op; everything else has no overlay to enter.
      _ => {}
    }
  }

  pub fn pointer_leave(&mut self, target: HoverTarget) {
    match (self.phase, target) {
      (HoverPhase::Hovering, HoverTarget::Card) => {
        self.show_timer = None;
        self.set_phase(HoverPhase::Idle);
      }
      (HoverPhase::PopupShown | HoverPhase::PopupVisible, HoverTarget::Overlay) => {
        self.cancel_timers();
        self.close_timer = Some(self.arm(TimerKind::Close, self.timings.close));
        self.set_phase(HoverPhase::PopupClosing);
      }
      // Leaving the card once the overlay is up is ignored: only the overlay can close it.
      _ => {}
    }
  }

  /// Apply timers that have fired since the last call. Returns whether the phase changed.
  pub fn poll_timers(&mut self, anchors: &dyn AnchorSource) -> bool {
    let before = self.phase;
    while let Ok(fired) = self.rx.try_recv() {
      self.on_timer(fired, anchors);
    }
    self.phase != before
  }

  /// Cancel every pending timer. Called on unmount; also runs on drop.
  pub fn teardown(&mut self) {
    self.cancel_timers();
    while self.rx.try_recv().is_ok() {}
  }

  fn on_timer(&mut self, fired: TimerFired, anchors: &dyn AnchorSource) {
    let slot = match fired.kind {
      TimerKind::Show => &mut self.show_timer,
      TimerKind::Reveal => &mut self.reveal_timer,
      TimerKind::Close => &mut self.close_timer,
    };
    if slot.as_ref().map(|t| t.seq) != Some(fired.seq) {
      debug!(card = %self.card_id, kind = ?fired.kind, seq = fired.seq, "hover: ignoring cancelled timer");
      return;
    }
    *slot = None;

    match (fired.kind, self.phase) {
      (TimerKind::Show, HoverPhase::Hovering) => match anchors.anchor_of(&self.card_id) {
        Some(anchor) => {
          self.anchor = Some(anchor);
          self.reveal_timer = Some(self.arm(TimerKind::Reveal, self.timings.reveal));
          self.set_phase(HoverPhase::PopupShown);
        }
        None => {
          debug!(card = %self.card_id, "hover: card not measurable, skipping popup");
        }
      },
      (TimerKind::Reveal, HoverPhase::PopupShown) => self.set_phase(HoverPhase::PopupVisible),
      (TimerKind::Close, HoverPhase::PopupClosing) => {
        self.anchor = None;
        self.set_phase(HoverPhase::Idle);
      }
      _ => {}
    }
  }

  fn arm(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
    self.next_seq += 1;
    let seq = self.next_seq;
    let deadline = Instant::now() + delay;
    let tx = self.tx.clone();
    let task = tokio::spawn(async move {
      tokio::time::sleep_until(deadline).await;
      let _ = tx.send(TimerFired { kind, seq });
    });
    TimerHandle { seq, task }
  }

  fn cancel_timers(&mut self) {
    self.show_timer = None;
    self.reveal_timer = None;
    self.close_timer = None;
  }

  fn set_phase(&mut self, phase: HoverPhase) {
    if self.phase != phase {
      debug!(card = %self.card_id, from = ?self.phase, to = ?phase, "hover: transition");
      self.phase = phase;
    }
  }
}

impl Drop for HoverPreviewController {
  fn drop(&mut self) {
    self.cancel_timers();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  const CARD: AnchorGeometry = AnchorGeometry { top: 5, left: 10, width: 30 };

  /// Canned geometry that counts how often it was measured.
  struct FakeAnchors {
    geometry: Option<AnchorGeometry>,
    measured: Cell<usize>,
  }

  impl FakeAnchors {
    fn at(geometry: AnchorGeometry) -> Self {
      Self { geometry: Some(geometry), measured: Cell::new(0) }
    }

    fn unmounted() -> Self {
      Self { geometry: None, measured: Cell::new(0) }
    }
  }

  impl AnchorSource for FakeAnchors {
    fn anchor_of(&self, _card_id: &str) -> Option<AnchorGeometry> {
      self.measured.set(self.measured.get() + 1);
      self.geometry
    }
  }

  async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
  }

  /// Drive a fresh controller to `PopupVisible`.
  async fn visible(anchors: &FakeAnchors) -> HoverPreviewController {
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    wait(1_801).await;
    hover.poll_timers(anchors);
    assert_eq!(hover.phase(), HoverPhase::PopupShown);
    wait(11).await;
    hover.poll_timers(anchors);
    assert_eq!(hover.phase(), HoverPhase::PopupVisible);
    hover
  }

  // --- show delay ---

  #[tokio::test(start_paused = true)]
  async fn enter_arms_show_delay() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    assert_eq!(hover.phase(), HoverPhase::Hovering);
    assert!(hover.show_keep_hovering_badge());
    assert!(!hover.show_duration_badge());

    wait(1_700).await;
    assert!(!hover.poll_timers(&anchors));
    assert_eq!(hover.phase(), HoverPhase::Hovering);
    assert_eq!(anchors.measured.get(), 0);

    wait(101).await;
    assert!(hover.poll_timers(&anchors));
    assert_eq!(hover.phase(), HoverPhase::PopupShown);
    assert_eq!(hover.anchor(), Some(CARD));
    assert_eq!(anchors.measured.get(), 1);
    assert_eq!(hover.overlay(), Some(OverlayFrame { anchor: CARD, visual: OverlayVisual::Entering }));
  }

  #[tokio::test(start_paused = true)]
  async fn leave_before_delay_never_shows() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    wait(1_000).await;
    hover.pointer_leave(HoverTarget::Card);
    assert_eq!(hover.phase(), HoverPhase::Idle);

    wait(5_000).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::Idle);
    assert_eq!(hover.anchor(), None);
    assert_eq!(hover.overlay(), None);
    assert!(!hover.card_dimmed());
    assert_eq!(anchors.measured.get(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn timer_that_fired_before_leave_is_ignored() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    wait(1_850).await;
    // The show timer has fired and queued its event, but the leave lands first.
    hover.pointer_leave(HoverTarget::Card);
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::Idle);
    assert_eq!(anchors.measured.get(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn reentering_restarts_the_delay() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    wait(1_500).await;
    hover.pointer_leave(HoverTarget::Card);
    hover.pointer_enter(HoverTarget::Card);
    wait(1_400).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::Hovering);
    wait(401).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::PopupShown);
  }

  #[tokio::test(start_paused = true)]
  async fn unmeasurable_card_stays_hovering() {
    let anchors = FakeAnchors::unmounted();
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    wait(2_000).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::Hovering);
    assert_eq!(hover.overlay(), None);
    assert_eq!(anchors.measured.get(), 1);

    hover.pointer_leave(HoverTarget::Card);
    assert_eq!(hover.phase(), HoverPhase::Idle);
  }

  // --- popup ---

  #[tokio::test(start_paused = true)]
  async fn popup_reveals_after_micro_delay() {
    let anchors = FakeAnchors::at(CARD);
    let hover = visible(&anchors).await;
    assert!(hover.card_dimmed());
    assert!(!hover.show_keep_hovering_badge());
    assert_eq!(hover.overlay().map(|o| o.visual), Some(OverlayVisual::Visible));
  }

  #[tokio::test(start_paused = true)]
  async fn card_leave_is_ignored_once_popup_is_up() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    wait(1_801).await;
    hover.poll_timers(&anchors);
    hover.pointer_leave(HoverTarget::Card);
    assert_eq!(hover.phase(), HoverPhase::PopupShown);

    wait(11).await;
    hover.poll_timers(&anchors);
    hover.pointer_leave(HoverTarget::Card);
    hover.pointer_enter(HoverTarget::Card);
    assert_eq!(hover.phase(), HoverPhase::PopupVisible);

    wait(10_000).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::PopupVisible);
  }

  #[tokio::test(start_paused = true)]
  async fn overlay_enter_is_idempotent() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = visible(&anchors).await;
    hover.pointer_enter(HoverTarget::Overlay);
    hover.pointer_enter(HoverTarget::Overlay);
    assert_eq!(hover.phase(), HoverPhase::PopupVisible);
    assert_eq!(hover.anchor(), Some(CARD));
  }

  // --- closing ---

  #[tokio::test(start_paused = true)]
  async fn overlay_leave_closes_after_hide_delay() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = visible(&anchors).await;
    hover.pointer_leave(HoverTarget::Overlay);
    assert_eq!(hover.phase(), HoverPhase::PopupClosing);
    assert!(hover.show_duration_badge());
    assert!(hover.card_dimmed());
    assert_eq!(hover.overlay().map(|o| o.visual), Some(OverlayVisual::Leaving));

    wait(150).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::PopupClosing);

    wait(51).await;
    assert!(hover.poll_timers(&anchors));
    assert_eq!(hover.phase(), HoverPhase::Idle);
    assert_eq!(hover.anchor(), None);
    assert_eq!(hover.overlay(), None);
    assert!(!hover.card_dimmed());
  }

  #[tokio::test(start_paused = true)]
  async fn overlay_reenter_cancels_close() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = visible(&anchors).await;
    hover.pointer_leave(HoverTarget::Overlay);
    wait(100).await;
    hover.pointer_enter(HoverTarget::Overlay);
    assert_eq!(hover.phase(), HoverPhase::PopupVisible);

    wait(1_000).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::PopupVisible);
    assert_eq!(hover.anchor(), Some(CARD));
  }

  #[tokio::test(start_paused = true)]
  async fn overlay_leave_before_reveal_still_closes() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    wait(1_801).await;
    hover.poll_timers(&anchors);
    hover.pointer_leave(HoverTarget::Overlay);
    assert_eq!(hover.phase(), HoverPhase::PopupClosing);

    // The cancelled reveal must not resurrect the popup.
    wait(201).await;
    hover.poll_timers(&anchors);
    assert_eq!(hover.phase(), HoverPhase::Idle);
  }

  #[tokio::test(start_paused = true)]
  async fn new_hover_after_close_starts_fresh() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = visible(&anchors).await;
    hover.pointer_leave(HoverTarget::Overlay);
    wait(201).await;
    hover.poll_timers(&anchors);
    hover.pointer_enter(HoverTarget::Card);
    assert_eq!(hover.phase(), HoverPhase::Hovering);
    assert_eq!(hover.anchor(), None);
  }

  // --- teardown ---

  #[tokio::test(start_paused = true)]
  async fn teardown_cancels_pending_timers() {
    let anchors = FakeAnchors::at(CARD);
    let mut hover = HoverPreviewController::new("abc");
    hover.pointer_enter(HoverTarget::Card);
    hover.teardown();
    wait(5_000).await;
    hover.poll_timers(&anchors);
    assert_eq!(anchors.measured.get(), 0);
    assert_eq!(hover.overlay(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn dropped_timer_handle_aborts_task() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      let _ = tx.send(());
    });
    drop(TimerHandle { seq: 1, task });
    wait(100).await;
    assert!(rx.try_recv().is_err());
  }
}
