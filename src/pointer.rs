//! Turns raw mouse positions into enter/leave events for cards and overlays.

use crate::hover::HoverTarget;

/// What the pointer is over: a card or a card's overlay, by card index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerTarget {
  pub index: usize,
  pub target: HoverTarget,
}

impl PointerTarget {
  pub fn card(index: usize) -> Self {
    Self { index, target: HoverTarget::Card }
  }

  pub fn overlay(index: usize) -> Self {
    Self { index, target: HoverTarget::Overlay }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
  Enter(PointerTarget),
  Leave(PointerTarget),
}

/// Remembers the last hit target and the last mouse position.
#[derive(Debug, Default)]
pub struct PointerTracker {
  current: Option<PointerTarget>,
  position: Option<(u16, u16)>,
}

impl PointerTracker {
  pub fn position(&self) -> Option<(u16, u16)> {
    self.position
  }

  #[cfg(test)]
  pub fn current(&self) -> Option<PointerTarget> {
    self.current
  }

  pub fn set_position(&mut self, column: u16, row: u16) {
    self.position = Some((column, row));
  }

  /// Record the target now under the pointer. Emits a leave for the old target
  /// before the enter for the new one; nothing when the target is unchanged.
  pub fn update(&mut self, hit: Option<PointerTarget>) -> Vec<PointerEvent> {
    if hit == self.current {
      return Vec::new();
    }
    let mut events = Vec::with_capacity(2);
    if let Some(old) = self.current.take() {
      events.push(PointerEvent::Leave(old));
    }
    if let Some(new) = hit {
      events.push(PointerEvent::Enter(new));
    }
    self.current = hit;
    events
  }

  /// Forget the current target without emitting events (the cards it referred to are gone).
  pub fn reset(&mut self) {
    self.current = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn enter_then_move_between_cards() {
    let mut t = PointerTracker::default();
    assert_eq!(t.update(Some(PointerTarget::card(0))), [PointerEvent::Enter(PointerTarget::card(0))]);
    assert!(t.update(Some(PointerTarget::card(0))).is_empty());
    assert_eq!(
      t.update(Some(PointerTarget::card(1))),
      [PointerEvent::Leave(PointerTarget::card(0)), PointerEvent::Enter(PointerTarget::card(1))]
    );
    assert_eq!(t.update(None), [PointerEvent::Leave(PointerTarget::card(1))]);
    assert_eq!(t.current(), None);
  }

  #[test]
  fn card_to_its_overlay() {
    let mut t = PointerTracker::default();
    t.update(Some(PointerTarget::card(2)));
    assert_eq!(
      t.update(Some(PointerTarget::overlay(2))),
      [PointerEvent::Leave(PointerTarget::card(2)), PointerEvent::Enter(PointerTarget::overlay(2))]
    );
  }

  #[test]
  fn reset_is_silent() {
    let mut t = PointerTracker::default();
    t.set_position(3, 4);
    t.update(Some(PointerTarget::card(0)));
    t.reset();
    assert_eq!(t.current(), None);
    assert_eq!(t.position(), Some((3, 4)));
    assert_eq!(t.update(Some(PointerTarget::card(0))), [PointerEvent::Enter(PointerTarget::card(0))]);
  }
}
