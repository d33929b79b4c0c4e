//! Grid geometry: column breakpoints, card placement under a scroll offset,
//! and where a card's preview overlay lands.

use ratatui::layout::Rect;
use std::collections::HashMap;

use crate::constants::constants;
use crate::hover::{AnchorGeometry, AnchorSource, OverlayFrame, OverlayVisual};

/// Number of grid columns for a width in logical units.
pub fn column_count(width: u32) -> usize {
  let (four, three, two) = constants().column_breakpoints;
  if width >= four {
    4
  } else if width >= three {
    3
  } else if width >= two {
    2
  } else {
    1
  }
}

/// Terminal columns to logical width units.
pub fn cells_to_logical(cells: u16) -> u32 {
  cells as u32 * constants().logical_units_per_cell
}

/// Stable key for the card at `index`; ids alone may repeat across pages.
pub fn card_key(index: usize, video_id: &str) -> String {
  format!("{}:{}", index, video_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
  pub area: Rect,
  pub columns: usize,
  pub card_width: u16,
  pub card_height: u16,
}

impl GridLayout {
  pub fn new(area: Rect) -> Self {
    let columns = column_count(cells_to_logical(area.width));
    let card_width = area.width / columns as u16;
    Self { area, columns, card_width, card_height: constants().card_height }
  }

  pub fn rows(&self, item_count: usize) -> usize {
    item_count.div_ceil(self.columns)
  }

  /// Total height of all cards, in terminal rows.
  pub fn content_height(&self, item_count: usize) -> usize {
    self.rows(item_count) * self.card_height as usize
  }

  pub fn visible_height(&self) -> usize {
    self.area.height as usize
  }

  /// Scroll offsets are kept on card-row boundaries.
  fn align(&self, lines: usize) -> usize {
    let h = self.card_height.max(1) as usize;
    lines.div_ceil(h) * h
  }

  pub fn max_scroll(&self, item_count: usize) -> usize {
    self.align(self.content_height(item_count).saturating_sub(self.visible_height()))
  }

  /// Clamp and align an arbitrary scroll offset.
  pub fn clamp_scroll(&self, scroll: usize, item_count: usize) -> usize {
    let h = self.card_height.max(1) as usize;
    ((scroll / h) * h).min(self.max_scroll(item_count))
  }

  /// Scroll offset that brings the card at `index` fully into view.
  pub fn scroll_to_reveal(&self, index: usize, scroll: usize) -> usize {
    let top = (index / self.columns) * self.card_height as usize;
    let bottom = top + self.card_height as usize;
    if top < scroll {
      top
    } else if bottom > scroll + self.visible_height() {
      self.align(bottom - self.visible_height()).min(top)
    } else {
      scroll
    }
  }

  /// On-screen rectangle of the card at `index`, clipped to the grid area.
  /// `None` when the card is scrolled out of view.
  pub fn card_rect(&self, index: usize, scroll: usize) -> Option<Rect> {
    let row = index / self.columns;
    let col = index % self.columns;
    let top = row * self.card_height as usize;
    let bottom = top + self.card_height as usize;
    if bottom <= scroll || top >= scroll + self.visible_height() || top < scroll {
      return None;
    }
    let y = self.area.y + (top - scroll) as u16;
    let x = self.area.x + col as u16 * self.card_width;
    let rect = Rect { x, y, width: self.card_width, height: self.card_height };
    Some(rect.intersection(self.area))
  }

  /// Cards currently on screen, with their rectangles.
  pub fn visible_cards(&self, item_count: usize, scroll: usize) -> Vec<(usize, Rect)> {
    let first_row = scroll.div_ceil(self.card_height.max(1) as usize);
    let start = first_row * self.columns;
    (start..item_count).map_while(|i| self.card_rect(i, scroll).map(|r| (i, r))).collect()
  }

  /// Index of the card under a screen position.
  pub fn hit_test(&self, item_count: usize, scroll: usize, column: u16, row: u16) -> Option<usize> {
    self.visible_cards(item_count, scroll).into_iter().find(|(_, r)| contains(*r, column, row)).map(|(i, _)| i)
  }
}

pub fn contains(rect: Rect, column: u16, row: u16) -> bool {
  column >= rect.x && column < rect.right() && row >= rect.y && row < rect.bottom()
}

/// Where to draw a card's overlay. Entering and leaving poses sit exactly on the
/// card; the visible pose grows around it and is kept inside `bounds`.
pub fn overlay_rect(frame: OverlayFrame, bounds: Rect) -> Rect {
  let c = constants();
  let anchor = frame.anchor;
  let (grow, height) = match frame.visual {
    OverlayVisual::Entering | OverlayVisual::Leaving => (0, c.card_height),
    OverlayVisual::Visible => (c.overlay_grow, c.overlay_height),
  };
  let width = anchor.width.saturating_add(grow * 2).min(bounds.width);
  let height = height.min(bounds.height);
  let x = anchor.left.saturating_sub(grow).max(bounds.x).min(bounds.right().saturating_sub(width));
  let y = anchor.top.saturating_sub(grow / 2).max(bounds.y).min(bounds.bottom().saturating_sub(height));
  Rect { x, y, width, height }
}

/// Card rectangles from the last rendered frame, keyed by [`card_key`].
#[derive(Debug, Default)]
pub struct CardRects(pub HashMap<String, Rect>);

impl AnchorSource for CardRects {
  fn anchor_of(&self, card_id: &str) -> Option<AnchorGeometry> {
    self.0.get(card_id).map(|r| AnchorGeometry { top: r.y, left: r.x, width: r.width })
  }
}
