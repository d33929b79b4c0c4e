use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, Padding, Paragraph},
};

use crate::app::{App, AppMode, ThumbnailCache};
use crate::display::DisplayMode;
use crate::feed::FeedPhase;
use crate::graphics::ThumbnailWidget;
use crate::hover::{HoverPreviewController, OverlayVisual};
use crate::layout::{GridLayout, card_key, overlay_rect};
use crate::theme::Theme;
use crate::youtube::VideoSummary;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// "1.2K views · 03/07/2024", skipping whichever half is missing.
fn meta_line(item: &VideoSummary) -> String {
  match (&item.views_display, item.upload_time_display.is_empty()) {
    (Some(views), false) => format!("{} · {}", views, item.upload_time_display),
    (Some(views), true) => views.clone(),
    (None, _) => item.upload_time_display.clone(),
  }
}

fn channel_label(item: &VideoSummary) -> String {
  if item.is_verified == Some(true) { format!("{} ✓", item.channel_name) } else { item.channel_name.clone() }
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  app.view.overlays.clear();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let left = Line::from(Span::styled(" ▦ ytgrid ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let label = format!("[{}] v{} ", app.display_mode.label(), env!("CARGO_PKG_VERSION"));
  let width = label.chars().count() as u16;
  let right = Line::from(Span::styled(label, Style::default().fg(theme.muted)));
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width: width.min(area.width), ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  match app.feed.phase() {
    FeedPhase::Idle => {
      forget_grid(app);
      render_message(frame, theme, area, welcome_lines(theme));
    }
    FeedPhase::InitialLoading => {
      forget_grid(app);
      let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("Searching '{}'…", app.feed.query()), Style::default().fg(theme.status))),
      ];
      render_message(frame, theme, area, lines);
    }
    FeedPhase::Errored => {
      forget_grid(app);
      let reason = app.feed.error().map(|e| e.to_string()).unwrap_or_default();
      let lines = vec![
        Line::from(""),
        Line::from(Span::styled("Search failed", Style::default().fg(theme.error).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(reason, Style::default().fg(theme.fg))),
        Line::from(""),
        Line::from(Span::styled("Press ^r to retry.", Style::default().fg(theme.muted))),
      ];
      render_message(frame, theme, area, lines);
    }
    FeedPhase::Ready | FeedPhase::LoadingMore if app.feed.items().is_empty() => {
      forget_grid(app);
      let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("No results for '{}'.", app.feed.query()), Style::default().fg(theme.fg))),
      ];
      render_message(frame, theme, area, lines);
    }
    FeedPhase::Ready | FeedPhase::LoadingMore => render_grid(frame, app, area),
  }
}

fn forget_grid(app: &mut App) {
  app.view.grid = None;
  app.view.cards.0.clear();
}

fn welcome_lines(theme: &Theme) -> Vec<Line<'static>> {
  vec![
    Line::from(""),
    Line::from(Span::styled("▦  Welcome to ytgrid", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Search YouTube and browse the results as cards.", Style::default().fg(theme.fg))),
    Line::from(Span::styled("Rest the pointer on a card to preview it.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Type a query below and press Enter.", Style::default().fg(theme.muted))),
  ]
}

fn render_message(frame: &mut Frame, theme: &Theme, area: Rect, lines: Vec<Line>) {
  let paragraph = Paragraph::new(lines).alignment(Alignment::Center).block(
    Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_grid(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let count = app.feed.items().len();
  let more = if app.feed.phase() == FeedPhase::LoadingMore {
    " · loading more…"
  } else if app.feed.has_more() {
    " · scroll for more"
  } else {
    ""
  };
  let title = format!(" '{}' · {} videos{} ", app.feed.query(), count, more);
  let block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(if app.mode == AppMode::Grid { theme.accent } else { theme.border }));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let grid = GridLayout::new(inner);
  app.scroll = grid.clamp_scroll(app.scroll, count);
  app.view.grid = Some(grid);

  let visible = grid.visible_cards(count, app.scroll);
  app.view.cards.0.clear();
  for &(i, rect) in &visible {
    let (Some(item), Some(hover)) = (app.feed.items().get(i), app.hovers.get(i)) else { continue };
    render_card(frame, theme, item, hover, app.focused == Some(i), rect);
    app.view.cards.0.insert(card_key(i, &item.id), rect);
  }

  // Overlays go on top of every card and stay where their popup opened, even
  // once the card itself has scrolled away.
  for (i, hover) in app.hovers.iter().enumerate() {
    let Some(overlay) = hover.overlay() else { continue };
    let Some(item) = app.feed.items().get(i) else { continue };
    let overlay_area = overlay_rect(overlay, area);
    render_overlay(frame, theme, item, overlay.visual, overlay_area, &mut app.thumbs, app.display_mode);
    app.view.overlays.push((i, overlay_area));
  }
}

fn render_card(
  frame: &mut Frame,
  theme: &Theme,
  item: &VideoSummary,
  hover: &HoverPreviewController,
  focused: bool,
  area: Rect,
) {
  let dimmed = hover.card_dimmed();
  let text_fg = if dimmed { theme.dim } else { theme.fg };
  let muted_fg = if dimmed { theme.dim } else { theme.muted };
  let border_fg = if focused { theme.focus } else { theme.border };

  let block = Block::bordered()
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_fg))
    .padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);
  if inner.is_empty() {
    return;
  }

  let w = inner.width as usize;
  let lines = vec![
    Line::from(Span::styled(truncate_str(&item.title, w), Style::default().fg(text_fg).add_modifier(Modifier::BOLD))),
    Line::from(Span::styled(truncate_str(&channel_label(item), w), Style::default().fg(muted_fg))),
    Line::from(Span::styled(truncate_str(&meta_line(item), w), Style::default().fg(muted_fg))),
  ];
  frame.render_widget(Paragraph::new(lines), inner);

  let badge_row = Rect { y: inner.bottom().saturating_sub(1), height: 1, ..inner };
  let badge_style = Style::default().fg(theme.badge_fg).bg(theme.badge_bg);
  if hover.show_keep_hovering_badge() {
    let badge = truncate_str(" Keep hovering to preview ", w);
    frame.render_widget(Line::from(Span::styled(badge, badge_style)), badge_row);
  } else if hover.show_duration_badge()
    && let Some(duration) = &item.duration_display
  {
    let badge = format!(" {} ", duration);
    let width = (badge.chars().count() as u16).min(badge_row.width);
    let right = Rect { x: badge_row.right().saturating_sub(width), width, ..badge_row };
    frame.render_widget(Line::from(Span::styled(badge, badge_style)), right);
  }
}

const AVATAR_WIDTH: u16 = 8;

fn render_overlay(
  frame: &mut Frame,
  theme: &Theme,
  item: &VideoSummary,
  visual: OverlayVisual,
  area: Rect,
  thumbs: &mut ThumbnailCache,
  display_mode: DisplayMode,
) {
  frame.render_widget(Clear, area);
  let block = Block::bordered()
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.focus))
    .style(Style::default().bg(theme.overlay_bg));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  // Entering and leaving poses are only the outline.
  if visual != OverlayVisual::Visible || inner.height < 4 {
    return;
  }

  let [thumb_area, text_area] = Layout::vertical([Constraint::Min(1), Constraint::Length(4)]).areas(inner);
  if display_mode.shows_thumbnails() {
    if let Some(image) = thumbs.fitted(&item.id, thumb_area, display_mode) {
      frame.render_widget(ThumbnailWidget { image, display_mode }, thumb_area);
    } else if thumbs.is_loading(&item.id) {
      let placeholder =
        Paragraph::new("loading preview…").alignment(Alignment::Center).style(Style::default().fg(theme.muted));
      frame.render_widget(placeholder, thumb_area);
    }
  }

  // Channel avatar, once loaded, sits left of the text.
  let mut text_area = text_area;
  if display_mode.shows_thumbnails()
    && let Some(url) = item.channel_avatar_url.as_deref()
    && text_area.width > AVATAR_WIDTH * 3
  {
    let [_, avatar_area, rest] =
      Layout::horizontal([Constraint::Length(1), Constraint::Length(AVATAR_WIDTH), Constraint::Min(1)])
        .areas(text_area);
    if let Some(image) = thumbs.fitted(url, avatar_area, display_mode) {
      frame.render_widget(ThumbnailWidget { image, display_mode }, avatar_area);
      text_area = rest;
    }
  }

  let w = text_area.width.saturating_sub(2) as usize;
  let duration = item.duration_display.as_deref().unwrap_or("");
  let lines = vec![
    Line::from(Span::styled(truncate_str(&item.title, w), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(Span::styled(truncate_str(&channel_label(item), w), Style::default().fg(theme.muted))),
    Line::from(Span::styled(truncate_str(&meta_line(item), w), Style::default().fg(theme.muted))),
    Line::from(vec![
      Span::styled(duration.to_string(), Style::default().fg(theme.badge_fg).bg(theme.badge_bg)),
      Span::raw("  "),
      Span::styled("Enter/click to open", Style::default().fg(theme.accent)),
    ]),
  ];
  frame.render_widget(Paragraph::new(lines).block(Block::default().padding(Padding::horizontal(1))), text_area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if app.is_loading() {
    let msg = match app.feed.phase() {
      FeedPhase::LoadingMore => "Loading more…".to_string(),
      _ => format!("Searching '{}'…", app.feed.query()),
    };
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(msg) = &app.status_message {
    (format!(" {}", msg), Style::default().fg(theme.status))
  } else if !app.feed.items().is_empty() {
    let end = if app.feed.has_more() { "" } else { " · end of results" };
    (format!(" {} videos{}", app.feed.items().len(), end), Style::default().fg(theme.muted))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Search { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search YouTube ")
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Search {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn footer_keys(app: &App) -> Vec<(&'static str, &'static str)> {
  let has_results = !app.feed.items().is_empty();
  let errored = app.feed.phase() == FeedPhase::Errored;
  let mut keys = match app.mode {
    AppMode::Search => {
      let mut k = vec![("Enter", "Search")];
      if has_results {
        k.push(("Tab", "Grid"));
      }
      k.push(("Esc", if app.input.is_empty() { "Quit" } else { "Clear" }));
      k
    }
    AppMode::Grid => vec![("←↑↓→", "Focus"), ("Enter", "Open"), ("PgUp/PgDn", "Scroll"), ("Tab", "Search")],
  };
  if errored {
    keys.push(("^r", "Retry"));
  }
  keys.push(("^t", "Theme"));
  keys
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys = footer_keys(app);

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item() -> VideoSummary {
    VideoSummary {
      id: "abc".to_string(),
      title: "A video".to_string(),
      channel_name: "Someone".to_string(),
      thumbnail_url: String::new(),
      upload_time_display: "03/07/2024".to_string(),
      duration_display: Some("4:20".to_string()),
      views_display: Some("1.2K views".to_string()),
      channel_avatar_url: None,
      is_verified: None,
    }
  }

  // --- display_width ---

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("abc", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
    assert_eq!(display_width("", 3), 0);
  }

  // --- truncate_str ---

  #[test]
  fn truncate_keeps_short_strings() {
    assert_eq!(truncate_str("hello", 5), "hello");
    assert_eq!(truncate_str("hello world", 6), "hello…");
  }

  // --- meta_line ---

  #[test]
  fn meta_line_joins_available_parts() {
    let mut v = item();
    assert_eq!(meta_line(&v), "1.2K views · 03/07/2024");
    v.views_display = None;
    assert_eq!(meta_line(&v), "03/07/2024");
    v.views_display = Some("7 views".to_string());
    v.upload_time_display.clear();
    assert_eq!(meta_line(&v), "7 views");
  }

  #[test]
  fn verified_channels_get_a_check() {
    let mut v = item();
    assert_eq!(channel_label(&v), "Someone");
    v.is_verified = Some(true);
    assert_eq!(channel_label(&v), "Someone ✓");
  }
}
