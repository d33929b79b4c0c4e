use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::app::{App, AppMode};
use crate::feed::FeedPhase;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('r') {
    app.retry();
    return;
  }

  if key.code == KeyCode::Tab {
    app.mode = match app.mode {
      AppMode::Search if !app.feed.items().is_empty() => AppMode::Grid,
      _ => AppMode::Search,
    };
    return;
  }

  match app.mode {
    AppMode::Search => handle_search_key(app, key),
    AppMode::Grid => handle_grid_key(app, key),
  }
}

fn handle_search_key(app: &mut App, key: KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.trigger_search();
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Down => {
      if !app.feed.items().is_empty() {
        app.mode = AppMode::Grid;
      }
    }
    _ => {}
  }
}

fn handle_grid_key(app: &mut App, key: KeyEvent) {
  match key.code {
    KeyCode::Char('r') if app.feed.phase() == FeedPhase::Errored => {
      app.retry();
    }
    KeyCode::Enter | KeyCode::Char('o') => {
      app.open_focused();
    }
    KeyCode::Right | KeyCode::Char('l') => app.move_focus(1),
    KeyCode::Left | KeyCode::Char('h') => app.move_focus(-1),
    KeyCode::Down | KeyCode::Char('j') => app.move_focus(app.row_step()),
    KeyCode::Up | KeyCode::Char('k') => app.move_focus(-app.row_step()),
    KeyCode::PageDown => app.scroll_by(1),
    KeyCode::PageUp => app.scroll_by(-1),
    KeyCode::Char('/') => {
      app.mode = AppMode::Search;
    }
    KeyCode::Esc => {
      app.mode = AppMode::Search;
    }
    _ => {}
  }
}

pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
  match mouse.kind {
    MouseEventKind::Moved | MouseEventKind::Drag(_) => {
      app.pointer_moved(mouse.column, mouse.row);
    }
    MouseEventKind::ScrollDown => {
      app.scroll_by(1);
      app.refresh_pointer();
    }
    MouseEventKind::ScrollUp => {
      app.scroll_by(-1);
      app.refresh_pointer();
    }
    MouseEventKind::Down(MouseButton::Left) => {
      if !app.feed.items().is_empty() {
        app.mode = AppMode::Grid;
      }
      app.click(mouse.column, mouse.row);
    }
    _ => {}
  }
}
