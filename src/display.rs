use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliDisplayMode {
  Auto,
  Direct,
  Ascii,
  Off,
}

/// How preview thumbnails are drawn inside the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  /// No thumbnails are fetched or drawn.
  Off,
  Ascii,
  /// True-colour half-block cells.
  Direct,
}

impl DisplayMode {
  pub fn label(self) -> &'static str {
    match self {
      DisplayMode::Off => "off",
      DisplayMode::Ascii => "ascii",
      DisplayMode::Direct => "half-block",
    }
  }

  pub fn shows_thumbnails(self) -> bool {
    self != DisplayMode::Off
  }
}

/// Pick half-block rendering when the terminal advertises true colour.
pub fn detect_display_mode() -> DisplayMode {
  let colorterm = std::env::var("COLORTERM").unwrap_or_default().to_lowercase();
  display_mode_for(&colorterm)
}

fn display_mode_for(colorterm: &str) -> DisplayMode {
  if colorterm == "truecolor" || colorterm == "24bit" { DisplayMode::Direct } else { DisplayMode::Ascii }
}

pub fn resolve_display_mode(cli: CliDisplayMode) -> DisplayMode {
  match cli {
    CliDisplayMode::Auto => detect_display_mode(),
    CliDisplayMode::Direct => DisplayMode::Direct,
    CliDisplayMode::Ascii => DisplayMode::Ascii,
    CliDisplayMode::Off => DisplayMode::Off,
  }
}
