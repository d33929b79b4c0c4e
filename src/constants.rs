//! Tunables embedded from `constants.ron` and parsed once on first access.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub app_name: String,
  pub default_query: String,

  // YouTube Data API
  pub api_base_url: String,
  pub page_size: u32,

  // Hover preview
  pub show_delay_ms: u64,
  pub reveal_delay_ms: u64,
  pub close_delay_ms: u64,

  // Feed
  pub scroll_threshold: usize,

  // Grid
  pub column_breakpoints: (u32, u32, u32),
  pub logical_units_per_cell: u32,
  pub card_height: u16,
  pub overlay_height: u16,
  pub overlay_grow: u16,

  // Main loop
  pub tick_ms: u64,
  pub error_dismiss_secs: u64,
}

impl Constants {
  pub fn show_delay(&self) -> Duration {
    Duration::from_millis(self.show_delay_ms)
  }

  pub fn reveal_delay(&self) -> Duration {
    Duration::from_millis(self.reveal_delay_ms)
  }

  pub fn close_delay(&self) -> Duration {
    Duration::from_millis(self.close_delay_ms)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.page_size, 20);
    assert_eq!(c.show_delay(), Duration::from_millis(1800));
    assert_eq!(c.close_delay(), Duration::from_millis(200));
    assert_eq!(c.scroll_threshold, 20);
    assert_eq!(c.column_breakpoints, (1200, 900, 600));
  }
}
