mod app;
mod config;
mod constants;
mod display;
mod feed;
mod format;
mod graphics;
mod hover;
mod input;
mod layout;
mod logging;
mod pointer;
mod theme;
mod ui;
mod youtube;

use anyhow::{Context, Result, bail};
use clap::Parser;
use ratatui::{
  DefaultTerminal,
  crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
  },
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use app::App;
use config::Config;
use constants::constants;
use display::CliDisplayMode;
use feed::PagedFeedController;
use youtube::YouTubeClient;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Search to run at startup (default: prefs, then the built-in query)
  #[arg(short, long)]
  query: Option<String>,

  /// YouTube Data API v3 key
  #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
  api_key: Option<String>,

  /// Results requested per page
  #[arg(long)]
  page_size: Option<u32>,

  /// Thumbnail rendering: 'auto', 'direct', 'ascii' or 'off'
  #[arg(short, long)]
  display_mode: Option<CliDisplayMode>,
}

/// Settings after layering CLI flags over prefs over built-in constants.
struct Settings {
  api_key: String,
  query: String,
  page_size: u32,
  display_mode: CliDisplayMode,
}

fn resolve_settings(args: Args, config: &Config) -> Result<Settings> {
  let Some(api_key) = args.api_key.or_else(|| config.api_key.clone()).filter(|k| !k.trim().is_empty()) else {
    bail!(
      "No YouTube API key. Pass --api-key, set YOUTUBE_API_KEY, or add api_key to {}",
      config::config_path().map_or_else(|| "prefs.toml".to_string(), |p| p.display().to_string())
    );
  };
  let query = args.query.or_else(|| config.default_query.clone()).unwrap_or_else(|| constants().default_query.clone());
  let page_size = args.page_size.or(config.page_size).unwrap_or(constants().page_size).clamp(1, 50);
  let display_mode = args.display_mode.or(config.thumbnails).unwrap_or(CliDisplayMode::Auto);
  Ok(Settings { api_key, query, page_size, display_mode })
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = logging::init();

  let config = Config::load();
  let settings = resolve_settings(args, &config)?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  execute!(std::io::stdout(), EnableMouseCapture).context("Failed to enable mouse capture")?;
  let result = run(&mut terminal, settings, config).await;
  let _ = execute!(std::io::stdout(), DisableMouseCapture);
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, settings: Settings, config: Config) -> Result<()> {
  let display_mode = display::resolve_display_mode(settings.display_mode);
  let http = reqwest::Client::builder()
    .user_agent(concat!("ytgrid/", env!("CARGO_PKG_VERSION")))
    .build()
    .context("Failed to build HTTP client")?;
  let provider = Arc::new(YouTubeClient::new(http.clone(), settings.api_key));
  let feed = PagedFeedController::new(provider, settings.page_size);

  info!(display_mode = display_mode.label(), page_size = settings.page_size, "starting");
  let mut app = App::new(feed, http, display_mode, config, settings.query);
  app.trigger_search();

  let tick = Duration::from_millis(constants().tick_ms);
  loop {
    app.check_pending();

    terminal.draw(|frame| ui::ui(frame, &mut app)).context("Failed to draw frame")?;
    app.after_draw();

    if event::poll(tick)? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => input::handle_key_event(&mut app, key),
        Event::Mouse(mouse) => input::handle_mouse_event(&mut app, mouse),
        _ => {}
      }
    }

    app.expire_error();

    if app.should_quit {
      break;
    }
  }

  info!("shutting down");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args() -> Args {
    Args { query: None, api_key: None, page_size: None, display_mode: None }
  }

  #[test]
  fn cli_overrides_prefs() {
    let config = Config {
      api_key: Some("from-prefs".into()),
      default_query: Some("jazz".into()),
      page_size: Some(10),
      ..Config::default()
    };
    let cli = Args {
      api_key: Some("k".into()),
      query: Some("rust".into()),
      display_mode: Some(CliDisplayMode::Ascii),
      ..args()
    };
    let s = resolve_settings(cli, &config).unwrap();
    assert_eq!(s.api_key, "k");
    assert_eq!(s.query, "rust");
    assert_eq!(s.page_size, 10);
    assert_eq!(s.display_mode, CliDisplayMode::Ascii);
  }

  #[test]
  fn prefs_fill_missing_flags() {
    let config = Config { api_key: Some("from-prefs".into()), ..Config::default() };
    let s = resolve_settings(Args { page_size: Some(500), ..args() }, &config).unwrap();
    assert_eq!(s.api_key, "from-prefs");
    assert_eq!(s.query, constants().default_query);
    assert_eq!(s.page_size, 50);
    assert_eq!(s.display_mode, CliDisplayMode::Auto);
  }

  #[test]
  fn missing_api_key_is_an_error() {
    let config = Config { api_key: Some("  ".into()), ..Config::default() };
    assert!(resolve_settings(args(), &config).is_err());
  }

  #[test]
  fn cli_flags_parse() {
    let parsed = Args::parse_from(["ytgrid", "--query", "rust", "--page-size", "5", "--display-mode", "off"]);
    assert_eq!(parsed.query.as_deref(), Some("rust"));
    assert_eq!(parsed.page_size, Some(5));
    assert_eq!(parsed.display_mode, Some(CliDisplayMode::Off));
  }
}
