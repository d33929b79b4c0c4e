use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::constants::constants;
use crate::display::CliDisplayMode;

/// User preferences persisted in `prefs.toml`. Every field is optional; the CLI
/// and embedded constants fill whatever is missing.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub api_key: Option<String>,
  pub default_query: Option<String>,
  pub page_size: Option<u32>,
  pub theme_name: Option<String>,
  pub thumbnails: Option<CliDisplayMode>,
}

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", &constants().app_name)
}

pub fn config_path() -> Option<PathBuf> {
  project_dirs().map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  pub fn load() -> Self {
    let Some(path) = config_path() else { return Self::default() };
    match std::fs::read_to_string(&path) {
      Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), err = %e, "ignoring unreadable prefs");
        Self::default()
      }),
      Err(_) => Self::default(),
    }
  }

  fn parse(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }

  pub fn save(&self) {
    let Some(path) = config_path() else { return };
    let Some(dir) = path.parent() else { return };
    if std::fs::create_dir_all(dir).is_ok()
      && let Ok(content) = toml::to_string(self)
      && let Err(e) = std::fs::write(&path, content)
    {
      warn!(path = %path.display(), err = %e, "failed to save prefs");
    }
  }
}
