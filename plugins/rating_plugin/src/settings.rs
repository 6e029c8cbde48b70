use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/plugin/ratings";

/// Persisted plugin settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
        }
    }
}

impl Settings {
    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))
    }

    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// The key with all but its last four characters hidden.
    pub fn masked_key(&self) -> String {
        if !self.has_key() {
            return "(not set)".into();
        }
        let chars: Vec<char> = self.api_key.chars().collect();
        let shown = if chars.len() > 4 { 4 } else { 0 };
        let hidden = chars.len() - shown;
        "*".repeat(hidden) + &chars[hidden..].iter().collect::<String>()
    }
}

pub fn default_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("org", "socred", "socred")
        .context("no home directory for plugin settings")?;
    Ok(proj.config_dir().join("rating_plugin.toml"))
}
