use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use url::Url;

use crate::{cli::Cli, services::storage::default_data_dir};

/// Runtime configuration resolved from file, env and CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the social credit backend.
    pub api_base: Url,
    /// Directory holding the local session store.
    pub data_dir: PathBuf,
    pub logging_enabled: bool,
    /// Quiet period before an interactive lookup fires.
    pub search_debounce: Duration,
    /// How long a first logout click stays armed.
    pub logout_arm: Duration,
    /// Duration of each disarm fade stage.
    pub logout_fade: Duration,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    api: FileApi,
    #[serde(default)]
    search: FileSearch,
    #[serde(default)]
    logout: FileLogout,
    #[serde(default)]
    logging: FileLogging,
    #[serde(default)]
    data_dir: Option<PathBuf>,
}

#[derive(Deserialize)]
struct FileApi {
    #[serde(default = "default_api_base")]
    base_url: String,
}

#[derive(Deserialize)]
struct FileSearch {
    #[serde(default = "default_debounce_ms")]
    debounce_ms: u64,
}

#[derive(Deserialize)]
struct FileLogout {
    #[serde(default = "default_arm_ms")]
    arm_ms: u64,
    #[serde(default = "default_fade_ms")]
    fade_ms: u64,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_api_base() -> String {
    "http://localhost:8000".into()
}

fn default_debounce_ms() -> u64 {
    700
}

fn default_arm_ms() -> u64 {
    3000
}

fn default_fade_ms() -> u64 {
    400
}

fn default_logging() -> bool {
    true
}

impl Default for FileApi {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
        }
    }
}

impl Default for FileSearch {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for FileLogout {
    fn default() -> Self {
        Self {
            arm_ms: default_arm_ms(),
            fade_ms: default_fade_ms(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("SOCRED_CONFIG").ok().map(PathBuf::from))
            .or_else(default_config_path);

        let mut file_cfg = FileConfig::default();
        if let Some(path) = config_path {
            if let Ok(bytes) = fs::read(&path) {
                let contents = String::from_utf8_lossy(&bytes);
                file_cfg = toml::from_str(&contents)
                    .with_context(|| format!("invalid config file {}", path.display()))?;
            }
        }

        let mut api_base = file_cfg.api.base_url;
        let mut logging = file_cfg.logging.enabled;
        let mut data_dir = file_cfg.data_dir;

        // environment overrides
        if let Ok(b) = std::env::var("SOCRED_API_BASE") {
            api_base = b;
        }
        if let Ok(l) = std::env::var("SOCRED_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }
        if let Ok(d) = std::env::var("SOCRED_DATA_DIR") {
            data_dir = Some(PathBuf::from(d));
        }

        // CLI overrides
        if let Some(b) = &cli.api_base {
            api_base = b.clone();
        }
        if let Some(d) = &cli.data_dir {
            data_dir = Some(d.clone());
        }

        let api_base = parse_api_base(&api_base)?;
        let data_dir = match data_dir {
            Some(d) => d,
            None => default_data_dir()?,
        };

        Ok(Self {
            api_base,
            data_dir,
            logging_enabled: logging,
            search_debounce: Duration::from_millis(file_cfg.search.debounce_ms),
            logout_arm: Duration::from_millis(file_cfg.logout.arm_ms),
            logout_fade: Duration::from_millis(file_cfg.logout.fade_ms),
        })
    }
}

fn parse_api_base(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid api base url {raw:?}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("api base url must be http or https, got {}", url.scheme());
    }
    Ok(url)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "socred", "socred").map(|p| p.config_dir().join("socred.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn clear_env() {
        std::env::remove_var("SOCRED_API_BASE");
        std::env::remove_var("SOCRED_LOGGING");
        std::env::remove_var("SOCRED_DATA_DIR");
        std::env::remove_var("SOCRED_CONFIG");
    }

    fn cli_for(path: PathBuf, dir: &tempfile::TempDir) -> Cli {
        Cli {
            config: Some(path),
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    #[serial]
    fn valid_config_parses() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(
            &path,
            "[api]\nbase_url=\"https://credit.example\"\n[search]\ndebounce_ms=250\n[logging]\nenabled=false\n",
        )
        .unwrap();
        let cfg = Config::load(&cli_for(path, &dir)).unwrap();
        assert_eq!(cfg.api_base.as_str(), "https://credit.example/");
        assert_eq!(cfg.search_debounce, Duration::from_millis(250));
        assert!(!cfg.logging_enabled);
    }

    #[test]
    #[serial]
    fn missing_keys_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "").unwrap();
        let cfg = Config::load(&cli_for(path, &dir)).unwrap();
        assert_eq!(cfg.api_base.as_str(), "http://localhost:8000/");
        assert_eq!(cfg.search_debounce, Duration::from_millis(700));
        assert_eq!(cfg.logout_arm, Duration::from_millis(3000));
        assert!(cfg.logging_enabled);
    }

    #[test]
    #[serial]
    fn precedence_cli_env_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[api]\nbase_url=\"http://file:1111\"\n").unwrap();
        std::env::set_var("SOCRED_API_BASE", "http://env:2222");
        let mut cli = cli_for(path.clone(), &dir);
        cli.api_base = Some("http://cli:3333".into());
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.api_base.as_str(), "http://cli:3333/");

        let cfg = Config::load(&cli_for(path, &dir)).unwrap();
        assert_eq!(cfg.api_base.as_str(), "http://env:2222/");
        std::env::remove_var("SOCRED_API_BASE");
    }

    #[test]
    #[serial]
    fn non_http_base_fails() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[api]\nbase_url=\"ftp://nope\"\n").unwrap();
        assert!(Config::load(&cli_for(path, &dir)).is_err());
    }

    #[test]
    #[serial]
    fn malformed_file_fails() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[api\n").unwrap();
        assert!(Config::load(&cli_for(path, &dir)).is_err());
    }
}
