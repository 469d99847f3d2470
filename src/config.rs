//! Configuration loader and validator for the sale watcher.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub paths: Paths,
    pub chat: Chat,
    #[serde(default)]
    pub schedule: Schedule,
}

/// Filesystem roots and output locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paths {
    /// Base-game content tree (`data/...` and `$data/...` references).
    pub content_root: PathBuf,
    /// Directory holding mod archives and unpacked mods.
    pub mods_root: PathBuf,
    /// Where extracted textures and converted images are written.
    pub image_output_dir: PathBuf,
    /// The game's `sales.xml`.
    pub sale_source: PathBuf,
    pub page_output: PathBuf,
    pub snapshot_output: PathBuf,
    pub history_file: PathBuf,
}

/// Chat delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    /// Discord webhook URL.
    pub endpoint: String,
    /// Public URL the converted images are served from.
    pub image_base_url: String,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_repost_after_secs")]
    pub repost_after_secs: i64,
    #[serde(default = "default_last_chance_hours")]
    pub last_chance_hours: i64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            repost_after_secs: default_repost_after_secs(),
            last_chance_hours: default_last_chance_hours(),
        }
    }
}

fn default_send_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_repost_after_secs() -> i64 {
    86_400
}

fn default_last_chance_hours() -> i64 {
    1
}

impl Config {
    /// Ensure output directories exist: the image dir and the parents of every output file.
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.paths.image_output_dir)?;
        for file in [
            &self.paths.page_output,
            &self.paths.snapshot_output,
            &self.paths.history_file,
        ] {
            if let Some(parent) = file.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.poll_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.send_timeout_secs)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn is_blank(p: &Path) -> bool {
    p.as_os_str().is_empty()
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    let p = &cfg.paths;
    if is_blank(&p.content_root) {
        return Err(ConfigError::Invalid("paths.content_root must be non-empty"));
    }
    if is_blank(&p.mods_root) {
        return Err(ConfigError::Invalid("paths.mods_root must be non-empty"));
    }
    if is_blank(&p.image_output_dir) {
        return Err(ConfigError::Invalid("paths.image_output_dir must be non-empty"));
    }
    if is_blank(&p.sale_source) {
        return Err(ConfigError::Invalid("paths.sale_source must be non-empty"));
    }
    if is_blank(&p.page_output) || is_blank(&p.snapshot_output) || is_blank(&p.history_file) {
        return Err(ConfigError::Invalid(
            "paths.page_output, paths.snapshot_output and paths.history_file must be non-empty",
        ));
    }

    if cfg.chat.endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid("chat.endpoint must be non-empty"));
    }
    if reqwest::Url::parse(&cfg.chat.endpoint).is_err() {
        return Err(ConfigError::Invalid("chat.endpoint must be an absolute URL"));
    }
    if cfg.chat.image_base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("chat.image_base_url must be non-empty"));
    }
    if cfg.chat.send_timeout_secs == 0 {
        return Err(ConfigError::Invalid("chat.send_timeout_secs must be > 0"));
    }

    if cfg.schedule.poll_interval_secs == 0 {
        return Err(ConfigError::Invalid("schedule.poll_interval_secs must be > 0"));
    }
    if cfg.schedule.repost_after_secs <= 0 {
        return Err(ConfigError::Invalid("schedule.repost_after_secs must be > 0"));
    }

    Ok(())
}

/// Example configuration, also used by tests.
pub fn example() -> &'static str {
    r#"paths:
  content_root: "C:/Program Files (x86)/Farming Simulator 2025/data"
  mods_root: "C:/Users/Administrator/Documents/My Games/FarmingSimulator2025/mods"
  image_output_dir: "./data/images"
  sale_source: "C:/Users/Administrator/Documents/My Games/FarmingSimulator2025/savegame1/sales.xml"
  page_output: "./data/vehicles_on_sale.html"
  snapshot_output: "./data/vehicles_on_sale.json"
  history_file: "./data/posted_vehicles.json"

chat:
  endpoint: "https://discord.com/api/webhooks/WEBHOOK_ID/WEBHOOK_TOKEN"
  image_base_url: "https://YOUR-DOMAIN-HERE/"
  send_timeout_secs: 15

schedule:
  poll_interval_secs: 60
  repost_after_secs: 86400
  last_chance_hours: 1
"#
}
