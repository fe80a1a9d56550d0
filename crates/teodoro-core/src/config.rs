//! Assistant configuration.
//!
//! Layered the same way everywhere in this workspace: compiled-in defaults, then an optional
//! TOML file, then `TEODORO_*` environment variables.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | TEODORO_CONFIG | config/teodoro.toml | Path of the optional TOML file. |
//! | TEODORO_ASSISTANT_NAME | Teodoro | Wake name used when the lexicon has no Names. |
//! | TEODORO_DEFAULT_USER | usuario | Session user when login fails at startup. |
//! | TEODORO_STORAGE_PATH | ./data/teodoro_kb | Sled directory of the document store. |
//! | TEODORO_SEED_PATH | config/knowledge_base.toml | Seed loaded into an empty store. |
//! | TEODORO_CHECK_INTERVAL_SECS | 60 | Minimum gap between periodic checks. |
//! | TEODORO_IO_TIMEOUT_SECS | 5 | Bound for every external call. |
//! | TEODORO_PHONE_PORT | 50000 | UDP port for phone codes. |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/teodoro.toml";

/// Runtime configuration of the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub assistant_name: String,
    pub default_user: String,
    pub storage_path: String,
    pub seed_path: String,
    pub check_interval_secs: u64,
    pub io_timeout_secs: u64,
    pub connectivity_url: String,
    pub weather_base_url: String,
    pub default_location: String,
    pub phone_port: u16,
    /// Number of selectable voices offered by the voice-change dialog.
    pub max_voices: u8,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Teodoro".to_string(),
            default_user: "usuario".to_string(),
            storage_path: "./data/teodoro_kb".to_string(),
            seed_path: "config/knowledge_base.toml".to_string(),
            check_interval_secs: 60,
            io_timeout_secs: 5,
            connectivity_url: "http://www.google.com".to_string(),
            weather_base_url: "https://wttr.in".to_string(),
            default_location: "Madrid".to_string(),
            phone_port: 50000,
            max_voices: 7,
        }
    }
}

impl AssistantConfig {
    /// Load config from file and environment. Precedence: env > `TEODORO_CONFIG` file > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("TEODORO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&config_path))
    }

    /// Same as [`AssistantConfig::load`] with an explicit file path. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("assistant_name", d.assistant_name)?
            .set_default("default_user", d.default_user)?
            .set_default("storage_path", d.storage_path)?
            .set_default("seed_path", d.seed_path)?
            .set_default("check_interval_secs", d.check_interval_secs as i64)?
            .set_default("io_timeout_secs", d.io_timeout_secs as i64)?
            .set_default("connectivity_url", d.connectivity_url)?
            .set_default("weather_base_url", d.weather_base_url)?
            .set_default("default_location", d.default_location)?
            .set_default("phone_port", d.phone_port as i64)?
            .set_default("max_voices", d.max_voices as i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("TEODORO")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        built.try_deserialize()
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs.max(1))
    }
}
