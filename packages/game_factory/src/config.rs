use anyhow::{Context, Result};
use room_hub::{HubConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [hub]
//                    send_queue_capacity = 512
//
//   env var:         GAME_FACTORY_HUB__SEND_QUEUE_CAPACITY=512   (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub hub: HubFileConfig,
}

/// Listener settings (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Room hub tunables (lives under `[hub]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HubFileConfig {
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
    #[serde(default = "default_directory_retry_attempts")]
    pub directory_retry_attempts: u32,
    #[serde(default = "default_directory_retry_backoff_ms")]
    pub directory_retry_backoff_ms: u64,
    #[serde(default = "default_max_room_id_len")]
    pub max_room_id_len: usize,
}

impl Default for HubFileConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: default_send_queue_capacity(),
            directory_retry_attempts: default_directory_retry_attempts(),
            directory_retry_backoff_ms: default_directory_retry_backoff_ms(),
            max_room_id_len: default_max_room_id_len(),
        }
    }
}

impl HubFileConfig {
    /// Runtime view handed to the hub.
    pub fn to_hub_config(&self) -> HubConfig {
        HubConfig {
            send_queue_capacity: self.send_queue_capacity.max(1),
            max_room_id_len: self.max_room_id_len,
            directory_retry: RetryPolicy {
                attempts: self.directory_retry_attempts.max(1),
                backoff: Duration::from_millis(self.directory_retry_backoff_ms),
            },
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_send_queue_capacity() -> usize {
    256
}
fn default_directory_retry_attempts() -> u32 {
    3
}
fn default_directory_retry_backoff_ms() -> u64 {
    50
}
fn default_max_room_id_len() -> usize {
    room_hub::presence::DEFAULT_MAX_ROOM_ID_LEN
}

/// Build a figment that layers: defaults → config.toml → GAME_FACTORY_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `GAME_FACTORY_SERVER__PORT=9000`  →  `server.port = 9000`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("GAME_FACTORY_").split("__"))
}

/// Resolve the listen address; CLI flags win over the file config.
pub fn listen_addr(fc: &ServerFileConfig, host: Option<&str>, port: Option<u16>) -> Result<SocketAddr> {
    let host = host.unwrap_or(&fc.host);
    let port = port.unwrap_or(fc.port);
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address: {}:{}", host, port))
}

// =============================================================================
// Directory layout config (not tunable via figment, derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct GameFactoryConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl GameFactoryConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".game-factory"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let db_path = data_dir.join("game_factory.db");

        info!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir, db_path })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path.display())
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    /// Write `fc` to config.toml unless the file already exists.
    pub fn write_default_config(&self, fc: &FileConfig) -> Result<bool> {
        let path = self.config_toml_path();
        if path.exists() {
            return Ok(false);
        }
        let rendered = toml::to_string_pretty(fc).context("Failed to render config")?;
        std::fs::write(&path, rendered)
            .with_context(|| format!("Failed to write config: {:?}", path))?;
        info!("Wrote default config to {}", path.display());
        Ok(true)
    }
}
