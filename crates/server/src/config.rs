use events::{EventBusConfig, RetryPolicy, DEFAULT_CHANNEL_PREFIX, DEFAULT_DEAD_LETTER_CHANNEL};
use orchestrator::{AgentsConfig, PlannerConfig, SagaConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tracing filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    pub channel_prefix: String,
    pub dead_letter_channel: String,
    pub default_max_retries: u32,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub jitter_ms: u64,
    /// Concurrency of consumer groups created by the server
    pub default_concurrency: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            dead_letter_channel: DEFAULT_DEAD_LETTER_CHANNEL.to_string(),
            default_max_retries: events::DEFAULT_MAX_RETRIES,
            base_retry_delay_ms: retry.base_delay.as_millis() as u64,
            max_retry_delay_ms: retry.max_delay.as_millis() as u64,
            jitter_ms: retry.max_jitter.as_millis() as u64,
            default_concurrency: 1,
        }
    }
}

impl EventsConfig {
    pub fn bus_config(&self) -> EventBusConfig {
        EventBusConfig {
            channel_prefix: self.channel_prefix.clone(),
            dead_letter_channel: self.dead_letter_channel.clone(),
            default_max_retries: self.default_max_retries,
            retry: RetryPolicy {
                base_delay: Duration::from_millis(self.base_retry_delay_ms),
                max_delay: Duration::from_millis(self.max_retry_delay_ms),
                max_jitter: Duration::from_millis(self.jitter_ms),
            },
        }
    }
}

/// Settings read from `config.toml`; every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub events: EventsConfig,
    pub saga: SagaConfig,
    pub planner: PlannerConfig,
    pub agents: AgentsConfig,
}

impl AppConfig {
    /// Read config from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub async fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path).await {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    debug!(path = %path.display(), "Config loaded successfully");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                Self::default()
            }
        }
    }

    pub async fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).await?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).await?;
        debug!(path = %path.display(), "Config saved successfully");

        Ok(())
    }
}
