//! Configuration management for vaultload.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables, then command-line flags (applied by the CLI).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::payload::DEFAULT_PAYLOAD_LEN;

/// Environment variable holding the service base address.
pub const ENV_ADDR: &str = "VAULT_ADDR";
/// Environment variable holding the AppRole role id.
pub const ENV_ROLE_ID: &str = "ROLE_ID";
/// Environment variable holding the AppRole secret id.
pub const ENV_SECRET_ID: &str = "SECRET_ID";
/// Environment variable holding the transit key name.
pub const ENV_TRANSIT_KEY: &str = "TRANSIT_KEY_NAME";
/// Environment variable holding the namespace.
pub const ENV_NAMESPACE: &str = "NAMESPACE";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Secrets service connection.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Load shape.
    #[serde(default)]
    pub load: LoadConfig,

    /// Metrics export.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    ///
    /// The file is not validated here; env and flag overlays may still fix it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(addr) = get(ENV_ADDR) {
            self.vault.addr = addr;
        }
        if let Some(role_id) = get(ENV_ROLE_ID) {
            self.vault.role_id = Some(role_id);
        }
        if let Some(secret_id) = get(ENV_SECRET_ID) {
            self.vault.secret_id = Some(secret_id);
        }
        if let Some(key) = get(ENV_TRANSIT_KEY) {
            self.vault.transit_key = key;
        }
        if let Some(namespace) = get(ENV_NAMESPACE) {
            self.vault.namespace = Some(namespace);
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.vault.addr).map_err(|e| {
            Error::InvalidConfig(format!("Invalid service address {:?}: {e}", self.vault.addr))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "Service address must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.vault.transit_key.is_empty() {
            return Err(Error::InvalidConfig("Transit key name is empty".into()));
        }

        if self.load.vus == 0 {
            return Err(Error::InvalidConfig("At least one virtual user is required".into()));
        }

        if self.load.duration.is_zero() {
            return Err(Error::InvalidConfig("Run duration must be non-zero".into()));
        }

        if self.load.payload_len == 0 {
            return Err(Error::InvalidConfig("Payload length must be non-zero".into()));
        }

        Ok(())
    }

    /// Validate that login credentials are present.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.vault.role_id.as_deref().map_or(true, str::is_empty) {
            return Err(Error::InvalidConfig(format!(
                "No role id configured (set {ENV_ROLE_ID} or vault.role_id)"
            )));
        }
        if self.vault.secret_id.as_deref().map_or(true, str::is_empty) {
            return Err(Error::InvalidConfig(format!(
                "No secret id configured (set {ENV_SECRET_ID} or vault.secret_id)"
            )));
        }
        Ok(())
    }

    /// Get default config path.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "vaultload", "vaultload").map_or_else(
            || PathBuf::from("vaultload.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            vault: VaultConfig {
                addr: "https://vault.example.com:8200".into(),
                role_id: Some("00000000-0000-0000-0000-000000000000".into()),
                secret_id: Some("00000000-0000-0000-0000-000000000000".into()),
                transit_key: "loadtest".into(),
                namespace: Some("admin".into()),
                ..Default::default()
            },
            metrics: MetricsConfig {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Secrets service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Base address, e.g. `http://127.0.0.1:8200`.
    #[serde(default = "default_addr")]
    pub addr: String,

    /// AppRole role id.
    pub role_id: Option<String>,

    /// AppRole secret id.
    pub secret_id: Option<String>,

    /// Transit key used for encrypt/decrypt.
    #[serde(default = "default_transit_key")]
    pub transit_key: String,

    /// Namespace sent as `X-Vault-Namespace`.
    pub namespace: Option<String>,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_addr() -> String {
    "http://127.0.0.1:8200".into()
}
fn default_transit_key() -> String {
    "my-key".into()
}
fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            role_id: None,
            secret_id: None,
            transit_key: default_transit_key(),
            namespace: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Load shape settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Number of concurrent virtual users.
    #[serde(default = "default_vus")]
    pub vus: u32,

    /// Total run duration.
    #[serde(default = "default_duration", with = "humantime_serde")]
    pub duration: Duration,

    /// Pause at the end of every iteration.
    #[serde(default = "default_think_time", with = "humantime_serde")]
    pub think_time: Duration,

    /// Plaintext length per iteration.
    #[serde(default = "default_payload_len")]
    pub payload_len: usize,
}

fn default_vus() -> u32 {
    20
}
fn default_duration() -> Duration {
    Duration::from_secs(120)
}
fn default_think_time() -> Duration {
    Duration::from_secs(1)
}
fn default_payload_len() -> usize {
    DEFAULT_PAYLOAD_LEN
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            vus: default_vus(),
            duration: default_duration(),
            think_time: default_think_time(),
            payload_len: default_payload_len(),
        }
    }
}

/// Metrics export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Serve `/metrics`, `/health` and `/status` while the run is active.
    #[serde(default)]
    pub enabled: bool,

    /// HTTP server bind address for metrics.
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
}

fn default_http_bind() -> String {
    "127.0.0.1:9090".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            http_bind: default_http_bind(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// so that `--json` reports on stdout stay machine-readable.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_ansi(config.color)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
