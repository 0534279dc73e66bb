//! Command-line interface for vaultload.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{Config, LoggingConfig};
use crate::util::parse_duration;

/// vaultload - load generator for AppRole login and transit encryption
#[derive(Parser, Debug)]
#[command(
    name = "vaultload",
    author,
    version,
    about = "Load generator for AppRole login and transit encrypt/decrypt",
    long_about = r#"
vaultload simulates concurrent virtual users against a secrets service:

  - each virtual user logs in once with AppRole credentials
  - every iteration encrypts a random payload with a transit key
  - the ciphertext is decrypted and compared with the plaintext
  - auth, encrypt and decrypt failures are counted separately

Connection settings come from the environment (VAULT_ADDR, ROLE_ID,
SECRET_ID, TRANSIT_KEY_NAME, NAMESPACE), a config file, or flags.

QUICK START:
  export VAULT_ADDR=http://127.0.0.1:8200 ROLE_ID=... SECRET_ID=...
  vaultload once
  vaultload run --vus 20 --duration 2m
"#
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format [default: text]
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Overlay the logging flags that were given onto `logging`.
    pub fn apply_logging(&self, logging: &mut LoggingConfig) {
        if let Some(ref level) = self.log_level {
            logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            logging.format = format.as_str().to_string();
        }
        if self.no_color {
            logging.color = false;
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a load test
    Run(RunArgs),

    /// Run a single login + encrypt + decrypt iteration
    Once(OnceArgs),

    /// Encode or decode base64 the way transit payloads are shaped
    Codec(CodecArgs),

    /// Show example configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Secrets service connection flags
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Service base address (overrides VAULT_ADDR)
    #[arg(short, long)]
    pub addr: Option<String>,

    /// AppRole role id (overrides ROLE_ID)
    #[arg(long)]
    pub role_id: Option<String>,

    /// AppRole secret id (overrides SECRET_ID; prefer the environment)
    #[arg(long)]
    pub secret_id: Option<String>,

    /// Transit key name (overrides TRANSIT_KEY_NAME)
    #[arg(short, long)]
    pub key: Option<String>,

    /// Namespace header value (overrides NAMESPACE)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Per-request timeout
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,
}

impl TargetArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref addr) = self.addr {
            config.vault.addr.clone_from(addr);
        }
        if let Some(ref role_id) = self.role_id {
            config.vault.role_id = Some(role_id.clone());
        }
        if let Some(ref secret_id) = self.secret_id {
            config.vault.secret_id = Some(secret_id.clone());
        }
        if let Some(ref key) = self.key {
            config.vault.transit_key.clone_from(key);
        }
        if let Some(ref namespace) = self.namespace {
            config.vault.namespace = Some(namespace.clone());
        }
        if let Some(timeout) = self.timeout {
            config.vault.request_timeout = timeout;
        }
    }
}

/// Run command arguments
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Number of concurrent virtual users
    #[arg(short = 'u', long)]
    pub vus: Option<u32>,

    /// Run duration (e.g. 30s, 2m)
    #[arg(short, long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Pause after each iteration
    #[arg(long, value_parser = parse_duration)]
    pub think_time: Option<Duration>,

    /// Plaintext length per iteration
    #[arg(long)]
    pub payload_len: Option<usize>,

    /// Serve Prometheus metrics during the run
    #[arg(long)]
    pub metrics: bool,

    /// Metrics HTTP bind address
    #[arg(long)]
    pub metrics_bind: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero if any call or check failed
    #[arg(long)]
    pub fail_on_errors: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunArgs {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut Config) {
        self.target.apply(config);

        if let Some(vus) = self.vus {
            config.load.vus = vus;
        }
        if let Some(duration) = self.duration {
            config.load.duration = duration;
        }
        if let Some(think_time) = self.think_time {
            config.load.think_time = think_time;
        }
        if let Some(payload_len) = self.payload_len {
            config.load.payload_len = payload_len;
        }
        if self.metrics {
            config.metrics.enabled = true;
        }
        if let Some(ref bind) = self.metrics_bind {
            config.metrics.http_bind.clone_from(bind);
        }
    }
}

/// Once command arguments
#[derive(Args, Debug, Clone)]
pub struct OnceArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Plaintext length
    #[arg(long)]
    pub payload_len: Option<usize>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Codec command arguments
#[derive(Args, Debug)]
pub struct CodecArgs {
    #[command(subcommand)]
    pub command: CodecCommands,
}

/// Codec subcommands
#[derive(Subcommand, Debug)]
pub enum CodecCommands {
    /// Encode text to base64
    Encode {
        /// Text to encode
        input: String,
    },
    /// Decode base64 to text
    Decode {
        /// Base64 to decode
        input: String,
    },
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Completions command arguments
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Shell for completions
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
