//! Error types for vaultload.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias for vaultload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vaultload.
#[derive(Error, Debug)]
pub enum Error {
    // Secrets-service operation errors
    #[error("authentication failed: {0}")]
    Auth(Failure),

    #[error("encryption failed: {0}")]
    Encrypt(Failure),

    #[error("decryption failed: {0}")]
    Decrypt(Failure),

    // Codec errors
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // HTTP client setup errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    // Metrics registry errors
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether this is one of the per-iteration operation failures that the
    /// scenario counts and absorbs.
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Encrypt(_) | Self::Decrypt(_))
    }

    /// The underlying failure detail for operation errors.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Auth(f) | Self::Encrypt(f) | Self::Decrypt(f) => Some(f),
            _ => None,
        }
    }
}

/// Why a login, encrypt or decrypt call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The service answered with a status other than 200.
    Status { code: u16, reason: String },
    /// The service answered 200 but the body was not the expected shape.
    MalformedResponse(String),
    /// The request never produced a response (refused, reset, timed out).
    Transport(String),
}

impl Failure {
    /// HTTP status code, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { code, reason } if reason.is_empty() => write!(f, "HTTP {code}"),
            Self::Status { code, reason } => write!(f, "HTTP {code} {reason}"),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

/// Binary-to-text decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid length {0}: must be a multiple of 4")]
    InvalidLength(usize),

    #[error("invalid symbol {symbol:?} at position {position}")]
    InvalidSymbol { position: usize, symbol: char },

    #[error("invalid padding at position {0}")]
    InvalidPadding(usize),
}
