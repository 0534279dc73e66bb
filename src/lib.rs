//! # vaultload
//!
//! Load generator for a secrets service's AppRole login and transit
//! encrypt/decrypt endpoints.
//!
//! Each virtual user logs in once, then repeatedly round-trips a random
//! payload through the transit engine and checks the result, pausing between
//! iterations. Failures are counted per operation and reported at the end of
//! the run alongside latency percentiles.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         CLI / LoadRunner                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │     VirtualUser 1  │  VirtualUser 2  │  ...  │  VirtualUser N   │
//! │  (token, scenario) │                 │       │                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │         SecretsService (login / encrypt / decrypt)              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   codec (base64)   │   payload (random)  │   RunMetrics         │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]      // Many functions can't be const due to trait bounds
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::cast_possible_truncation)]  // Counts fit their targets
#![allow(clippy::cast_precision_loss)]       // Acceptable for stats
#![allow(clippy::option_if_let_else)]        // More readable in context
#![allow(clippy::redundant_pub_crate)]       // Explicit visibility
#![allow(clippy::future_not_send)]           // Async internals
#![allow(clippy::return_self_not_must_use)]  // Builder methods don't need must_use

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod runner;
pub mod scenario;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{SecretsService, TransitClient};
    pub use crate::config::Config;
    pub use crate::error::{Error, Failure, Result};
    pub use crate::metrics::{MetricsSnapshot, RunMetrics};
    pub use crate::runner::{LoadRunner, RunReport};
    pub use crate::scenario::{Credentials, IterationOutcome, VirtualUser};
    pub use crate::types::*;
}
