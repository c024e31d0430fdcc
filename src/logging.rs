//! Process-wide log setup.
//!
//! Library crates log through `log` and `tracing`; this installs one
//! `tracing-subscriber` formatter for both (the `log` records are bridged).

use kgd_core::{KeyguardError, KeyguardResult};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber. `RUST_LOG` wins over `directive`.
/// Fails if a subscriber is already installed.
pub fn init_logging(directive: &str, format: LogFormat) -> KeyguardResult<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(env.as_deref(), directive)?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| KeyguardError::InvalidState(format!("logging already initialised: {}", e)))
}

/// A usable `env` value takes precedence over `directive`.
fn build_filter(env: Option<&str>, directive: &str) -> KeyguardResult<EnvFilter> {
    if let Some(filter) = env.and_then(|value| EnvFilter::try_new(value).ok()) {
        return Ok(filter);
    }
    EnvFilter::builder()
        .parse(directive)
        .map_err(|e| KeyguardError::ConfigError(format!("log filter {:?}: {}", directive, e)))
}
