//! Logging setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to this
//! crate and quieter defaults apply to the HTTP and kube stacks.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Output format for log lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Filter directives for a base level
pub fn default_directives(level: &str) -> Result<String> {
    let level = level.trim().to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(Error::config(format!(
            "invalid log level {:?}, expected one of {}",
            level,
            LEVELS.join(", ")
        )));
    }
    Ok(format!(
        "{level},portal_controller={level},kube=info,tower=warn,hyper=warn,rustls=warn"
    ))
}

/// Install the global tracing subscriber
pub fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let directives = default_directives(level)?;
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&directives)
            .map_err(|e| Error::config(format!("invalid log filter: {}", e)))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true),
            )
            .try_init(),
    };

    result.map_err(|e| Error::internal(format!("failed to initialize tracing subscriber: {}", e)))
}
