//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Output format of the fmt subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event (for log shipping).
    #[default]
    Json,
    /// Human-readable multi-line output (for a terminal).
    Pretty,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json { LogFormat::Json } else { LogFormat::Pretty }
    }
}

/// `RUST_LOG` wins over the configured directive; an unparsable directive falls back
/// to `info`.
fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(directive: &str, format: LogFormat) {
    let filter = env_filter(directive);

    let _ = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .with_target(true)
            .try_init(),
    };
}
