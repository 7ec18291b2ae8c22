//! Process-wide tracing setup.
//!
//! Library code emits `tracing` spans/events and the database layer logs
//! through the `log` facade; both end up in the same subscriber.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Builds the env filter, honouring `RUST_LOG` and falling back to `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs the global subscriber. Calling it twice is harmless; the second
/// call is ignored.
pub fn init(format: LogFormat) {
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Pretty => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    };

    let subscriber = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter("info"));

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
        return;
    }

    // Route `log` records (database layer) into the same subscriber.
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::warn!("Failed to bridge log records into tracing: {}", e);
    }
}
