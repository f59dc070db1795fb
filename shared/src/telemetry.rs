use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes tracing with optional JSON formatting.
///
/// Configuration is driven by environment variables:
/// - `RUST_LOG` for log filtering (defaults to `info`)
/// - `LOG_FORMAT=json` for machine-readable output
pub fn init_telemetry() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = Registry::default().with(env_filter);

    match std::env::var("LOG_FORMAT").unwrap_or_default().as_str() {
        "json" => {
            let fmt_layer = tracing_subscriber::fmt::layer().json().flatten_event(true);
            registry.with(fmt_layer).init();
        }
        _ => {
            let fmt_layer = tracing_subscriber::fmt::layer();
            registry.with(fmt_layer).init();
        }
    }
}
