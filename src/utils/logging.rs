use tracing_subscriber::EnvFilter;

/// Initialize tracing for the gateway.
///
/// `default_level` is used unless `RUST_LOG` is set. Uses `try_init` so tests
/// and embedding applications can call this more than once.
pub fn init(default_level: &str) {
    let level = match default_level.to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
