use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` takes precedence over `log_level`.
pub fn init(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    // Ignore a second init (e.g. config failed after logging was set up).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// `warning` is accepted in configuration; tracing only knows `warn`.
fn filter_directive(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    if level == "warning" {
        "warn".to_string()
    } else {
        level
    }
}
