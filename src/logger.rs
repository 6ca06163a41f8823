use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "LANWATCH_LOG_LEVEL";

// The dashboard command skips this entirely: writing log lines to stdout
// while the terminal is in raw mode garbles the UI.
pub fn init_logger() {
    let filter =
        EnvFilter::try_from_env(LOG_LEVEL_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
