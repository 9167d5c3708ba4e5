use std::sync::Once;

static TRACING_INIT: Once = Once::new();

pub const LOG_ENV: &str = "GESTAO_LOG";
const DEFAULT_DIRECTIVE: &str = "gestao=warn";

/// Install the global subscriber. Diagnostics go to stderr so report tables
/// on stdout stay clean.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    });
}
