use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Used when `RUST_LOG` is unset. The HTTP client stack is chatty at `info`
/// since every source poll goes through it.
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Initialize structured logging. Call once at startup.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let directives = filter.to_string();

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Logging initialized ({})", directives);
}
