use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable overriding the filter, e.g. `OBSERVATORY_LOG=observatory_fsm=debug`.
pub const LOG_ENV: &str = "OBSERVATORY_LOG";

/// Install the process-wide subscriber. `verbose` forces debug level.
pub fn init_log(level: &str, verbose: bool) {
    let default: LevelFilter = if verbose {
        LevelFilter::DEBUG
    } else {
        level.parse().unwrap_or(LevelFilter::INFO)
    };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(default.into())
                .with_env_var(LOG_ENV)
                .from_env_lossy(),
        )
        .try_init();
}
