use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber on stderr, so the dashboard can own
/// stdout. Silent unless `verbose` is set or `RUST_LOG` says otherwise;
/// dependencies only ever report warnings.
pub fn init_logging(verbose: bool) {
    let (app_level, deps_level, fallback) = if verbose {
        (LevelFilter::DEBUG, LevelFilter::WARN, "debug")
    } else {
        (LevelFilter::OFF, LevelFilter::OFF, "off")
    };
    let targets = Targets::new()
        .with_default(deps_level)
        .with_target(env!("CARGO_CRATE_NAME"), app_level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(targets)
        .with(env_filter)
        .init();
}
