//! Logging initialization.
//!
//! Logs go to stderr so stdout stays free for data (`discover`, `config show`).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// HTTP internals are only interesting when explicitly asked for via RUST_LOG.
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn";

/// Initialize the global subscriber.
///
/// `level` is the default directive (e.g. `info`, `debug`); `RUST_LOG`
/// overrides it when set.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` section, with CLI overrides.
pub fn init_from_config(
    config: &ultravision_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let level = effective_level(&config.logging.level, verbose_override);
    let json_format = json_logs_override || config.logging.format.eq_ignore_ascii_case("json");
    init(level, json_format);
}

fn effective_level(configured: &str, verbose: bool) -> &str {
    match (verbose, configured) {
        (true, "trace") => "trace",
        (true, _) => "debug",
        (false, "") => "info",
        (false, level) => level,
    }
}

fn default_directives(level: &str) -> String {
    format!("{level},{QUIET_DEPENDENCIES}")
}
