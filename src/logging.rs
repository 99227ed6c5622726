use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_ENV: &str = "MULTIAPPS_LOG";
const LOG_ALL_ENV: &str = "MULTIAPPS_LOG_ALL";

/// Setup logging on stderr.
///
/// Only warnings of this crate are shown by default, progress output is not logging.
/// `MULTIAPPS_LOG` sets the level, `debug` forces the debug level.
/// When `MULTIAPPS_LOG_ALL` is set the level applies to all crates.
pub fn setup_logging(debug: bool) {
    let log_level = if debug {
        "debug".to_string()
    } else {
        std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".to_string())
    };

    let filter = filter_directive(&log_level, std::env::var(LOG_ALL_ENV).is_ok());

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(filter))
        .init();
}

fn filter_directive(log_level: &str, all_crates: bool) -> String {
    if all_crates {
        log_level.to_string()
    } else {
        format!("{}={log_level}", env!("CARGO_CRATE_NAME"))
    }
}
