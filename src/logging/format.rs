//! Log output for extraction runs.
//!
//! Run start and finish, per-host job timing, per-page fetches (debug) and
//! degraded neighbourhood sub-queries (warn) all go through `tracing`. Lines
//! are JSON objects (ndjson) by default, plain text when `log.json` is off.
//! HTTP client internals are held at `warn` unless `RUST_LOG` says otherwise.

use crate::config::LogConfig;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const QUIET_TARGETS: [&str; 3] = ["hyper=warn", "reqwest=warn", "rustls=warn"];

/// Filter directives for `level`, with the HTTP stack kept quiet.
fn default_directives(level: &str) -> String {
    std::iter::once(level).chain(QUIET_TARGETS).collect::<Vec<_>>().join(",")
}

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber writing to stdout. `RUST_LOG` takes
    /// precedence over `config.level`. A second call is a no-op.
    pub fn init(config: &LogConfig) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));
        let installed = if config.json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_thread_names(true)
                .with_writer(std::io::stdout);
            tracing_subscriber::registry().with(filter).with(fmt).try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_thread_names(true)
                        .with_writer(std::io::stdout),
                )
                .try_init()
        };
        if installed.is_err() {
            tracing::debug!("log subscriber already installed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_stack_is_quiet_by_default() {
        assert_eq!(default_directives("debug"), "debug,hyper=warn,reqwest=warn,rustls=warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        StructuredLogger::init(&LogConfig {
            level: "warn".into(),
            json: true,
        });
        StructuredLogger::init(&LogConfig {
            level: "debug".into(),
            json: false,
        });
    }
}
