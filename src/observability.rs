//! This module provides observability and diagnostics for jobs and engines.
//!
//! The `log_metric!` macro emits structured key-value records for per-chunk events
//! (bytes in and out, block choices, table builds). It is compiled out of release
//! builds. Everything else goes through the `log` facade; `init_logging` installs an
//! `env_logger` backend once per process.

use std::fs::OpenOptions;
use std::sync::Once;

use log::LevelFilter;

use crate::config::MonitoringConfig;

/// Logs a structured key-value metric record at debug level, only in debug builds.
///
/// # Example
/// ```
/// use canned_deflate::log_metric;
/// let total_out = 125;
/// log_metric!("event"="chunk_done", "total_out"=&total_out);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            // Collect each pair as a JSON string fragment
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+

            $crate::__log::debug!("DEFLATE_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.map(|l| l.to_ascii_lowercase()) {
        Some(l) if l == "off" => LevelFilter::Off,
        Some(l) if l == "error" => LevelFilter::Error,
        Some(l) if l == "warn" => LevelFilter::Warn,
        Some(l) if l == "debug" => LevelFilter::Debug,
        Some(l) if l == "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Installs the process-wide logger described by `config`. Later calls are no-ops.
pub fn init_logging(config: &MonitoringConfig) {
    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.is_test(false);
        builder.filter_level(parse_level(config.log_level.as_deref()));

        // Custom formatter: just print the level and message
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(filename) = &config.log_file {
            match OpenOptions::new().append(true).create(true).open(filename) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => eprintln!("could not open log file '{}': {}", filename, e),
            }
        }

        let _ = builder.try_init();
    });
}

/// Test-only logger, captured by the test harness.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(LevelFilter::Debug)
        .try_init();
}
