//! Logging setup.
//!
//! Library code only uses the `log` macros. Binaries pick one backend:
//! [`init_with_level`] installs a stderr logger that prefixes each record
//! with the time since installation and the short module name. With the
//! `tracing` feature, `init_tracing` installs a `tracing-subscriber` instead
//! and bridges `log` records into it.

use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, fmt::format::FmtSpan, util::SubscriberInitExt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    epoch: Instant,
}

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let t = self.epoch.elapsed();
        // single write per record
        let line = format!(
            "{:>4}.{:03} {:<5} {:<10} {}\n",
            t.as_secs(),
            t.subsec_millis(),
            record.level(),
            short_target(record.target()),
            record.args()
        );
        let _ = io::stderr().lock().write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

static STDERR_LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger at `level`.
///
/// Only the first call installs anything; later calls return `Ok(())` and
/// leave the level unchanged.
pub fn init_with_level(level: LevelFilter) -> Result<(), SetLoggerError> {
    let mut installed_now = false;
    let logger = STDERR_LOGGER.get_or_init(|| {
        installed_now = true;
        StderrLogger {
            level,
            epoch: Instant::now(),
        }
    });
    if installed_now {
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install a `tracing` subscriber (plain or JSON lines) and route `log`
/// records into it. `RUST_LOG` overrides `level` when set.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) {
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let builder = fmt().with_env_filter(filter).with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.with_timer(fmt::time::Uptime::default()).finish().try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_shortened_to_the_last_segment() {
        assert_eq!(short_target("planar_locator::pipeline"), "pipeline");
        assert_eq!(short_target("planar_locator"), "planar_locator");
    }

    #[test]
    fn repeated_installation_is_harmless() {
        init_with_level(LevelFilter::Warn).expect("first install");
        init_with_level(LevelFilter::Trace).expect("second install");
        log::warn!("logger test record");
    }
}
