//! Log sinks.
//!
//! By default [`ConsoleLogger`] writes every record to the console with a
//! `[BTBRIDGED secs.nanos]` prefix. Informational output goes to stdout,
//! warnings and errors to stderr, so a supervisor capturing stderr sees
//! only what needs attention. With `--syslog` records go to the system
//! log instead, under the `BTBRIDGED` ident and the daemon facility.

use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use syslog::{BasicLogger, Facility, Formatter3164};

const PREFIX: &str = "BTBRIDGED";

/// Map the `-v` count to a log level.
///
/// Quiet runs still report warnings and errors; `-v` adds per-message
/// progress and `-vv` adds payload hex dumps.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Adapter that prints log records to stdout / stderr.
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    fn format(record: &Record<'_>) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        format!(
            "[{} {}.{:09}] {}\n",
            PREFIX,
            now.as_secs(),
            now.subsec_nanos(),
            record.args()
        )
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        // Nowhere left to report a failed console write.
        let _ = if record.level() <= Level::Warn {
            std::io::stderr().lock().write_all(line.as_bytes())
        } else {
            std::io::stdout().lock().write_all(line.as_bytes())
        };
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

/// Install the console logger as the global `log` backend.
pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
    let level = level_for(verbosity);
    log::set_boxed_logger(Box::new(ConsoleLogger::new(level)))?;
    log::set_max_level(level);
    Ok(())
}

fn syslog_formatter() -> Formatter3164 {
    Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: PREFIX.to_owned(),
        pid: std::process::id(),
    }
}

/// Install a syslog backend (local socket, `LOG_DAEMON`) instead.
pub fn init_syslog(verbosity: u8) -> io::Result<()> {
    let logger = syslog::unix(syslog_formatter()).map_err(io::Error::other)?;
    log::set_boxed_logger(Box::new(BasicLogger::new(logger))).map_err(io::Error::other)?;
    log::set_max_level(level_for(verbosity));
    Ok(())
}
