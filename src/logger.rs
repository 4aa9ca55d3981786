//! Where the logger lives
//!
//! This file sets up the logger that we use in the rest of the crate, along with the tools that
//! keep it in order. Nothing is written until a file has been provided with [`set_file`].

use std::fs::File;
use std::io::Write;
use std::mem;

use lazy_static::lazy_static;
use log::{Metadata, Record};
use parking_lot::Mutex;

use crate::config::DEFAULT_LOG_LEVEL;

lazy_static! {
    /// The global log file
    ///
    /// This lock is provided both to sync writes to whatever log file we're using, AND to allow
    /// changing the file at runtime.
    static ref LOG: Mutex<Option<File>> = Mutex::new(None);
}

/// Initializes the logging utilities, setting the global logger to be the one given here
///
/// ## Errors
///
/// This returns an error if a logger has already been set.
pub fn init() -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(DEFAULT_LOG_LEVEL);
    Ok(())
}

/// Sets the application-wide logger to the given file handle, returning the old one, if it was
/// present
pub fn set_file(file: File) -> Option<File> {
    mem::replace(&mut *LOG.lock(), Some(file))
}

/// Sets the application-wide logging level, returning the previous one
pub fn set_level(level: log::LevelFilter) -> log::LevelFilter {
    let previous = log::max_level();
    log::set_max_level(level);
    previous
}

/// Returns whether there is currently a file being logged to
pub fn logging() -> bool {
    LOG.lock().is_some()
}

/// Utility function for grabbing the log level from a string
///
/// The string should always be one of:
///   "Trace", "Debug", "Info", "Warn", "Error", "Off"
///
/// The only place this function is called is in `main()`, where the argument has already been
/// validated by clap.
pub fn level_filter_from_str(s: &str) -> log::LevelFilter {
    match s {
        "Trace" => log::LevelFilter::Trace,
        "Debug" => log::LevelFilter::Debug,
        "Info" => log::LevelFilter::Info,
        "Warn" => log::LevelFilter::Warn,
        "Error" => log::LevelFilter::Error,
        "Off" => log::LevelFilter::Off,
        _ => panic!("unexpected log level string {:?}", s),
    }
}

/// The public-facing logger. This is an empty struct that uses the internal functions of the rest
/// of the logging utilities to perform the logging.
pub struct Logger;

/// A dummy value that allows a static reference to the global logger
pub static LOGGER: Logger = Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut guard = LOG.lock();

        // We only log if we actually have a file to log to
        if let Some(log_file) = guard.as_mut() {
            let res = writeln!(
                log_file,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );

            // If the file's gone bad, there isn't anywhere else to report it. We stop logging
            // so that this is only printed once.
            if let Err(e) = res {
                *guard = None;
                eprintln!("failed to write to log file, logging disabled: {}", e);
            }
        }
    }

    fn flush(&self) {
        let mut guard = LOG.lock();
        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.flush() {
                *guard = None;
                eprintln!("failed to flush log file, logging disabled: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{level_filter_from_str, set_level};
    use log::LevelFilter;

    #[test]
    fn level_strings() {
        let all = [
            ("Trace", LevelFilter::Trace),
            ("Debug", LevelFilter::Debug),
            ("Info", LevelFilter::Info),
            ("Warn", LevelFilter::Warn),
            ("Error", LevelFilter::Error),
            ("Off", LevelFilter::Off),
        ];

        for (s, level) in all.iter() {
            assert_eq!(level_filter_from_str(s), *level);
        }
    }

    #[test]
    #[should_panic(expected = "unexpected log level")]
    fn bad_level_string() {
        level_filter_from_str("Loud");
    }

    #[test]
    fn set_level_returns_previous() {
        let original = set_level(LevelFilter::Debug);
        assert_eq!(set_level(original), LevelFilter::Debug);
    }
}
