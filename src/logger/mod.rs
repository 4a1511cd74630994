//! The worker's global logging system.
//!
//! The worker uses the standard [log](https://docs.rs/log/0.4.14/log/) crate everywhere. Records
//! are routed to the [`LogSink`]: while the sink is buffering (persistent worker mode), the
//! message is appended to the sink so it ends up in the current work response. Otherwise, the
//! record is printed by [simple_logger](https://docs.rs/simple_logger/4.3.3/simple_logger/), on
//! the error stream, since stdout belongs to the worker protocol.

pub mod sink;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use simple_logger::SimpleLogger;

pub use self::sink::LogSink;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Level {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<Level> for LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Off => LevelFilter::Off,
            Level::Error => LevelFilter::Error,
            Level::Warn => LevelFilter::Warn,
            Level::Info => LevelFilter::Info,
            Level::Debug => LevelFilter::Debug,
            Level::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Logger {
    sink: LogSink,
    console: SimpleLogger,
}

impl Logger {
    /// Create a logger forwarding records of at most the given level to the given sink.
    pub fn new(level: Level, sink: LogSink) -> Self {
        Self {
            sink,
            console: SimpleLogger::new()
                .with_level(level.into())
                .with_utc_timestamps(),
        }
    }

    /// Initialize the global logger with the given level, routing records to the given sink. It
    /// must only be used once, since all subsequent calls will result in a failure.
    pub fn initialize(level: Level, sink: LogSink) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(Self::new(level, sink)))?;
        log::set_max_level(level.into());

        Ok(())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if self.sink.is_buffering() {
            self.sink.write(record.args());
        } else {
            self.console.log(record);
        }
    }

    fn flush(&self) {
        self.console.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level as LogLevel;
    use std::io;

    fn record<'a>(level: LogLevel, args: std::fmt::Arguments<'a>) -> Record<'a> {
        Record::builder().level(level).target("bundle_worker").args(args).build()
    }

    #[test]
    fn test_buffered_records() {
        let sink = LogSink::with_stream(Box::new(io::sink()));
        let logger = Logger::new(Level::Info, sink.clone());
        sink.start_buffering();

        logger.log(&record(LogLevel::Info, format_args!("Creating new engine...")));
        logger.log(&record(LogLevel::Debug, format_args!("Filtered out.")));
        logger.log(&record(LogLevel::Error, format_args!("Engine {} failed.", 1)));

        assert_eq!(sink.flush(), "Creating new engine...\nEngine 1 failed.");
    }

    #[test]
    fn test_level_off() {
        let sink = LogSink::with_stream(Box::new(io::sink()));
        let logger = Logger::new(Level::Off, sink.clone());
        sink.start_buffering();

        logger.log(&record(LogLevel::Error, format_args!("Nobody hears this.")));

        assert_eq!(sink.flush(), "");
    }
}
