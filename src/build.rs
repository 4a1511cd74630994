//! Outcome of builds, shared by every operating mode.

use crate::bundle;
use crate::engine::{EngineError, EngineFactory, Report};
use crate::logger::LogSink;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;

/// Write the outcome of a build to the given sink, and return the matching exit code: a failure
/// when the engine failed or reported build errors, a success otherwise.
pub fn conclude(result: Result<Report, EngineError>, sink: &LogSink) -> i32 {
    match result {
        Ok(report) => {
            if !report.text.is_empty() {
                sink.write(&report.text);
            }

            match report.has_errors {
                true => FAILURE,
                false => SUCCESS,
            }
        },
        Err(error) => {
            sink.write(format!("Build failed: {}", error));

            FAILURE
        },
    }
}

/// Run a single build for the given arguments, returning the exit code of the process.
pub fn single(arguments: &[String], factory: &dyn EngineFactory, sink: &LogSink) -> i32 {
    let config = match bundle::load(arguments, sink) {
        Ok(config) => config,
        Err(error) => {
            sink.write(error);

            return FAILURE;
        },
    };
    let engine = match factory.create(&config) {
        Ok(engine) => engine,
        Err(error) => {
            sink.write(format!("Could not create a new engine instance: {}", error));

            return FAILURE;
        },
    };

    conclude(engine.run(sink), sink)
}
