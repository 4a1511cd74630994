//! Build engines, performing the actual bundling work.
//!
//! An engine is created once for a given [`BundleConfig`], and can then be run any number of
//! times, each run producing a [`Report`]. Engines are kept alive between runs by the worker, so
//! that an engine keeping state in memory can build incrementally.

pub mod shell;

use crate::bundle::BundleConfig;
use crate::logger::LogSink;
use std::io::Error as IoError;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Construction(String),
    #[error("unable to start the build engine: {0}")]
    Spawn(IoError),
    #[error("build engine I/O failure: {0}")]
    Io(IoError),
    #[error("{0}")]
    Invocation(String),
}

/// Result of a completed build.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub has_errors: bool,
    /// Human readable summary of the build.
    pub text: String,
}

pub trait Engine: Send + Sync {
    /// Run a build. Diagnostics emitted during the build should be written to the given sink.
    fn run(&self, sink: &LogSink) -> Result<Report, EngineError>;
}

pub trait EngineFactory {
    fn create(&self, config: &BundleConfig) -> Result<Arc<dyn Engine>, EngineError>;
}
