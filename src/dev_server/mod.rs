//! Development server mode.
//!
//! In this mode, the process builds a single bundle, then keeps it up to date: the file watcher
//! notifies us through [`bridge`] each time sources changed, and the [`Rebuilder`] runs the engine
//! again. Diagnostics are written to the error stream as they come: this mode never buffers them.

pub mod bridge;

use crate::build::{self, SUCCESS};
use crate::engine::Engine;
use crate::logger::LogSink;
use log::{error, info};
use std::sync::Arc;

/// A live development server.
pub trait DevServer {
    /// Mark the current bundle as outdated, triggering a rebuild.
    fn invalidate(&self);
}

/// A development server rebuilding its bundle with a single engine.
pub struct Rebuilder {
    engine: Arc<dyn Engine>,
    sink: LogSink,
}

impl Rebuilder {
    pub fn new(engine: Arc<dyn Engine>, sink: LogSink) -> Self {
        Self { engine, sink }
    }

    /// Run the initial build.
    pub fn start(&self) -> i32 {
        info!("Starting dev server...");

        self.rebuild()
    }

    /// Run a build, returning its exit code. Failures are only reported.
    pub fn rebuild(&self) -> i32 {
        let exit_code = build::conclude(self.engine.run(&self.sink), &self.sink);
        match exit_code {
            SUCCESS => info!("Compiling finished."),
            _ => error!("Compiling failed."),
        };

        exit_code
    }
}

impl DevServer for Rebuilder {
    fn invalidate(&self) {
        self.rebuild();
    }
}
