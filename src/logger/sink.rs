//! Diagnostic output sink shared by every component emitting build diagnostics.
//!
//! The orchestrator reads protocol messages on our stdout, so diagnostics can never be written
//! there. When running as a persistent worker, the sink buffers everything written during a build,
//! and the buffer is flushed into the `output` field of the response. In every other mode, it
//! writes directly to the error stream.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mode {
    Passthrough,
    Buffering,
}

struct State {
    mode: Mode,
    entries: Vec<String>,
    stream: Box<dyn Write + Send>,
}

/// A cloneable handle on a single diagnostic sink. All clones share the same mode and buffer.
#[derive(Clone)]
pub struct LogSink {
    state: Arc<Mutex<State>>,
}

impl LogSink {
    /// Create a new sink in passthrough mode, writing to the process's error stream.
    pub fn new() -> Self {
        Self::with_stream(Box::new(io::stderr()))
    }

    /// Create a new sink in passthrough mode, writing to the given stream.
    pub fn with_stream(stream: Box<dyn Write + Send>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                mode: Mode::Passthrough,
                entries: Vec::new(),
                stream,
            })),
        }
    }

    /// Switch to buffering mode. There is no way back to passthrough mode.
    pub fn start_buffering(&self) {
        self.lock().mode = Mode::Buffering;
    }

    pub fn mode(&self) -> Mode {
        self.lock().mode
    }

    pub fn is_buffering(&self) -> bool {
        self.mode() == Mode::Buffering
    }

    /// Write the given entry. In buffering mode, its rendering is kept until the next flush. In
    /// passthrough mode, it is written to the stream immediately and never kept.
    pub fn write<T: Display>(&self, entry: T) {
        let mut state = self.lock();
        let mode = state.mode;

        match mode {
            Mode::Buffering => state.entries.push(entry.to_string()),
            Mode::Passthrough => {
                // Nowhere left to report a failing error stream.
                let _ = writeln!(state.stream, "{}", entry);
            },
        };
    }

    /// Return all buffered entries joined by newlines, emptying the buffer.
    pub fn flush(&self) -> String {
        let mut state = self.lock();
        let contents = state.entries.join("\n");
        state.entries.clear();

        contents
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A writer panicking mid-write leaves at worst a missing entry.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}
