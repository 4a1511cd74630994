//! The persistent worker, serving build requests from the orchestrator.
//!
//! The worker reacts on two kinds of events: bytes arriving on the request stream (see [`input`]),
//! and builds completing. It uses a "select" model on both channels, from a single thread owning
//! the pending bytes, the engine cache and the output stream. Builds themselves run on a dedicated
//! thread, one at a time: while a build runs, incoming bytes are only accumulated, and the next
//! request is decoded once the response of the current one has been written.

mod cache;
pub mod input;
#[cfg(test)]
mod tests;

use crate::build::{self, FAILURE};
use crate::bundle::{self, Fingerprint};
use crate::engine::{EngineError, EngineFactory, Report};
use crate::logger::LogSink;
use crate::protocol::framing::{self, Accumulator, Decoded, Framer};
use crate::protocol::{WorkRequest, WorkResponse};
use crossbeam_channel::{unbounded, Receiver, Select, Sender};
use log::debug;
use std::any::Any;
use std::io::{Error as IoError, Write};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use thiserror::Error;

use self::cache::EngineCache;
use self::input::Event;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("unable to read work requests: {0}")]
    Read(IoError),
    #[error("unable to write a work response: {0}")]
    Write(IoError),
}

struct Completion {
    result: Result<Report, EngineError>,
}

enum Dispatch {
    /// The build runs in the background, and will be answered on completion.
    Running,
    /// The request has already been answered.
    Answered,
}

pub struct Worker<F: EngineFactory, W: Write> {
    factory: F,
    sink: LogSink,
    output: W,
    accumulator: Accumulator,
    cache: EngineCache,
    completion_link: (Sender<Completion>, Receiver<Completion>),
    in_flight: bool,
    reclaim: Box<dyn FnMut()>,
}

impl<F: EngineFactory, W: Write> Worker<F, W> {
    /// Create a new worker, creating engines with the given factory, capturing diagnostics with
    /// the given sink (which should be buffering), and writing responses to the given output.
    pub fn new(factory: F, sink: LogSink, output: W, framer: Framer) -> Self {
        Self {
            factory,
            sink,
            output,
            accumulator: Accumulator::new(framer),
            cache: EngineCache::new(),
            completion_link: unbounded(),
            in_flight: false,
            reclaim: Box::new(crate::reclaim::hint),
        }
    }

    /// Replace the memory reclamation hint issued after each build.
    #[cfg(test)]
    pub fn with_reclaim(mut self, reclaim: impl FnMut() + 'static) -> Self {
        self.reclaim = Box::new(reclaim);

        self
    }

    /// Serve requests read from the given events, until the end of the stream. Requests fully
    /// received before the end of the stream are all answered before returning. Failing to read
    /// requests or to write responses is fatal.
    pub fn run(&mut self, events: &Receiver<Event>) -> Result<(), WorkerError> {
        let completions = self.completion_link.1.clone();
        let mut open = true;

        loop {
            if !open && !self.in_flight {
                if !self.accumulator.is_empty() {
                    debug!("Request stream closed, dropping {} pending bytes.", self.accumulator.len());
                }

                return Ok(());
            }

            let mut select = Select::new();
            let input_operation = match open {
                true => Some(select.recv(events)),
                false => None,
            };
            let completion_operation = select.recv(&completions);

            let operation = select.select();
            match operation.index() {
                // Listening to bytes from the request stream.
                index if Some(index) == input_operation => {
                    match operation.recv(events) {
                        Ok(Event::Bytes(chunk)) => {
                            self.accumulator.extend(&chunk);
                            if !self.in_flight {
                                self.dispatch_pending()?;
                            }
                        },
                        Ok(Event::Failed(error)) => return Err(WorkerError::Read(error)),
                        Ok(Event::Closed) | Err(_) => {
                            open = false;
                        },
                    };
                },
                // Listening to the completion of the running build.
                index if index == completion_operation => {
                    // Both sides of this channel are owned by the worker: it never disconnects.
                    if let Ok(completion) = operation.recv(&completions) {
                        self.complete(completion)?;
                        self.dispatch_pending()?;
                    }
                },
                _ => unreachable!(),
            };
        }
    }

    /// Dispatch pending requests until one is running, or no complete request is pending.
    fn dispatch_pending(&mut self) -> Result<(), WorkerError> {
        while !self.in_flight {
            match self.accumulator.next::<WorkRequest>() {
                Decoded::Message { message, .. } => {
                    if let Dispatch::Answered = self.dispatch(message)? {
                        (self.reclaim)();
                    }
                },
                Decoded::Incomplete => break,
                Decoded::Malformed => {
                    // The orchestrator still waits for an answer to what it sent.
                    self.sink.write("Discarding a malformed work request.");
                    self.respond(FAILURE)?;
                },
            };
        }

        Ok(())
    }

    /// Resolve the engine for the given request and start the build.
    fn dispatch(&mut self, request: WorkRequest) -> Result<Dispatch, WorkerError> {
        debug!(
            "Dispatching a request with {} arguments and {} inputs.",
            request.arguments.len(),
            request.inputs.len(),
        );
        let config = match bundle::load(&request.arguments, &self.sink) {
            Ok(config) => config,
            Err(error) => return self.reject(error),
        };
        let fingerprint = match Fingerprint::of(&config) {
            Ok(fingerprint) => fingerprint,
            Err(error) => return self.reject(error),
        };

        let factory = &self.factory;
        let engine = match self.cache.resolve(fingerprint, || factory.create(&config)) {
            Ok(engine) => engine,
            Err(error) => return self.reject(format!("Could not create a new engine instance: {}", error)),
        };

        let sender = self.completion_link.0.clone();
        let sink = self.sink.clone();
        let spawned = thread::Builder::new().name("bundle-worker/build".to_string()).spawn(move || {
            // A panicking engine still gets its request answered.
            let result = panic::catch_unwind(AssertUnwindSafe(|| engine.run(&sink)))
                .unwrap_or_else(|payload| Err(EngineError::Invocation(panic_message(payload))));
            drop(engine);

            // The worker outlives every build, and keeps the receiving side.
            let _ = sender.send(Completion { result });
        });

        match spawned {
            Ok(_) => {
                self.in_flight = true;

                Ok(Dispatch::Running)
            },
            Err(error) => self.reject(format!("Unable to start the build: {}", error)),
        }
    }

    /// Answer the current request with a failure, explained by the given diagnostic.
    fn reject<T: std::fmt::Display>(&mut self, diagnostic: T) -> Result<Dispatch, WorkerError> {
        self.sink.write(diagnostic);
        self.respond(FAILURE)?;

        Ok(Dispatch::Answered)
    }

    /// Answer the running request with the outcome of its build.
    fn complete(&mut self, completion: Completion) -> Result<(), WorkerError> {
        let exit_code = build::conclude(completion.result, &self.sink);
        self.sink.write("Compiling finished.");
        self.in_flight = false;
        self.respond(exit_code)?;

        // Everything the build held has been dropped by now.
        (self.reclaim)();

        Ok(())
    }

    fn respond(&mut self, exit_code: i32) -> Result<(), WorkerError> {
        debug!("Responding with exit code {}.", exit_code);
        let response = WorkResponse::new(exit_code, self.sink.flush());

        self.output.write_all(&framing::encode(&response)).map_err(WorkerError::Write)?;
        self.output.flush().map_err(WorkerError::Write)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let message = match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&str>() {
            Ok(message) => message.to_string(),
            Err(_) => String::from("unknown cause"),
        },
    };

    format!("build engine panicked: {}", message)
}
