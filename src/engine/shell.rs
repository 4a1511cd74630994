//! An engine delegating builds to an external program.
//!
//! The program is started once per build, with its configured arguments. It receives the
//! canonical JSON of the bundle configuration on its stdin, and reports through its exit status.
//! Everything it writes on stdout and stderr becomes the report of the build.

use super::{Engine, EngineError, EngineFactory, Report};
use crate::bundle::BundleConfig;
use crate::logger::LogSink;
use log::debug;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Create [`Shell`] engines running the given program.
#[derive(Clone, Debug)]
pub struct ShellFactory {
    program: Option<String>,
    arguments: Vec<String>,
}

impl ShellFactory {
    pub fn new(program: Option<String>, arguments: Vec<String>) -> Self {
        Self { program, arguments }
    }
}

impl EngineFactory for ShellFactory {
    fn create(&self, config: &BundleConfig) -> Result<Arc<dyn Engine>, EngineError> {
        let program = match &self.program {
            Some(program) if !program.is_empty() => program.clone(),
            _ => return Err(EngineError::Construction(String::from("no build engine program is configured"))),
        };
        if !config.has_entry() {
            return Err(EngineError::Construction(String::from("the bundle configuration declares no entry point")));
        }
        let payload = serde_json::to_vec(config).map_err(|error| EngineError::Construction(error.to_string()))?;

        Ok(Arc::new(Shell {
            program,
            arguments: self.arguments.clone(),
            payload,
        }))
    }
}

/// An engine running a program for each build.
#[derive(Debug)]
pub struct Shell {
    program: String,
    arguments: Vec<String>,
    payload: Vec<u8>,
}

impl Engine for Shell {
    fn run(&self, _sink: &LogSink) -> Result<Report, EngineError> {
        debug!("Executing {} {:?}.", self.program, self.arguments);
        let mut child = Command::new(&self.program)
            .args(&self.arguments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::Spawn)?;

        // Dropping stdin closes it, letting the program see the end of the configuration. Programs
        // are free not to read it.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&self.payload) {
                Ok(_) => {},
                Err(error) if error.kind() == ErrorKind::BrokenPipe => {},
                Err(error) => return Err(EngineError::Io(error)),
            };
        }
        let output = child.wait_with_output().map_err(EngineError::Io)?;
        debug!("Shell engine exiting with status '{:?}'.", output.status);

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(Report {
            has_errors: !output.status.success(),
            text: text.trim_end().to_string(),
        })
    }
}
