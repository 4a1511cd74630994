//! The worker's runtime configuration.
//!
//! The runtime configuration is loaded from the file `configuration.toml`, relative to the working
//! directory, or from the file given on the command line. Environment variables prefixed by
//! `BUNDLE_WORKER` then override it (for example `BUNDLE_WORKER_LOG__LEVEL=debug`). Every
//! configuration option has a default value, allowing to start the worker without a configuration
//! file.

use crate::logger::Level;
use crate::protocol::framing::DEFAULT_MAX_LENGTH;
use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use config::FileFormat;
use serde::Deserialize;
use validator::Validate;

const DEFAULT_PATH: &str = "configuration.toml";

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => Level::Off,
            LogLevel::Error => Level::Error,
            LogLevel::Warn => Level::Warn,
            LogLevel::Info => Level::Info,
            LogLevel::Debug => Level::Debug,
            LogLevel::Trace => Level::Trace,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

/// The external program used as build engine.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Engine {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub program: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_LENGTH
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Worker {
    /// Requests declaring a larger length are rejected as malformed.
    #[serde(default = "default_max_message_length")]
    #[validate(range(min = 1))]
    pub max_message_length: usize,
}
impl Default for Worker {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    #[validate]
    pub log: Log,
    #[serde(default)]
    #[validate]
    pub engine: Engine,
    #[serde(default)]
    #[validate]
    pub worker: Worker,
}

impl Configuration {
    /// Load the configuration from the given file, or from the optional `configuration.toml` file
    /// when none is given. It returns a properly instantiated and validated configuration tree in
    /// case of success, or a message describing the error in case of error.
    pub fn new(path: Option<&str>) -> Result<Self, String> {
        let configuration = match Self::load(path) {
            Ok(configuration) => configuration,
            Err(error) => return Err(error.to_string()),
        };

        match configuration.validate() {
            Ok(_) => Ok(configuration),
            Err(errors) => Err(errors.to_string()),
        }
    }

    fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut configuration = Config::default();

        let file =
            File::with_name(path.unwrap_or(DEFAULT_PATH))
            .format(FileFormat::Toml)
            .required(path.is_some())
        ;
        configuration.merge(file)?;
        configuration.merge(Environment::with_prefix("BUNDLE_WORKER").separator("__"))?;

        configuration.try_into()
    }
}
