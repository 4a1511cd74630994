//! Bundle configuration, resolved from the arguments of a build.
//!
//! Arguments prefixed by `@@` name configuration files (TOML). Every file holds a partial
//! [`BundleConfig`], and files are merged in argument order: values from later files override
//! values from earlier ones, section by section. Within a file, an optional `[base]` table is
//! applied first, then the file's own top-level keys, then an optional `[override]` table. The merged value identifies the engine instance
//! able to build it (see [`fingerprint`]).

pub mod fingerprint;

use crate::logger::LogSink;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::value::{Table, Value};

pub use self::fingerprint::Fingerprint;

/// Prefix marking arguments naming a configuration file.
pub const FILE_PREFIX: &str = "@@";
const BASE_LAYER: &str = "base";
const OVERRIDE_LAYER: &str = "override";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read bundle configuration file {path:?}: {error}")]
    Read {
        path: PathBuf,
        error: IoError,
    },
    #[error("invalid bundle configuration file {path:?}: {error}")]
    Parse {
        path: PathBuf,
        error: toml::de::Error,
    },
    #[error("unable to serialize the bundle configuration: {0}")]
    Serialize(serde_json::Error),
}

/// Combine two values of the same type, the given one taking precedence.
pub trait Merge {
    fn merge(self, other: Self) -> Self;
}

/// Merge optional sections: both present sections are merged, otherwise the present one is kept.
fn merge_section<T: Merge>(base: Option<T>, other: Option<T>) -> Option<T> {
    match (base, other) {
        (Some(base), Some(other)) => Some(base.merge(other)),
        (base, other) => other.or(base),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitChunks {
    All,
    Async,
    Initial,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Output {
    pub path: Option<String>,
    pub filename: Option<String>,
}

impl Merge for Output {
    fn merge(self, other: Self) -> Self {
        Self {
            path: other.path.or(self.path),
            filename: other.filename.or(self.filename),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Resolve {
    pub symlinks: Option<bool>,
    pub extensions: Option<Vec<String>>,
}

impl Merge for Resolve {
    fn merge(self, other: Self) -> Self {
        Self {
            symlinks: other.symlinks.or(self.symlinks),
            extensions: other.extensions.or(self.extensions),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DevServer {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Merge for DevServer {
    fn merge(self, other: Self) -> Self {
        Self {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Optimization {
    pub split_chunks: Option<SplitChunks>,
}

impl Merge for Optimization {
    fn merge(self, other: Self) -> Self {
        Self {
            split_chunks: other.split_chunks.or(self.split_chunks),
        }
    }
}

/// The configuration of a bundle. Every field is optional, so that any file can hold a part of it.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    pub mode: Option<Mode>,
    pub entry: Option<Vec<String>>,
    pub output: Option<Output>,
    pub resolve: Option<Resolve>,
    pub dev_server: Option<DevServer>,
    pub optimization: Option<Optimization>,
    /// Compile-time constants, merged key by key.
    #[serde(default)]
    pub define: BTreeMap<String, String>,
}

impl Merge for BundleConfig {
    fn merge(mut self, other: Self) -> Self {
        self.define.extend(other.define);

        Self {
            mode: other.mode.or(self.mode),
            entry: other.entry.or(self.entry),
            output: merge_section(self.output, other.output),
            resolve: merge_section(self.resolve, other.resolve),
            dev_server: merge_section(self.dev_server, other.dev_server),
            optimization: merge_section(self.optimization, other.optimization),
            define: self.define,
        }
    }
}

impl BundleConfig {
    /// Read a partial configuration from the given TOML file, merging its layers.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        let invalid = |error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        };

        let mut table: Table = toml::from_str(&contents).map_err(invalid)?;
        let base = table.remove(BASE_LAYER);
        let overrides = table.remove(OVERRIDE_LAYER);

        let mut config = Self::default();
        for layer in vec![base, Some(Value::Table(table)), overrides].into_iter().flatten() {
            config = config.merge(layer.try_into().map_err(invalid)?);
        }

        Ok(config)
    }

    /// Whether at least one entry point is declared.
    pub fn has_entry(&self) -> bool {
        self.entry.as_ref().map_or(false, |entry| !entry.is_empty())
    }
}

/// Resolve the configuration of a build from its arguments, merging all configuration files in
/// order. Missing files are reported to the given sink and skipped.
pub fn load(arguments: &[String], sink: &LogSink) -> Result<BundleConfig, ConfigError> {
    let mut config = BundleConfig::default();

    for path in arguments.iter().filter_map(|argument| argument.strip_prefix(FILE_PREFIX)) {
        let path = Path::new(path);
        match BundleConfig::read(path) {
            Ok(partial) => config = config.merge(partial),
            Err(ConfigError::Read { error, .. }) if error.kind() == ErrorKind::NotFound => {
                sink.write(format!("Bundle configuration file at path {} does not exist.", path.display()));
            },
            Err(error) => return Err(error),
        };
    }

    Ok(config)
}
