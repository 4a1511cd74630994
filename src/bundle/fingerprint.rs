//! Fingerprints identifying bundle configurations.
//!
//! A fingerprint is the canonical JSON serialization of a configuration. Sections serialize their
//! fields in declaration order, and the only free-form map (`define`) is a `BTreeMap`, so two
//! structurally identical configurations always share the same fingerprint, whatever the order in
//! which their files declared keys.

use super::{BundleConfig, ConfigError};
use std::fmt;

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of the given configuration.
    pub fn of(config: &BundleConfig) -> Result<Self, ConfigError> {
        serde_json::to_string(config).map(Self).map_err(ConfigError::Serialize)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
