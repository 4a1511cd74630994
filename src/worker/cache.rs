use crate::bundle::Fingerprint;
use crate::engine::{Engine, EngineError};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

/// Engines created by the worker, by fingerprint of the configuration they were created for.
///
/// Engines are kept for the lifetime of the process: there is no eviction.
#[derive(Default)]
pub struct EngineCache {
    engines: HashMap<Fingerprint, Arc<dyn Engine>>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the engine created for the given fingerprint, creating it with the given function if
    /// there is none. An engine failing to be created is not stored, so that the next request
    /// with the same fingerprint tries again.
    pub fn resolve<F>(&mut self, fingerprint: Fingerprint, create: F) -> Result<Arc<dyn Engine>, EngineError>
    where
        F: FnOnce() -> Result<Arc<dyn Engine>, EngineError>,
    {
        if let Some(engine) = self.engines.get(&fingerprint) {
            debug!("Reusing the engine created for {}.", fingerprint);

            return Ok(Arc::clone(engine));
        }

        info!("Creating new engine...");
        let engine = create()?;
        self.engines.insert(fingerprint, Arc::clone(&engine));

        Ok(engine)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
