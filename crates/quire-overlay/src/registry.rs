use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::driver::Driver;
use crate::error::OverlayError;

/// Immutable name -> driver mapping, built once at startup and shared by
/// reference. Lookups take no locks.
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::default()
    }

    /// An empty registry: every virtual board fails with driver-not-found.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .finish()
    }
}

/// Collects drivers for a [`DriverRegistry`].
#[derive(Default)]
pub struct DriverRegistryBuilder {
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverRegistryBuilder {
    pub fn register(self, driver: impl Driver + 'static) -> Self {
        self.register_arc(Arc::new(driver))
    }

    pub fn register_arc(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Fails if a name is empty or registered twice.
    pub fn build(self) -> Result<DriverRegistry, OverlayError> {
        let mut drivers: HashMap<String, Arc<dyn Driver>> = HashMap::new();
        for driver in self.drivers {
            let name = driver.name().to_string();
            if name.is_empty() {
                return Err(OverlayError::EmptyDriverName);
            }
            if drivers.contains_key(&name) {
                return Err(OverlayError::DuplicateDriver(name));
            }
            drivers.insert(name, driver);
        }

        let registry = DriverRegistry { drivers };
        info!(drivers = ?registry.names(), "driver registry built");
        Ok(registry)
    }
}
