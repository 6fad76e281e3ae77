use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use quire_overlay::DriverRegistry;

use crate::client::RpcDriver;
use crate::error::{ConfigError, ConfigResult};

/// Connection settings for one virtual driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Registry key; boards name this in their `virtualDriver` field.
    pub name: String,
    /// Unix socket the driver process listens on.
    pub socket_path: PathBuf,
    /// Bound on one attempt: connect, request and body read.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,
    /// Extra attempts after a connection failure or timeout.
    pub max_retries: u32,
    /// Retry `n` sleeps `retry_backoff * n` first.
    #[serde(rename = "retry_backoff_ms", with = "millis")]
    pub retry_backoff: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            socket_path: PathBuf::new(),
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

impl DriverConfig {
    pub fn new(name: impl Into<String>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |reason: &str| ConfigError::Invalid {
            driver: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.socket_path.as_os_str().is_empty() {
            return Err(invalid("socket_path must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// A set of drivers, as written in a TOML file:
///
/// ```toml
/// [[driver]]
/// name = "playbooks"
/// socket_path = "/run/quire/playbooks.sock"
/// timeout_ms = 2000
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriversConfig {
    #[serde(default, rename = "driver")]
    pub drivers: Vec<DriverConfig>,
}

impl DriversConfig {
    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.drivers.iter().try_for_each(DriverConfig::validate)?;
        Ok(config)
    }

    /// Build the registry with one [`RpcDriver`] per entry.
    pub fn into_registry(self) -> ConfigResult<Arc<DriverRegistry>> {
        let mut builder = DriverRegistry::builder();
        for config in self.drivers {
            config.validate()?;
            builder = builder.register(RpcDriver::new(config));
        }
        Ok(Arc::new(builder.build()?))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
