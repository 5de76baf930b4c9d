//! Registry configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default name of a root registry.
pub const DEFAULT_NAME: &str = "root";

/// Default buffer size of each event channel's broadcast watcher queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration for a [`Registry`](crate::Registry)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistryConfig {
    /// Name used in logs and disposed-guard errors. Child registries
    /// derive theirs as `{owner}/{scope}:{shape}`.
    pub name: String,
    /// How many events a slow watcher may lag behind before it starts
    /// losing them
    pub event_capacity: usize,
}

impl RegistryConfig {
    /// Default configuration with a custom name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("registry name must not be empty"));
        }
        if self.event_capacity == 0 {
            return Err(Error::configuration("event_capacity must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_owned(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_config_default() {
        let config = RegistryConfig::default();
        assert_eq!(config.name, "root");
        assert_eq!(config.event_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let config = RegistryConfig::named("  ");
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = RegistryConfig {
            event_capacity: 0,
            ..RegistryConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));
    }
}
