//! # Rotator Configuration
//!
//! Ambient knobs only. None of them change the rotation protocol; they tune
//! logging labels and how the producer waits for readers to let go of a
//! reclaimed buffer.
//!
//! ```toml
//! name = "render-state"
//! drain_spin_iterations = 128
//! drain_sleep_micros = 20
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration for a rotator.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotatorConfig {
    /// Label attached to every tracing event emitted by this rotator.
    pub name: String,
    /// Spin iterations before the producer starts sleeping while readers
    /// still hold the reclaimed buffer.
    pub drain_spin_iterations: u32,
    /// Sleep between polls once spinning is exhausted (microseconds).
    pub drain_sleep_micros: u64,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            name: String::from("rotator"),
            drain_spin_iterations: 64,
            drain_sleep_micros: 50,
        }
    }
}

impl RotatorConfig {
    /// Parses a configuration from a TOML document.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown fields and
    /// [`ConfigError::InvalidValue`] for values the rotator cannot use.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the name is empty or the
    /// producer would never back off while draining.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "name",
                reason: "must not be empty",
            });
        }
        if self.drain_sleep_micros == 0 && self.drain_spin_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "drain_sleep_micros",
                reason: "must be non-zero when drain_spin_iterations is zero",
            });
        }
        Ok(())
    }

    /// Sleep interval between drain polls.
    #[inline]
    #[must_use]
    pub const fn drain_sleep(&self) -> Duration {
        Duration::from_micros(self.drain_sleep_micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RotatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RotatorConfig::from_toml_str("name = \"telemetry\"").unwrap();
        assert_eq!(config.name, "telemetry");
        assert_eq!(config.drain_spin_iterations, 64);
        assert_eq!(config.drain_sleep(), Duration::from_micros(50));
    }

    #[test]
    fn test_full_toml() {
        let config = RotatorConfig::from_toml_str(
            "name = \"render\"\ndrain_spin_iterations = 0\ndrain_sleep_micros = 10\n",
        )
        .unwrap();
        assert_eq!(config.drain_spin_iterations, 0);
        assert_eq!(config.drain_sleep_micros, 10);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = RotatorConfig::from_toml_str("capacity = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = RotatorConfig::from_toml_str("name = \"\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "name", .. }));
    }

    #[test]
    fn test_busy_drain_rejected() {
        let err = RotatorConfig::from_toml_str("drain_spin_iterations = 0\ndrain_sleep_micros = 0")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { field: "drain_sleep_micros", .. }
        ));
    }
}
