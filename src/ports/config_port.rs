//! Configuration access port trait.

use crate::domain::error::MarketError;

/// Typed lookups fall back to `default` when the key is absent. A value that
/// is present but does not parse is a `ConfigInvalid` error.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, MarketError>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, MarketError>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, MarketError>;

    /// Like `get_string`, but a missing or blank value is a `ConfigMissing` error.
    fn require_string(&self, section: &str, key: &str) -> Result<String, MarketError> {
        self.get_string(section, key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| MarketError::ConfigMissing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// A positive integer, or `ConfigInvalid` naming the key.
    fn get_positive(&self, section: &str, key: &str, default: i64) -> Result<i64, MarketError> {
        let value = self.get_int(section, key, default)?;
        if value <= 0 {
            return Err(config_invalid(
                section,
                key,
                format!("{key} must be positive, got {value}"),
            ));
        }
        Ok(value)
    }

    /// A positive integer that fits in a `u32` (pool sizes).
    fn get_positive_u32(&self, section: &str, key: &str, default: u32) -> Result<u32, MarketError> {
        let value = self.get_positive(section, key, i64::from(default))?;
        u32::try_from(value).map_err(|_| {
            config_invalid(section, key, format!("{key} must be at most {}, got {value}", u32::MAX))
        })
    }
}

pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> MarketError {
    MarketError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
