//! INI file configuration adapter.

use crate::domain::error::MarketError;
use crate::ports::config_port::{ConfigPort, config_invalid};
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MarketError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| MarketError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, MarketError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| MarketError::ConfigParse {
                file: "<string>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, MarketError> {
        self.config
            .getint(section, key)
            .map(|v| v.unwrap_or(default))
            .map_err(|reason| config_invalid(section, key, reason))
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, MarketError> {
        self.config
            .getfloat(section, key)
            .map(|v| v.unwrap_or(default))
            .map_err(|reason| config_invalid(section, key, reason))
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, MarketError> {
        match self.config.get(section, key) {
            None => Ok(default),
            Some(value) => Self::parse_bool(value.trim()).ok_or_else(|| {
                config_invalid(section, key, format!("expected a boolean, got {value:?}"))
            }),
        }
    }
}
