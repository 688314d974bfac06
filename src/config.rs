//! Resolver configuration.
//!
//! Loaded from `<config dir>/managed-query/config.json` when present, and
//! overridable with `MANAGED_QUERY_GLOBAL_PRECEDENCE`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const APP_NAME: &str = "managed-query";
const CONFIG_FILE: &str = "config.json";
const PRECEDENCE_ENV: &str = "MANAGED_QUERY_GLOBAL_PRECEDENCE";

/// Which manager wins when a session-global and a type-bound manager on
/// the query's entity define the same operation name.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlobalPrecedence {
    #[default]
    TypeBoundFirst,
    GlobalFirst,
}

impl GlobalPrecedence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TypeBoundFirst => "type_bound_first",
            Self::GlobalFirst => "global_first",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "type_bound_first" => Some(Self::TypeBoundFirst),
            "global_first" => Some(Self::GlobalFirst),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolverConfig {
    #[serde(default)]
    pub global_precedence: GlobalPrecedence,
}

impl ResolverConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// The user's config file if it exists, defaults otherwise, then the
    /// environment override.
    pub fn load_default() -> Result<Self> {
        let config = match config_path() {
            Some(path) if path.exists() => Self::load(path)?,
            _ => Self::default(),
        };
        config.with_env()
    }

    /// Defaults plus the environment override.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    fn with_env(self) -> Result<Self> {
        match std::env::var(PRECEDENCE_ENV) {
            Ok(value) => self.with_precedence_str(&value),
            Err(_) => Ok(self),
        }
    }

    fn with_precedence_str(mut self, value: &str) -> Result<Self> {
        self.global_precedence = GlobalPrecedence::from_str(value.trim()).ok_or_else(|| {
            Error::Config(format!(
                "{} must be type_bound_first or global_first, got '{}'",
                PRECEDENCE_ENV, value
            ))
        })?;
        Ok(self)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn config_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_missing_fields() {
        let config = ResolverConfig::parse("{}").unwrap();
        assert_eq!(config.global_precedence, GlobalPrecedence::TypeBoundFirst);
    }

    #[test]
    fn test_parse_global_first() {
        let config = ResolverConfig::parse(r#"{"global_precedence": "global_first"}"#).unwrap();
        assert_eq!(config.global_precedence, GlobalPrecedence::GlobalFirst);
    }

    #[test]
    fn test_parse_rejects_unknown_precedence() {
        let err = ResolverConfig::parse(r#"{"global_precedence": "sometimes"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_precedence_string_override() {
        let config = ResolverConfig::default()
            .with_precedence_str(" global_first ")
            .unwrap();
        assert_eq!(config.global_precedence, GlobalPrecedence::GlobalFirst);
        assert!(ResolverConfig::default().with_precedence_str("nope").is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ResolverConfig {
            global_precedence: GlobalPrecedence::GlobalFirst,
        };
        config.save(&path).unwrap();
        assert_eq!(ResolverConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_as_str_round_trips() {
        for precedence in [GlobalPrecedence::TypeBoundFirst, GlobalPrecedence::GlobalFirst] {
            assert_eq!(GlobalPrecedence::from_str(precedence.as_str()), Some(precedence));
        }
    }
}
