//! CLI configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via SPARSEFSM_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use sparsefsm_core::{EngineConfig, UnresolvedPolicy};
use sparsefsm_lock::LockConfig;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine policies.
    pub engine: EngineConfig,
    /// Combination lock settings.
    pub lock: LockConfig,
    /// Tracing filter directive used when SPARSEFSM_LOG is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            lock: LockConfig::default(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Loads `path` if given, then applies environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies overrides read through `lookup`, keyed by variable name.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(policy) = lookup("SPARSEFSM_UNRESOLVED_POLICY") {
            if let Ok(policy) = policy.parse::<UnresolvedPolicy>() {
                self.engine.unresolved = policy;
            }
        }

        if let Some(flag) = lookup("SPARSEFSM_START_WITH_ERRORS") {
            self.engine.start_with_errors = parse_flag(&flag);
        }

        if let Some(combination) = lookup("SPARSEFSM_LOCK_COMBINATION") {
            if let Ok(digits) = LockConfig::parse_combination(&combination) {
                self.lock.combination = digits;
            }
        }

        if let Some(flag) = lookup("SPARSEFSM_LOCK_START_LOCKED") {
            self.lock.start_locked = parse_flag(&flag);
        }

        if let Some(level) = lookup("SPARSEFSM_LOG") {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lock
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("lock: {}", e)))?;
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "log_level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
