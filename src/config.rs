//! Engine Configuration
//!
//! Explicit, injectable settings. Nothing in the engine reads the process
//! environment except `EngineConfig::from_env`.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const ENV_APP: &str = "APP_ENV";
const ENV_NODE: &str = "NODE_ENV";
const ENV_DEBUG: &str = "SQL_RECOVERY_DEBUG";
const ENV_PATTERN_LOG: &str = "SQL_RECOVERY_PATTERN_LOG";

/// Deployment environment the engine runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Environment {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(EngineError::Config(format!(
                "unknown environment '{}' (expected development, test or production)",
                other
            ))),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub environment: Environment,
    /// Gates the diagnostics logger; off means `log_pattern` is a no-op
    pub debug_logging: bool,
    /// Optional JSON-lines file the diagnostics logger appends to
    pub pattern_log_path: Option<PathBuf>,
    pub max_recent_patterns: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            debug_logging: true,
            pattern_log_path: None,
            max_recent_patterns: 1000,
        }
    }
}

impl EngineConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            debug_logging: environment == Environment::Development,
            ..Self::default()
        }
    }

    pub fn production() -> Self {
        Self::new(Environment::Production)
    }

    pub fn development() -> Self {
        Self::new(Environment::Development)
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn with_pattern_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.pattern_log_path = Some(path.into());
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Build configuration from process environment variables.
    ///
    /// `APP_ENV` wins over `NODE_ENV`; neither set means development.
    pub fn from_env() -> Result<Self> {
        let environment = match std::env::var(ENV_APP).or_else(|_| std::env::var(ENV_NODE)) {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => Environment::Development,
        };

        let mut config = Self::new(environment);

        if let Ok(value) = std::env::var(ENV_DEBUG) {
            config.debug_logging = parse_flag(&value)?;
        }
        if let Ok(path) = std::env::var(ENV_PATTERN_LOG) {
            if !path.trim().is_empty() {
                config.pattern_log_path = Some(PathBuf::from(path));
            }
        }

        Ok(config)
    }
}

/// Parse a boolean-ish environment flag
pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(EngineError::Config(format!(
            "invalid boolean flag '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" Prod ".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging-eu".parse::<Environment>().is_err());
    }

    #[test]
    fn test_debug_logging_defaults_follow_environment() {
        assert!(EngineConfig::development().debug_logging);
        assert!(!EngineConfig::production().debug_logging);
        assert!(!EngineConfig::new(Environment::Test).debug_logging);
        assert!(EngineConfig::production().is_production());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(parse_flag("maybe").is_err());
    }
}
