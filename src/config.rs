//! Application configuration.
//!
//! Loaded once at startup from YAML and treated as immutable afterwards:
//!
//! ```yaml
//! server:
//!   addr: "0.0.0.0:4000"
//!   env: production
//! limiter:
//!   rps: 2.0
//!   burst: 4
//!   enabled: true
//!   sweep_interval_secs: 60
//!   idle_timeout_secs: 180
//! ```
//!
//! The sweep interval and idle timeout have no defaults. Every deployment
//! states how long an idle client's bucket may live.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub limiter: LimiterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_env")]
    pub env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: default_addr(), env: default_env() }
    }
}

/// Per-client token bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Tokens added per second.
    pub rps: f64,
    /// Bucket capacity.
    pub burst: u32,
    /// When false every request bypasses the limiter.
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub sweep_interval_secs: u64,
    pub idle_timeout_secs: u64,
}

impl LimiterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// The eviction settings are checked even when the limiter is disabled,
    /// since the sweeper is started either way. Rate and burst only matter
    /// while it is enabled.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sweep_interval_secs == 0 {
            return Err(Error::InvalidConfig(
                "limiter.sweep_interval_secs must be greater than 0".into(),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "limiter.idle_timeout_secs must be greater than 0".into(),
            ));
        }
        if !self.enabled {
            return Ok(());
        }
        if !self.rps.is_finite() || self.rps <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "limiter.rps must be a positive number, got {}",
                self.rps
            )));
        }
        if self.burst == 0 {
            return Err(Error::InvalidConfig("limiter.burst must be at least 1".into()));
        }
        Ok(())
    }
}

impl Config {
    /// Parses and validates a YAML document.
    pub fn from_yaml(src: &str) -> Result<Self, Error> {
        let config: Config = serde_yaml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let src = std::fs::read_to_string(path)?;
        Self::from_yaml(&src)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.limiter.validate()
    }
}

fn default_addr() -> String {
    "0.0.0.0:4000".to_owned()
}

fn default_env() -> String {
    "development".to_owned()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
server:
  addr: "127.0.0.1:8080"
  env: staging
limiter:
  rps: 2.5
  burst: 4
  enabled: true
  sweep_interval_secs: 60
  idle_timeout_secs: 180
"#;

    #[test]
    fn parses_full_document() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:8080");
        assert_eq!(config.server.env, "staging");
        assert_eq!(config.limiter.rps, 2.5);
        assert_eq!(config.limiter.burst, 4);
        assert!(config.limiter.enabled);
        assert_eq!(config.limiter.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.limiter.idle_timeout(), Duration::from_secs(180));
    }

    #[test]
    fn server_section_defaults() {
        let src = r#"
limiter:
  rps: 1.0
  burst: 5
  sweep_interval_secs: 30
  idle_timeout_secs: 90
"#;
        let config = Config::from_yaml(src).unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:4000");
        assert_eq!(config.server.env, "development");
        assert!(config.limiter.enabled);
    }

    #[test]
    fn eviction_settings_are_required() {
        let src = r#"
limiter:
  rps: 1.0
  burst: 5
"#;
        assert!(matches!(Config::from_yaml(src), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_non_positive_rps() {
        let src = FULL.replace("rps: 2.5", "rps: 0.0");
        assert!(matches!(Config::from_yaml(&src), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_burst() {
        let src = FULL.replace("burst: 4", "burst: 0");
        assert!(matches!(Config::from_yaml(&src), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_sweep_interval_is_rejected_even_when_disabled() {
        let src = FULL
            .replace("sweep_interval_secs: 60", "sweep_interval_secs: 0")
            .replace("enabled: true", "enabled: false");
        assert!(matches!(Config::from_yaml(&src), Err(Error::InvalidConfig(_))));

        let src = FULL.replace("idle_timeout_secs: 180", "idle_timeout_secs: 0");
        assert!(matches!(Config::from_yaml(&src), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn disabled_limiter_skips_rate_validation() {
        let src = FULL
            .replace("rps: 2.5", "rps: 0.0")
            .replace("enabled: true", "enabled: false");
        assert!(Config::from_yaml(&src).is_ok());
    }
}
