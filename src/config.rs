//! Configuration management for the SUPLA core.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SuplaError};
use crate::ratelimit::RateLimitRule;

/// Prefix of environment variables overriding file settings,
/// e.g. `SUPLA_SERVER__SOCKET_PATH`.
const ENV_PREFIX: &str = "SUPLA";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuplaConfig {
    /// SUPLA server connection
    #[serde(default)]
    pub server: ServerConfig,

    /// API rate limiting
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// SUPLA server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path of the server's control socket
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Timeout for each connect, write and read, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/supla-server-ctrl.sock")
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Limit shared by all requests
    #[serde(default)]
    pub global_rule: Option<RateLimitRule>,

    /// Limit for users without their own rule
    #[serde(default)]
    pub default_user_rule: Option<RateLimitRule>,

    /// How often expired counters are purged, in seconds. 0 disables purging
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl RateLimitingConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            global_rule: None,
            default_user_rule: None,
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_purge_interval() -> u64 {
    60
}

impl SuplaConfig {
    /// Load configuration from a YAML file, without environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SuplaError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from an optional file, overridden by `SUPLA_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: SuplaConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SuplaConfig::default();
        assert_eq!(
            config.server.socket_path,
            PathBuf::from("/var/run/supla-server-ctrl.sock")
        );
        assert_eq!(config.server.timeout(), Duration::from_secs(5));
        assert!(config.rate_limiting.global_rule.is_none());
        assert!(config.rate_limiting.default_user_rule.is_none());
        assert_eq!(config.rate_limiting.purge_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
server:
  socket_path: /tmp/supla.sock
  timeout_ms: 250
rate_limiting:
  global_rule: "1000/60"
  default_user_rule: "5/10"
"#;
        let config = SuplaConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.socket_path, PathBuf::from("/tmp/supla.sock"));
        assert_eq!(config.server.timeout(), Duration::from_millis(250));
        assert_eq!(
            config.rate_limiting.global_rule,
            Some(RateLimitRule::new(1000, 60).unwrap())
        );
        assert_eq!(
            config.rate_limiting.default_user_rule,
            Some(RateLimitRule::new(5, 10).unwrap())
        );
    }

    #[test]
    fn test_bad_rule_rejects_configuration() {
        let yaml = r#"
rate_limiting:
  global_rule: "lots"
"#;
        let err = SuplaConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SuplaError::Config(_)));

        let yaml = r#"
rate_limiting:
  default_user_rule: "0/10"
"#;
        assert!(SuplaConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "server:\n  socket_path: /tmp/other.sock\nrate_limiting:\n  global_rule: \"20/1\""
        )
        .unwrap();

        let config = SuplaConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.socket_path, PathBuf::from("/tmp/other.sock"));
        assert_eq!(config.server.timeout_ms, 5000);
        assert_eq!(
            config.rate_limiting.global_rule,
            Some(RateLimitRule::new(20, 1).unwrap())
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rate_limiting:\n  default_user_rule: \"5/10\"").unwrap();

        let config = SuplaConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.rate_limiting.default_user_rule,
            Some(RateLimitRule::new(5, 10).unwrap())
        );

        let err = SuplaConfig::from_file("/nonexistent/supla.yaml").unwrap_err();
        assert!(matches!(err, SuplaError::Io(_)));
    }

    #[test]
    fn test_load_rejects_bad_rule_in_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "rate_limiting:\n  global_rule: \"5-10\"").unwrap();

        assert!(SuplaConfig::load(Some(file.path())).is_err());
    }
}
