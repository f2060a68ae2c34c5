//! Configuration loading: TOML file with environment variable overrides.
//!
//! Reads the file named by `HOMEPORT_CONFIG`, or `homeport.toml` in the
//! working directory. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_PATH: &str = "homeport.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings, forwarded to the `rest` module.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Module toggles.
    pub modules: ModulesConfig,
    /// Raw module options keyed `"<module>-<option>"`.
    pub options: BTreeMap<String, String>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Which modules the daemon registers.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Register the simulated devices.
    pub virtual_enabled: bool,
    /// Register the HTTP API.
    pub rest_enabled: bool,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HOMEPORT_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HOMEPORT_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("HOMEPORT_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("HOMEPORT_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("HOMEPORT_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.rest_enabled && self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.modules.rest_enabled && self.server.host.is_empty() {
            return Err(ConfigError::Validation("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Options to hand to the daemon once the modules are created.
    ///
    /// The `[server]` section comes first as `rest-host`/`rest-port`, then
    /// every `[options]` entry in key order, so an explicit entry wins.
    #[must_use]
    pub fn module_options(&self) -> Vec<(String, String)> {
        let mut options = Vec::with_capacity(self.options.len() + 2);
        if self.modules.rest_enabled {
            options.push(("rest-host".to_string(), self.server.host.clone()));
            options.push(("rest-port".to_string(), self.server.port.to_string()));
        }
        options.extend(self.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        options
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "homeportd=info,homeport=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            rest_enabled: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert!(config.modules.virtual_enabled);
        assert!(config.modules.rest_enabled);
        assert!(config.options.is_empty());
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [logging]
            filter = 'debug'

            [modules]
            virtual_enabled = false

            [options]
            virtual-lamps = '4'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.logging.filter, "debug");
        assert!(!config.modules.virtual_enabled);
        assert!(config.modules.rest_enabled);
        assert_eq!(config.options.get("virtual-lamps").map(String::as_str), Some("4"));
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_apply_env_overrides_in_precedence_order() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("HOMEPORT_HOST", "10.0.0.1"),
            ("HOMEPORT_PORT", "4000"),
            ("HOMEPORT_LOG", "warn"),
            ("RUST_LOG", "trace"),
        ]));
        assert_eq!(config.bind_addr(), "10.0.0.1:4000");
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_prefer_bind_over_host_and_port() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("HOMEPORT_PORT", "4000"), ("HOMEPORT_BIND", "127.0.0.1:5000")]));
        assert_eq!(config.bind_addr(), "127.0.0.1:5000");
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("HOMEPORT_PORT", "http")]));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_reject_zero_port_only_when_rest_enabled() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
        config.modules.rest_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_list_server_options_before_explicit_ones() {
        let mut config = Config::default();
        config.options.insert("rest-port".to_string(), "8000".to_string());
        config.options.insert("virtual-lamps".to_string(), "2".to_string());

        let options = config.module_options();

        let keys: Vec<_> = options.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["rest-host", "rest-port", "rest-port", "virtual-lamps"]);
        assert_eq!(options[2].1, "8000");
    }

    #[test]
    fn should_skip_server_options_when_rest_disabled() {
        let mut config = Config::default();
        config.modules.rest_enabled = false;
        assert!(config.module_options().is_empty());
    }
}
