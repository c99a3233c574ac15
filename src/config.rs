//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILWARD_CONFIG` (environment variable)
//! 2. `~/.config/mailward/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailward\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! The bearer token is never required in the file: `MAILWARD_TOKEN` or
//! `--token` take precedence over `[account] token`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account and endpoint settings.
    pub account: AccountConfig,
    /// Output rendering settings.
    pub output: OutputConfig,
    /// Network tuning.
    pub network: NetworkConfig,
    /// General behavior settings.
    pub general: GeneralConfig,
}

/// Account and endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// JMAP session endpoint.
    pub session_url: String,
    /// Account id; auto-detected from the session when empty.
    pub account_id: Option<String>,
    /// The account's own email address, used as the draft sender and
    /// for reply-all self-exclusion.
    pub email: Option<String>,
    /// Bearer token. Prefer `MAILWARD_TOKEN` over storing it here.
    pub token: Option<String>,
}

/// Output rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: "json" or "text".
    pub format: String,
}

/// Network tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Ids per mutation request.
    pub batch_size: usize,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            session_url: "https://api.fastmail.com/jmap/session".to_string(),
            account_id: None,
            email: None,
            token: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            batch_size: crate::executor::DEFAULT_BATCH_SIZE,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILWARD_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailward").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailward")
}

/// Effective bearer token: environment first, then config file.
pub fn token(config: &Config) -> Option<String> {
    std::env::var("MAILWARD_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .or_else(|| config.account.token.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.account.session_url, "https://api.fastmail.com/jmap/session");
        assert_eq!(cfg.output.format, "json");
        assert_eq!(cfg.network.batch_size, 50);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.account.session_url, cfg.account.session_url);
        assert_eq!(parsed.network.timeout_secs, cfg.network.timeout_secs);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[account]
email = "me@example.com"

[output]
format = "text"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.account.email.as_deref(), Some("me@example.com"));
        assert_eq!(cfg.output.format, "text");
        // Other fields use defaults
        assert_eq!(cfg.network.batch_size, 50);
        assert_eq!(cfg.account.session_url, "https://api.fastmail.com/jmap/session");
    }

    #[test]
    fn test_config_file_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[network]\nbatch_size = 10\n").expect("write");
        let contents = std::fs::read_to_string(&path).expect("read");
        let cfg: Config = toml::from_str(&contents).expect("parse");
        assert_eq!(cfg.network.batch_size, 10);
    }
}
