use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MemoraConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Connection details for the external auth provider and the session cookies
/// that carry its tokens.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub provider: String,
    pub url: String,
    pub api_key: String,
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub secure_cookies: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub stats_scan_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_memora_dir()
            .join("memora.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: "gotrue".into(),
            url: "http://127.0.0.1:9999".into(),
            api_key: String::new(),
            access_cookie: "memora-access-token".into(),
            refresh_cookie: "memora-refresh-token".into(),
            secure_cookies: false,
            request_timeout_secs: 10,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 50,
            stats_scan_limit: 1000,
        }
    }
}

/// Returns `~/.memora/`, falling back to `./.memora` when no home directory is known.
pub fn default_memora_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".memora")
}

/// Returns the default config file path: `~/.memora/config.toml`
pub fn default_config_path() -> PathBuf {
    default_memora_dir().join("config.toml")
}

impl MemoraConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MemoraConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MEMORA_DB, MEMORA_LOG_LEVEL, MEMORA_PORT,
    /// MEMORA_AUTH_URL, MEMORA_AUTH_KEY).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMORA_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMORA_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MEMORA_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid MEMORA_PORT"),
            }
        }
        if let Ok(val) = std::env::var("MEMORA_AUTH_URL") {
            self.auth.url = val;
        }
        if let Ok(val) = std::env::var("MEMORA_AUTH_KEY") {
            self.auth.api_key = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MemoraConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.auth.access_cookie, "memora-access-token");
        assert_eq!(config.api.default_page_size, 20);
        assert_eq!(config.api.max_page_size, 50);
        assert_eq!(config.api.stats_scan_limit, 1000);
        assert!(config.storage.db_path.ends_with("memora.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"
port = 8080

[storage]
db_path = "/tmp/test.db"

[auth]
url = "https://auth.example.com"
secure_cookies = true
"#;
        let config: MemoraConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.auth.url, "https://auth.example.com");
        assert!(config.auth.secure_cookies);
        // defaults still apply for unset fields
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.auth.refresh_cookie, "memora-refresh-token");
        assert_eq!(config.api.stats_scan_limit, 1000);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MemoraConfig::default();
        std::env::set_var("MEMORA_DB", "/tmp/override.db");
        std::env::set_var("MEMORA_LOG_LEVEL", "trace");
        std::env::set_var("MEMORA_PORT", "4100");
        std::env::set_var("MEMORA_AUTH_URL", "http://auth.internal");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.auth.url, "http://auth.internal");

        // Clean up
        std::env::remove_var("MEMORA_DB");
        std::env::remove_var("MEMORA_LOG_LEVEL");
        std::env::remove_var("MEMORA_PORT");
        std::env::remove_var("MEMORA_AUTH_URL");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = MemoraConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.auth.provider, "gotrue");
    }
}
