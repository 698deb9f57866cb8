//! Configuration system (layered: defaults < env < explicit setters).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AddonError;
use crate::token::DEFAULT_GRACE_SECONDS;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const STATE_FILE_NAME: &str = "state.json";

/// Runtime settings for the add-on server.
#[derive(Debug, Clone, PartialEq)]
pub struct AddonConfig {
    /// Public base URL the platform reaches the add-on at. Derived from
    /// host and port when unset.
    pub base_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub state_file: PathBuf,
    pub http_timeout: Duration,
    pub token_grace_seconds: i64,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            state_file: default_state_file(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            token_grace_seconds: DEFAULT_GRACE_SECONDS,
        }
    }
}

impl AddonConfig {
    /// Load from environment variables (`SNAPADDON_URL`, `SNAPADDON_PORT`, etc.).
    pub fn from_env() -> Result<Self, AddonError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AddonError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get("SNAPADDON_URL") {
            config.base_url = Some(url);
        }
        if let Some(host) = get("SNAPADDON_HOST") {
            config.host = host;
        }
        if let Some(port) = get("SNAPADDON_PORT") {
            config.port = parse_var("SNAPADDON_PORT", &port)?;
        }
        if let Some(path) = get("SNAPADDON_STATE_FILE") {
            config.state_file = PathBuf::from(path);
        }
        if let Some(secs) = get("SNAPADDON_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(parse_var("SNAPADDON_HTTP_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = get("SNAPADDON_TOKEN_GRACE_SECS") {
            config.token_grace_seconds = parse_var("SNAPADDON_TOKEN_GRACE_SECS", &secs)?;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = path.into();
        self
    }

    /// Public base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    /// Absolute URL for a resource path served by the add-on.
    pub fn url(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url(), resource.trim_start_matches('/'))
    }

    /// `host:port` the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shared HTTP client with the configured timeout.
    pub fn http_client(&self) -> Result<reqwest::Client, AddonError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| AddonError::Config(format!("http client: {e}")))
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, AddonError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AddonError::Config(format!("{key}={value:?}: {e}")))
}

fn default_state_file() -> PathBuf {
    directories::ProjectDirs::from("", "", "snapaddon")
        .map(|dirs| dirs.data_dir().join(STATE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(STATE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_derive_base_url_from_host_and_port() {
        let config = AddonConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:3000");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.token_grace_seconds, 120);
        assert!(config.state_file.ends_with(STATE_FILE_NAME));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = AddonConfig::from_lookup(lookup(&[
            ("SNAPADDON_URL", "https://snap.example/"),
            ("SNAPADDON_PORT", "8080"),
            ("SNAPADDON_STATE_FILE", "/var/lib/snap/state.json"),
            ("SNAPADDON_TOKEN_GRACE_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.token_grace_seconds, 60);
        assert_eq!(config.state_file, PathBuf::from("/var/lib/snap/state.json"));
        assert_eq!(config.url("/webhook/0"), "https://snap.example/webhook/0");
    }

    #[test]
    fn invalid_port_is_config_error() {
        let err = AddonConfig::from_lookup(lookup(&[("SNAPADDON_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, AddonError::Config(msg) if msg.contains("SNAPADDON_PORT")));
    }

    #[test]
    fn url_joins_relative_resources() {
        let config = AddonConfig::default().with_host("0.0.0.0").with_port(9000);
        assert_eq!(config.url("install"), "http://0.0.0.0:9000/install");
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }
}
