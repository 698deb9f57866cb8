//! CLI entry point for the snapaddon server.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use crate::config::AddonConfig;
use crate::error::AddonError;

/// Snappy-reply chat add-on server
#[derive(Parser, Debug, Default)]
#[command(name = "snapaddon", version, about = "Snappy replies when necessary")]
pub struct Cli {
    /// Public base URL; defaults to http://{host}:{port}
    #[arg(long)]
    pub url: Option<String>,

    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// File the installation registry is persisted to
    #[arg(long = "state-file")]
    pub state_file: Option<PathBuf>,

    /// Custom reply word for a user, as mention_name=word (repeatable)
    #[arg(long = "nickname", value_parser = parse_nickname)]
    pub nicknames: Vec<(String, String)>,

    /// User whose "debug" messages are answered with the raw event
    #[arg(long = "debug-user")]
    pub debug_user: Option<String>,
}

impl Cli {
    /// Overlay explicit flags on a config loaded from the environment.
    pub fn apply(&self, mut config: AddonConfig) -> AddonConfig {
        if let Some(url) = &self.url {
            config = config.with_base_url(url.clone());
        }
        if let Some(host) = &self.host {
            config = config.with_host(host.clone());
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(path) = &self.state_file {
            config = config.with_state_file(path.clone());
        }
        config
    }

    pub fn nickname_map(&self) -> HashMap<String, String> {
        self.nicknames.iter().cloned().collect()
    }
}

fn parse_nickname(raw: &str) -> Result<(String, String), String> {
    let (name, word) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected mention_name=word, got {raw:?}"))?;
    let (name, word) = (name.trim(), word.trim());
    if name.is_empty() || word.is_empty() {
        return Err(format!("expected mention_name=word, got {raw:?}"));
    }
    Ok((name.to_string(), word.to_string()))
}

/// Install the global tracing subscriber: `RUST_LOG` filter (default
/// `info`), JSON output when `LOG_FORMAT=json`.
pub fn configure_logging() -> Result<(), AddonError> {
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_str(&filter)
                .map_err(|e| AddonError::Config(format!("RUST_LOG={filter:?}: {e}")))?,
        )
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let result = if env::var("LOG_FORMAT").as_deref() == Ok("json") {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    if let Err(e) = result {
        warn!("logging already initialized: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "snapaddon",
            "--port",
            "8080",
            "--state-file",
            "/tmp/snap.json",
            "--nickname",
            "kb=qwerty",
        ]);
        let config = cli.apply(AddonConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.state_file, PathBuf::from("/tmp/snap.json"));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(cli.nickname_map().get("kb").map(String::as_str), Some("qwerty"));
    }

    #[test]
    fn nickname_requires_both_parts() {
        assert!(parse_nickname("kb").is_err());
        assert!(parse_nickname("=qwerty").is_err());
    }
}
