//! snapaddon binary: a room add-on that answers "query" with a snappy reply.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use serde_json::Value;
use snapaddon::cli::{configure_logging, Cli};
use snapaddon::config::AddonConfig;
use snapaddon::descriptor::{
    ApiConsumer, Capabilities, CapabilitiesDescriptor, Installable, Links, Vendor, WebHook,
};
use snapaddon::error::AddonError;
use snapaddon::installation::InstallationRecord;
use snapaddon::notification::{MessageFormat, Notification};
use snapaddon::runtime::{AddonRuntime, WebhookHandler};
use snapaddon::server::AddonServer;
use snapaddon::store::FileInstallationStore;
use snapaddon::token::HttpTokenIssuer;
use tracing::{error, info, warn};

const HOMEPAGE: &str = "https://github.com/davidrjonas/ohsnap";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AddonError> {
    configure_logging()?;
    let config = cli.apply(AddonConfig::from_env()?);

    info!(path = %config.state_file.display(), "loading installation state");
    let store = Arc::new(FileInstallationStore::open(&config.state_file)?);

    let client = config.http_client()?;
    let issuer = HttpTokenIssuer::new(client.clone()).with_grace_seconds(config.token_grace_seconds);
    let runtime = AddonRuntime::new(store)
        .with_http_client(client)
        .with_token_issuer(Arc::new(issuer));

    let replier = SnappyReply {
        nicknames: cli.nickname_map(),
        debug_user: cli.debug_user.clone(),
    };
    let webhook = WebHook::new("room_message", config.url("/webhook/0"))
        .with_name("Yraquery")
        .with_pattern("(?i)quer(y|ies)");
    let server = AddonServer::new(Arc::new(runtime), descriptor(&config))
        .with_webhook(webhook, Arc::new(replier));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .map_err(|e| AddonError::Config(format!("bind {}: {e}", config.bind_address())))?;
    info!(base_url = %config.base_url(), "starting add-on server");
    server.serve(listener, shutdown_signal()).await
}

fn descriptor(config: &AddonConfig) -> CapabilitiesDescriptor {
    CapabilitiesDescriptor {
        name: "OhSnap".to_string(),
        description: "Snappy replies when necessary.".to_string(),
        key: "ohsnap".to_string(),
        vendor: Some(Vendor {
            name: "davidrjonas".to_string(),
            url: HOMEPAGE.to_string(),
        }),
        links: Links {
            homepage: Some(HOMEPAGE.to_string()),
            self_url: config.url("/capabilities.json"),
        },
        capabilities: Capabilities {
            hipchat_api_consumer: Some(ApiConsumer {
                scopes: vec!["send_notification".to_string()],
                from_name: None,
                avatar: None,
            }),
            installable: Some(Installable {
                allow_global: false,
                allow_room: true,
                callback_url: Some(config.url("/install")),
                installed_url: None,
                uninstalled_url: Some(config.url("/uninstall")),
            }),
            webhooks: Vec::new(),
            glances: Vec::new(),
        },
        api_version: None,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Replies to room messages matching the webhook pattern.
struct SnappyReply {
    nicknames: HashMap<String, String>,
    debug_user: Option<String>,
}

impl SnappyReply {
    /// Reply text for `event`, or `None` when the sender gets no reply.
    fn reply(&self, event: &Value) -> Option<String> {
        let message = &event["item"]["message"];
        let name = message["from"]["mention_name"].as_str().unwrap_or_default();
        if name.is_empty() {
            warn!("room message without a sender mention name");
        }

        if self.debug_user.as_deref() == Some(name) && !name.is_empty() {
            let text = message["message"].as_str().unwrap_or_default();
            if !text.contains("debug") {
                return None;
            }
            let dump = serde_json::to_string_pretty(event)
                .unwrap_or_else(|e| format!("Error marshalling json: {e:?}"));
            return Some(format!("@{name} {dump}"));
        }

        let word = self.nicknames.get(name).map_or("queryf", String::as_str);
        Some(if name.is_empty() {
            format!("You're a {word}.")
        } else {
            format!("@{name} You're a {word}.")
        })
    }
}

#[async_trait]
impl WebhookHandler for SnappyReply {
    async fn handle(
        &self,
        runtime: &AddonRuntime,
        record: &InstallationRecord,
        _webhook: &WebHook,
        event: Value,
    ) -> Result<(), AddonError> {
        let Some(message) = self.reply(&event) else {
            return Ok(());
        };
        let notification = Notification::builder()
            .message(message)
            .message_format(MessageFormat::Text)
            .notify(true)
            .build();
        runtime
            .send_notification(record, &notification)
            .await
            .map_err(|e| {
                error!(tenant_id = record.tenant_id(), error = %e, "reply failed");
                e
            })
    }
}
