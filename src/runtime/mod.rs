//! Add-on runtime: install/uninstall lifecycle and token-gated outbound calls.

pub mod hooks;

pub use hooks::{GlanceProvider, InstallationHooks, NoopHooks, WebhookHandler};

use std::sync::Arc;

use futures::future::join_all;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{RequestAuthenticator, SignedRequest};
use crate::error::AddonError;
use crate::installation::{ApiEndpoints, InstallRequest, InstallableInfo, InstallationRecord};
use crate::notification::{GlanceUpdates, Notification};
use crate::store::InstallationStore;
use crate::token::{AccessToken, Clock, HttpTokenIssuer, SystemClock, TokenIssuer};

/// Owns the installation store and token issuer and performs every
/// platform-facing operation.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use snapaddon::runtime::AddonRuntime;
/// use snapaddon::store::MemoryInstallationStore;
/// use snapaddon::notification::Notification;
///
/// # async fn example() -> snapaddon::error::Result<()> {
/// let runtime = AddonRuntime::new(Arc::new(MemoryInstallationStore::new()));
/// let record = runtime.installation("acme")?;
/// runtime.send_notification(&record, &Notification::text("hello")).await?;
/// # Ok(())
/// # }
/// ```
pub struct AddonRuntime {
    store: Arc<dyn InstallationStore>,
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
    client: reqwest::Client,
    hooks: Arc<dyn InstallationHooks>,
    authenticator: RequestAuthenticator,
    /// Set once a caller supplies its own issuer.
    custom_issuer: bool,
}

impl AddonRuntime {
    pub fn new(store: Arc<dyn InstallationStore>) -> Self {
        let client = reqwest::Client::new();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            authenticator: RequestAuthenticator::new(store.clone()),
            store,
            issuer: default_issuer(&client, &clock),
            clock,
            client,
            hooks: Arc::new(NoopHooks),
            custom_issuer: false,
        }
    }

    /// Client for capabilities, uninstall and notification calls, and for
    /// token requests unless a custom issuer is set.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self.refresh_default_issuer();
        self
    }

    pub fn with_token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.issuer = issuer;
        self.custom_issuer = true;
        self
    }

    /// Clock used to decide whether a cached token is still valid. The
    /// default issuer stamps expiries with the same clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.refresh_default_issuer();
        self
    }

    fn refresh_default_issuer(&mut self) {
        if !self.custom_issuer {
            self.issuer = default_issuer(&self.client, &self.clock);
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn InstallationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_authenticator(mut self, authenticator: RequestAuthenticator) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn store(&self) -> &Arc<dyn InstallationStore> {
        &self.store
    }

    /// Look up an installation, failing with `NotFound` for unknown tenants.
    pub fn installation(&self, tenant_id: &str) -> Result<InstallationRecord, AddonError> {
        self.store
            .get(tenant_id)
            .ok_or_else(|| AddonError::NotFound(tenant_id.to_string()))
    }

    /// Resolve the tenant that signed an inbound request.
    pub fn authenticate(
        &self,
        request: &SignedRequest<'_>,
    ) -> Result<InstallationRecord, AddonError> {
        self.authenticator.authenticate(request)
    }

    /// Install a tenant: pre-change hook, capabilities discovery, store,
    /// post-change hook.
    pub async fn install(&self, request: InstallRequest) -> Result<InstallationRecord, AddonError> {
        let tenant_id = request.oauth_id.clone();
        self.hooks.before_install(&request).await.map_err(|err| {
            info!(tenant_id = %tenant_id, error = %err, "install vetoed by hook");
            match err {
                AddonError::Rejected(_) => err,
                other => AddonError::Rejected(format!("{tenant_id}: {other}")),
            }
        })?;

        let body = self
            .get_json_body(&request.capabilities_url, "capabilities")
            .await?;
        let endpoints = ApiEndpoints::from_capabilities(&body).map_err(|err| {
            AddonError::Decode(format!("capabilities for {tenant_id}: {err}"))
        })?;

        let record = request.into_record(endpoints);
        let stored = record.clone();
        self.with_store(move |store| store.add(stored)).await?;
        info!(tenant_id = %tenant_id, room_id = ?record.room_id, "installation added");

        if let Err(err) = self.hooks.installed(&record).await {
            warn!(tenant_id = %tenant_id, error = %err, "installed hook failed");
        }
        Ok(record)
    }

    /// Fetch `{oauthId}` from the platform's installable URL and uninstall it.
    pub async fn uninstall_from_url(
        &self,
        installable_url: &str,
    ) -> Result<Option<InstallationRecord>, AddonError> {
        let body = self.get_json_body(installable_url, "installable").await?;
        let info: InstallableInfo = serde_json::from_slice(&body)
            .map_err(|err| AddonError::Decode(format!("installable {installable_url}: {err}")))?;
        self.uninstall(&info.oauth_id).await
    }

    /// Delete a tenant. Unknown tenants are a no-op returning `None`.
    pub async fn uninstall(
        &self,
        tenant_id: &str,
    ) -> Result<Option<InstallationRecord>, AddonError> {
        let key = tenant_id.to_string();
        let Some(record) = self.with_store(move |store| store.delete(&key)).await? else {
            debug!(tenant_id, "uninstall for unknown tenant ignored");
            return Ok(None);
        };
        info!(tenant_id, "installation removed");

        if let Err(err) = self.hooks.uninstalled(&record).await {
            warn!(tenant_id, error = %err, "uninstalled hook failed");
        }
        Ok(Some(record))
    }

    /// Valid access token for `record`, issuing one if needed.
    pub async fn access_token(&self, record: &InstallationRecord) -> Result<AccessToken, AddonError> {
        record
            .access_token(self.issuer.as_ref(), self.clock.as_ref())
            .await
    }

    /// Post a notification to the installation's room.
    pub async fn send_notification(
        &self,
        record: &InstallationRecord,
        notification: &Notification,
    ) -> Result<(), AddonError> {
        let room_id = record.require_room_id("send_notification")?;
        let url = api_endpoint(&record.api_url, &format!("room/{room_id}/notification"));
        self.post_with_token(record, &url, notification).await
    }

    /// Push new glance content to the installation's room.
    pub async fn update_glance_data(
        &self,
        record: &InstallationRecord,
        updates: &GlanceUpdates,
    ) -> Result<(), AddonError> {
        let room_id = record.require_room_id("update_glance_data")?;
        let url = api_endpoint(&record.api_url, &format!("addon/ui/room/{room_id}"));
        self.post_with_token(record, &url, updates).await
    }

    /// Push a glance update to every installation.
    ///
    /// Failures are logged and returned per tenant; one failing tenant never
    /// stops the others.
    pub async fn update_glances(&self, updates: &GlanceUpdates) -> Vec<(String, AddonError)> {
        let installations = self.store.get_all();
        let results = join_all(installations.values().map(|record| async move {
            (
                record.tenant_id().to_string(),
                self.update_glance_data(record, updates).await,
            )
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(tenant_id, result)| match result {
                Ok(()) => None,
                Err(err) => {
                    warn!(tenant_id = %tenant_id, error = %err, "glance update failed");
                    Some((tenant_id, err))
                }
            })
            .collect()
    }

    /// Run a store mutation off the async workers; stores may block on disk.
    async fn with_store<T, F>(&self, op: F) -> Result<T, AddonError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn InstallationStore) -> Result<T, AddonError> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|err| AddonError::Persistence(format!("store task: {err}")))?
    }

    async fn post_with_token<T: Serialize + ?Sized>(
        &self,
        record: &InstallationRecord,
        url: &str,
        body: &T,
    ) -> Result<(), AddonError> {
        let tenant_id = record.tenant_id();
        let token = self.access_token(record).await?;

        let resp = self
            .client
            .post(url)
            .bearer_auth(token.value())
            .json(body)
            .send()
            .await
            .map_err(|e| AddonError::Network(format!("POST {url} for {tenant_id}: {e}")))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(AddonError::auth(
                status.as_u16(),
                format!("POST {url} for {tenant_id}: {body}"),
            ));
        }
        if !status.is_success() {
            return Err(AddonError::Network(format!(
                "POST {url} for {tenant_id} returned {status}"
            )));
        }
        debug!(tenant_id, url, "posted with access token");
        Ok(())
    }

    async fn get_json_body(&self, url: &str, what: &str) -> Result<Vec<u8>, AddonError> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AddonError::Network(format!("GET {what} {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AddonError::Network(format!(
                "GET {what} {url} returned {status}"
            )));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| AddonError::Network(format!("GET {what} {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

fn default_issuer(client: &reqwest::Client, clock: &Arc<dyn Clock>) -> Arc<dyn TokenIssuer> {
    Arc::new(HttpTokenIssuer::new(client.clone()).with_clock(clock.clone()))
}

/// Join an API base URL and a relative path with exactly one slash.
fn api_endpoint(api_url: &str, path: &str) -> String {
    format!("{}/{}", api_url.trim_end_matches('/'), path)
}
