//! HTTP surface of the add-on: descriptor, lifecycle callbacks, and
//! authenticated webhook and glance routes.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{SignedRequest, SIGNED_REQUEST_PARAM};
use crate::descriptor::{url_path, CapabilitiesDescriptor, Glance, WebHook};
use crate::error::AddonError;
use crate::installation::InstallRequest;
use crate::runtime::{AddonRuntime, GlanceProvider, WebhookHandler};

/// Query/form parameter naming the platform URL that identifies the tenant.
pub const INSTALLABLE_URL_PARAM: &str = "installable_url";
/// Query/form parameter naming where to send the user after uninstall.
pub const REDIRECT_URL_PARAM: &str = "redirect_url";

/// Builds the add-on's router from its descriptor and registered handlers.
///
/// Webhooks and glances added here are also appended to the descriptor, so
/// the served capabilities document always matches the routes.
pub struct AddonServer {
    runtime: Arc<AddonRuntime>,
    descriptor: CapabilitiesDescriptor,
    webhooks: Vec<(WebHook, Arc<dyn WebhookHandler>)>,
    glances: Vec<(Glance, Arc<dyn GlanceProvider>)>,
}

struct ServerState {
    runtime: Arc<AddonRuntime>,
    descriptor_json: String,
}

impl AddonServer {
    pub fn new(runtime: Arc<AddonRuntime>, descriptor: CapabilitiesDescriptor) -> Self {
        Self {
            runtime,
            descriptor,
            webhooks: Vec::new(),
            glances: Vec::new(),
        }
    }

    pub fn with_webhook(mut self, webhook: WebHook, handler: Arc<dyn WebhookHandler>) -> Self {
        self.descriptor.capabilities.webhooks.push(webhook.clone());
        self.webhooks.push((webhook, handler));
        self
    }

    pub fn with_glance(mut self, glance: Glance, provider: Arc<dyn GlanceProvider>) -> Self {
        self.descriptor.capabilities.glances.push(glance.clone());
        self.glances.push((glance, provider));
        self
    }

    pub fn descriptor(&self) -> &CapabilitiesDescriptor {
        &self.descriptor
    }

    pub fn runtime(&self) -> &Arc<AddonRuntime> {
        &self.runtime
    }

    /// Assemble every route. URLs that have no usable path are skipped with
    /// a warning; two handlers claiming the same path and method is a
    /// [`AddonError::Config`] error.
    pub fn router(&self) -> Result<Router, AddonError> {
        let descriptor_json = serde_json::to_string_pretty(&self.descriptor)?;
        let state = Arc::new(ServerState {
            runtime: self.runtime.clone(),
            descriptor_json,
        });

        let mut router = Router::new();
        let mut claims = RouteClaims::default();
        match url_path(&self.descriptor.links.self_url) {
            Some(path) => {
                claims.claim(&path, &[Method::GET], "descriptor")?;
                router = router.route(&path, get(handle_descriptor));
            }
            None => {
                return Err(AddonError::Config(format!(
                    "descriptor self link {:?} has no path",
                    self.descriptor.links.self_url
                )))
            }
        }

        if let Some(installable) = &self.descriptor.capabilities.installable {
            if let Some(path) = route_path(installable.callback_url.as_deref(), "install") {
                claims.claim(&path, &[Method::POST], "install")?;
                router = router.route(&path, post(handle_install));
            }
            if let Some(path) = route_path(installable.uninstalled_url.as_deref(), "uninstall") {
                claims.claim(&path, &[Method::GET, Method::POST], "uninstall")?;
                router = router.route(&path, get(handle_uninstall).post(handle_uninstall));
            }
        }

        for (webhook, handler) in &self.webhooks {
            let Some(path) = route_path(Some(&webhook.url), "webhook") else {
                continue;
            };
            claims.claim(&path, &[Method::POST], "webhook")?;
            let route = Arc::new(WebhookRoute {
                webhook: webhook.clone(),
                handler: handler.clone(),
            });
            router = router.route(
                &path,
                post(
                    move |State(state): State<Arc<ServerState>>,
                          headers: HeaderMap,
                          RawQuery(query): RawQuery,
                          body: Bytes| {
                        let route = route.clone();
                        async move { handle_webhook(state, route, headers, query, body).await }
                    },
                ),
            );
        }

        for (glance, provider) in &self.glances {
            let Some(path) = route_path(glance.query_url.as_deref(), "glance") else {
                continue;
            };
            claims.claim(&path, &[Method::GET, Method::POST], "glance")?;
            let route = Arc::new(GlanceRoute {
                glance: glance.clone(),
                provider: provider.clone(),
            });
            let handler = move |State(state): State<Arc<ServerState>>,
                                headers: HeaderMap,
                                RawQuery(query): RawQuery,
                                body: Bytes| {
                let route = route.clone();
                async move { handle_glance(state, route, headers, query, body).await }
            };
            router = router.route(&path, get(handler.clone()).post(handler));
        }

        Ok(router
            .layer(TraceLayer::new_for_http())
            .with_state(state))
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), AddonError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router()?;
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "add-on server listening");
        }
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AddonError::Network(format!("server: {e}")))
    }
}

/// Path and method pairs already bound to a handler.
#[derive(Default)]
struct RouteClaims {
    taken: HashSet<(String, Method)>,
}

impl RouteClaims {
    fn claim(&mut self, path: &str, methods: &[Method], what: &str) -> Result<(), AddonError> {
        for method in methods {
            if self.taken.contains(&(path.to_string(), method.clone())) {
                return Err(AddonError::Config(format!(
                    "{what} route {method} {path} is already registered"
                )));
            }
        }
        for method in methods {
            self.taken.insert((path.to_string(), method.clone()));
        }
        Ok(())
    }
}

struct WebhookRoute {
    webhook: WebHook,
    handler: Arc<dyn WebhookHandler>,
}

struct GlanceRoute {
    glance: Glance,
    provider: Arc<dyn GlanceProvider>,
}

fn route_path(url: Option<&str>, what: &str) -> Option<String> {
    let url = url?;
    let path = url_path(url);
    if path.is_none() {
        warn!(url, what, "skipping route without a usable path");
    }
    path
}

async fn handle_descriptor(State(state): State<Arc<ServerState>>) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        state.descriptor_json.clone(),
    )
        .into_response()
}

async fn handle_install(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    let request: InstallRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            info!(error = %err, "malformed install callback");
            return (StatusCode::BAD_REQUEST, format!("invalid install body: {err}")).into_response();
        }
    };
    match state.runtime.install(request).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => {
            error!(error = %err, "install failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn handle_uninstall(
    State(state): State<Arc<ServerState>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let form = std::str::from_utf8(&body).ok();
    let installable_url = form_param([query.as_deref(), form], INSTALLABLE_URL_PARAM);
    let redirect_url = form_param([query.as_deref(), form], REDIRECT_URL_PARAM);
    let (Some(installable_url), Some(redirect_url)) = (installable_url, redirect_url) else {
        return (
            StatusCode::BAD_REQUEST,
            "installable_url and redirect_url are required",
        )
            .into_response();
    };

    match state.runtime.uninstall_from_url(&installable_url).await {
        Ok(_) => match HeaderValue::from_str(&redirect_url) {
            Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
            Err(_) => (StatusCode::BAD_REQUEST, "invalid redirect_url").into_response(),
        },
        Err(err) => {
            error!(error = %err, installable_url = %installable_url, "uninstall failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn handle_webhook(
    state: Arc<ServerState>,
    route: Arc<WebhookRoute>,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
) -> Response {
    let form = form_body(&headers, &body);
    let signed = SignedRequest::new(&headers)
        .with_query(query.as_deref())
        .with_form(form);
    let record = match state.runtime.authenticate(&signed) {
        Ok(record) => record,
        Err(err) => return error_response(&err),
    };

    let event = match form {
        Some(form) => form_event(form),
        None => match serde_json::from_slice(&body) {
            Ok(event) => event,
            Err(err) => {
                info!(tenant_id = record.tenant_id(), error = %err, "malformed webhook body");
                return (StatusCode::BAD_REQUEST, format!("invalid webhook body: {err}"))
                    .into_response();
            }
        },
    };

    match route
        .handler
        .handle(&state.runtime, &record, &route.webhook, event)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => {
            error!(
                tenant_id = record.tenant_id(),
                event = %route.webhook.event,
                error = %err,
                "webhook handler failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn handle_glance(
    state: Arc<ServerState>,
    route: Arc<GlanceRoute>,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
) -> Response {
    let signed = SignedRequest::new(&headers)
        .with_query(query.as_deref())
        .with_form(form_body(&headers, &body));
    let mut response = match state.runtime.authenticate(&signed) {
        Ok(record) => match route
            .provider
            .glance_data(&state.runtime, &record, &route.glance)
            .await
        {
            Ok(data) => Json(data).into_response(),
            Err(err) => {
                error!(
                    tenant_id = record.tenant_id(),
                    glance = %route.glance.key,
                    error = %err,
                    "glance provider failed"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        },
        Err(err) => error_response(&err),
    };
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

fn error_response(err: &AddonError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, err.to_string()).into_response()
}

/// The body as text when it was posted as an HTML form.
fn form_body<'a>(headers: &HeaderMap, body: &'a [u8]) -> Option<&'a str> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        return None;
    }
    std::str::from_utf8(body).ok()
}

/// Form fields as a flat JSON object, minus the signed request.
fn form_event(form: &str) -> serde_json::Value {
    let fields = url::form_urlencoded::parse(form.as_bytes())
        .filter(|(key, _)| key != SIGNED_REQUEST_PARAM)
        .map(|(key, value)| (key.into_owned(), serde_json::Value::String(value.into_owned())))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(fields)
}

fn form_param<const N: usize>(sources: [Option<&str>; N], name: &str) -> Option<String> {
    sources.into_iter().flatten().find_map(|encoded| {
        url::form_urlencoded::parse(encoded.as_bytes())
            .find(|(key, value)| key == name && !value.trim().is_empty())
            .map(|(_, value)| value.into_owned())
    })
}
