mod addon_support;

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderValue};
use pretty_assertions::assert_eq;
use serde_json::json;
use snapaddon::auth::{RequestAuthenticator, SignedRequest, UnauthorizedReason};
use snapaddon::store::{InstallationStore, MemoryInstallationStore};

use addon_support::{record, sign_jwt, tenant_jwt, SECRET, TENANT};

fn authenticator() -> RequestAuthenticator {
    let store = Arc::new(MemoryInstallationStore::new());
    store.add(record("https://p")).expect("seed");
    RequestAuthenticator::new(store)
}

fn authorization(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header value"));
    headers
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[test]
fn every_transport_resolves_the_same_tenant() {
    let token = tenant_jwt();
    let empty = HeaderMap::new();
    let bearer = authorization(&format!("Bearer {token}"));
    let jwt = authorization(&format!("JWT {token}"));
    let query = format!("signed_request={token}&xdm_e=https%3A%2F%2Fp");
    let form = format!("signed_request={token}");

    let requests = [
        SignedRequest::new(&bearer),
        SignedRequest::new(&jwt),
        SignedRequest::new(&empty).with_query(Some(&query)),
        SignedRequest::new(&empty).with_form(Some(&form)),
    ];
    let auth = authenticator();
    for request in requests {
        let resolved = auth.authenticate(&request).expect("authenticated");
        assert_eq!(resolved.tenant_id(), TENANT);
    }
}

#[test]
fn header_wins_over_query_parameter() {
    let forged = sign_jwt(json!({"iss": TENANT, "exp": now() + 300}), "forged");
    let headers = authorization(&format!("JWT {}", tenant_jwt()));
    let query = format!("signed_request={forged}");

    let resolved = authenticator()
        .authenticate(&SignedRequest::new(&headers).with_query(Some(&query)))
        .expect("header token used");
    assert_eq!(resolved.tenant_id(), TENANT);
}

#[test]
fn failures_are_indistinguishable_to_the_caller() {
    let unknown = sign_jwt(json!({"iss": "nobody", "exp": now() + 300}), SECRET);
    let forged = sign_jwt(json!({"iss": TENANT, "exp": now() + 300}), "forged");
    let expired = sign_jwt(json!({"iss": TENANT, "exp": now() - 600}), SECRET);

    let auth = authenticator();
    let messages: Vec<String> = [unknown, forged, expired]
        .iter()
        .map(|token| {
            let headers = authorization(&format!("JWT {token}"));
            auth.authenticate(&SignedRequest::new(&headers))
                .unwrap_err()
                .to_string()
        })
        .collect();

    assert_eq!(messages, vec!["Unauthorized"; 3]);
}

#[test]
fn leeway_tolerates_small_clock_skew() {
    let token = sign_jwt(json!({"iss": TENANT, "exp": now() - 5}), SECRET);
    let headers = authorization(&format!("JWT {token}"));
    let request = SignedRequest::new(&headers);

    let strict = authenticator().authenticate(&request).unwrap_err();
    assert_eq!(strict.unauthorized_reason(), Some(UnauthorizedReason::Expired));

    authenticator()
        .with_leeway_seconds(60)
        .authenticate(&request)
        .expect("within leeway");
}

#[test]
fn tenant_with_empty_secret_never_authenticates() {
    let store = Arc::new(MemoryInstallationStore::new());
    let mut open = record("https://p");
    open.oauth_secret = String::new();
    store.add(open).expect("seed");

    let token = sign_jwt(json!({"iss": TENANT, "exp": now() + 300}), "anything");
    let headers = authorization(&format!("JWT {token}"));
    let err = RequestAuthenticator::new(store)
        .authenticate(&SignedRequest::new(&headers))
        .unwrap_err();
    assert_eq!(err.unauthorized_reason(), Some(UnauthorizedReason::EmptySecret));
}
