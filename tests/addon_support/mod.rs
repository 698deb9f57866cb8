#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use snapaddon::error::AddonError;
use snapaddon::installation::InstallationRecord;
use snapaddon::token::{AccessToken, Clock, TokenIssuer};

pub const TENANT: &str = "acme";
pub const SECRET: &str = "s3cr3t";
pub const START: i64 = 1_700_000_000;

/// Clock tests move by hand.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(now),
        })
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Issuer that counts calls and hands out `token-N`, optionally after a
/// delay so concurrent callers pile up behind the first.
#[derive(Debug)]
pub struct CountingIssuer {
    calls: AtomicUsize,
    clock: Arc<ManualClock>,
    lifetime: i64,
    delay: Duration,
    fail_next: Mutex<Option<AddonError>>,
}

impl CountingIssuer {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            clock,
            lifetime: 300,
            delay: Duration::ZERO,
            fail_next: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_lifetime(mut self, lifetime: i64) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn fail_next(&self, error: AddonError) {
        *self.fail_next.lock().expect("issuer lock poisoned") = Some(error);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenIssuer for CountingIssuer {
    async fn issue(&self, _record: &InstallationRecord) -> Result<AccessToken, AddonError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.fail_next.lock().expect("issuer lock poisoned").take() {
            return Err(err);
        }
        Ok(AccessToken::new(
            format!("token-{n}"),
            "bearer",
            "send_notification",
            self.clock.now() + self.lifetime,
        ))
    }
}

/// Installed record whose token and API endpoints point at `base`.
pub fn record(base: &str) -> InstallationRecord {
    InstallationRecord::new(
        TENANT,
        format!("{base}/capabilities"),
        SECRET,
        format!("{base}/token"),
        format!("{base}/v2/"),
    )
    .with_room_id("42")
}

/// Capabilities document advertising token and API endpoints under `base`.
pub fn capabilities_body(base: &str) -> serde_json::Value {
    json!({
        "name": "Test Platform",
        "capabilities": {
            "oauth2Provider": {"tokenUrl": format!("{base}/token")},
            "hipchatApiProvider": {"url": format!("{base}/v2/")}
        }
    })
}

/// HS256 JWT signed with `secret`.
pub fn sign_jwt(claims: serde_json::Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("sign jwt")
}

/// Valid token for the default tenant, expiring five minutes from now.
pub fn tenant_jwt() -> String {
    let now = chrono::Utc::now().timestamp();
    sign_jwt(json!({"iss": TENANT, "iat": now, "exp": now + 300}), SECRET)
}
