use std::sync::{PoisonError, RwLock};

use tokio::sync::Mutex;

use super::access_token::AccessToken;
use super::clock::Clock;
use super::issuer::TokenIssuer;
use crate::error::AddonError;
use crate::installation::InstallationRecord;

/// Per-tenant cached token with single-flight refresh.
///
/// Readers take the fast path through `current` and never wait on an
/// issuance. Callers that find the token stale queue on `refresh`. The first
/// one through issues; everyone who queued behind it gets that same token,
/// even when its lifetime is already spent.
#[derive(Debug, Default)]
pub struct TokenSlot {
    state: RwLock<SlotState>,
    refresh: Mutex<()>,
}

#[derive(Debug, Default, Clone)]
struct SlotState {
    token: Option<AccessToken>,
    /// Bumped on every replacement.
    generation: u64,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the cached token, valid or not.
    pub fn current(&self) -> Option<AccessToken> {
        self.snapshot().token
    }

    /// Replace the cached token whole.
    pub fn replace(&self, token: AccessToken) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.token = Some(token);
        state.generation += 1;
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.token = None;
        state.generation += 1;
    }

    fn snapshot(&self) -> SlotState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Return the cached token while valid; otherwise issue exactly one
    /// replacement no matter how many callers arrive concurrently.
    pub async fn get_or_issue(
        &self,
        record: &InstallationRecord,
        issuer: &dyn TokenIssuer,
        clock: &dyn Clock,
    ) -> Result<AccessToken, AddonError> {
        let seen = self.snapshot();
        if let Some(token) = seen.token.filter(|token| token.is_valid(clock)) {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        let latest = self.snapshot();
        if latest.generation != seen.generation {
            // Issued while we waited: share it rather than issue again.
            if let Some(token) = &latest.token {
                return Ok(token.clone());
            }
        }
        if let Some(token) = latest.token.filter(|token| token.is_valid(clock)) {
            return Ok(token);
        }

        let token = issuer.issue(record).await?;
        self.replace(token.clone());
        Ok(token)
    }
}
