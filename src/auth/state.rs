// OAuth2 State Parameter
// Generation of unguessable state values and their session-bound, one-time storage

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::AuthError;
use super::session::SessionId;

/// 32 bytes from the OS random source, base64url encoded without padding.
pub(crate) fn random_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| AuthError::EntropySource(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Source of state values; swapped out where OS entropy must be simulated
pub type StateGenerator = fn() -> Result<String, AuthError>;

/// Fresh state value for an authorization request
pub fn generate_state() -> Result<String, AuthError> {
    random_token()
}

/// A state value awaiting its callback
#[derive(Debug, Clone)]
pub struct FlowState {
    pub value: String,
    pub issued_at: DateTime<Utc>,
}

/// Pending login states, at most one per session
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Record `state` for `session`, replacing any pending one
    async fn put(&self, session: &SessionId, state: String);

    /// Consume the pending state for `session` and report whether it equals
    /// `candidate`. The pending state is removed whatever the outcome.
    async fn take_and_verify(&self, session: &SessionId, candidate: &str) -> bool;

    /// Drop any pending state for `session`
    async fn discard(&self, session: &SessionId);

    /// Remove expired entries, returning how many were dropped
    async fn cleanup_expired(&self) -> usize;
}

/// Process-local state store
pub struct InMemoryStateStore {
    states: Mutex<HashMap<SessionId, FlowState>>,
    ttl: Duration,
}

impl InMemoryStateStore {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::minutes(10)),
        }
    }

    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.lock().await.is_empty()
    }

    fn is_expired(&self, state: &FlowState, now: DateTime<Utc>) -> bool {
        now - state.issued_at > self.ttl
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn put(&self, session: &SessionId, state: String) {
        let flow = FlowState {
            value: state,
            issued_at: Utc::now(),
        };

        let replaced = self.states.lock().await.insert(session.clone(), flow);
        debug!(session = %session.fingerprint(), replaced = replaced.is_some(), "Stored OAuth state");
    }

    async fn take_and_verify(&self, session: &SessionId, candidate: &str) -> bool {
        let mut states = self.states.lock().await;

        let Some(pending) = states.remove(session) else {
            return false;
        };

        if self.is_expired(&pending, Utc::now()) {
            debug!(session = %session.fingerprint(), "OAuth state expired");
            return false;
        }

        constant_time_eq(pending.value.as_bytes(), candidate.as_bytes())
    }

    async fn discard(&self, session: &SessionId) {
        self.states.lock().await.remove(session);
    }

    async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut states = self.states.lock().await;

        let initial_count = states.len();
        states.retain(|_, state| !self.is_expired(state, now));
        let removed = initial_count - states.len();

        if removed > 0 {
            debug!("Cleaned up {} expired OAuth states", removed);
        }

        removed
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
