// Credential Persistence
// Post-login credential sealed into an AES-256-GCM encrypted cookie

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::config::CookieConfig;
use super::error::AuthError;
use super::provider::{TokenResponse, UserProfile};
use super::session::cookie_value;
use crate::security::{DataEncryption, SecurityAuditor};

/// Salt for deriving the cookie key from the configured session secret
const KEY_DERIVATION_SALT: &[u8] = b"authgate.credential-cookie.v1";

/// Browsers commonly cap a single cookie at 4096 bytes
const MAX_COOKIE_BYTES: usize = 4096;

/// What a browser holds after a successful login
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub profile: UserProfile,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Lifetime is the shorter of `max_ttl` and the token's own `expires_in`
    pub fn new(token: &TokenResponse, profile: UserProfile, max_ttl: Duration) -> Self {
        let ttl = match token.expires_in {
            Some(expires_in) => max_ttl.min(Duration::from_secs(expires_in)),
            None => max_ttl,
        };
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());

        Self {
            access_token: token.access_token.clone(),
            profile,
            expires_at: Utc::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time until expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("sub", &self.profile.sub)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where credentials live between requests
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist `credential` by adding headers to the outgoing response
    async fn store(&self, response: &mut HeaderMap, credential: &Credential) -> Result<(), AuthError>;

    /// Credential carried by an incoming request. Anything unreadable,
    /// tampered with or expired yields `None`.
    async fn load(&self, request: &HeaderMap) -> Option<Credential>;

    /// Remove the credential from the browser
    fn clear(&self, response: &mut HeaderMap);
}

/// Stores the credential in the browser, sealed so it can be neither read nor forged
pub struct EncryptedCookieStore {
    encryption: DataEncryption,
    cookie: CookieConfig,
    max_ttl: Duration,
    auditor: SecurityAuditor,
}

impl EncryptedCookieStore {
    pub fn new(
        encryption: DataEncryption,
        cookie: CookieConfig,
        max_ttl: Duration,
        auditor: SecurityAuditor,
    ) -> Self {
        Self {
            encryption,
            cookie,
            max_ttl,
            auditor,
        }
    }

    /// Derive the cookie key from the session secret
    pub fn from_secret(
        secret: &str,
        cookie: CookieConfig,
        max_ttl: Duration,
        auditor: SecurityAuditor,
    ) -> Result<Self, AuthError> {
        let encryption = DataEncryption::from_password(secret, KEY_DERIVATION_SALT)?;
        Ok(Self::new(encryption, cookie, max_ttl, auditor))
    }

    fn name(&self) -> &str {
        &self.cookie.credential_name
    }

    fn decode(&self, sealed: &str) -> Result<Credential, AuthError> {
        let plaintext = self
            .encryption
            .open(sealed, self.name().as_bytes())
            .map_err(|e| AuthError::Deserialize(e.to_string()))?;

        serde_json::from_slice(&plaintext).map_err(|e| AuthError::Deserialize(e.to_string()))
    }
}

#[async_trait]
impl CredentialStore for EncryptedCookieStore {
    async fn store(&self, response: &mut HeaderMap, credential: &Credential) -> Result<(), AuthError> {
        let plaintext = serde_json::to_vec(credential)
            .map_err(|e| AuthError::ConfigError(format!("Failed to serialize credential: {}", e)))?;
        let sealed = self.encryption.seal(&plaintext, self.name().as_bytes())?;

        if sealed.len() > MAX_COOKIE_BYTES {
            warn!(
                size = sealed.len(),
                "Credential cookie exceeds 4096 bytes and may be dropped by the browser"
            );
        }

        let max_age = self.max_ttl.min(credential.remaining());
        let cookie = self.cookie.set_cookie(self.name(), &sealed, max_age);
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| AuthError::ConfigError(format!("Invalid cookie header: {}", e)))?;
        response.append(header::SET_COOKIE, value);

        Ok(())
    }

    async fn load(&self, request: &HeaderMap) -> Option<Credential> {
        let sealed = cookie_value(request, self.name()).filter(|value| !value.is_empty())?;

        match self.decode(&sealed) {
            Ok(credential) if credential.is_expired() => {
                debug!(sub = %credential.profile.sub, "Credential cookie expired");
                None
            }
            Ok(credential) => Some(credential),
            Err(err) => {
                let mut details = HashMap::new();
                details.insert("cookie".to_string(), self.name().to_string());
                details.insert("reason".to_string(), err.to_string());
                self.auditor
                    .log_suspicious_activity(None, "credential_cookie_rejected", details)
                    .await;
                None
            }
        }
    }

    fn clear(&self, response: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.cookie.clear_cookie(self.name())) {
            response.append(header::SET_COOKIE, value);
        }
    }
}
