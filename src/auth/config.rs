// Authentication Configuration
// Identity provider settings, cookie attributes and session lifetimes

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::AuthError;

/// Identity provider registration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Tenant domain (`example.eu.auth0.com`) or a full issuer URL
    pub domain: String,

    /// OAuth2 client ID
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Redirect URI registered with the provider, pointing at `/callback`
    pub callback_url: String,

    /// OAuth2 scopes, sent in insertion order
    #[serde(default = "default_scopes")]
    pub scopes: IndexSet<String>,

    /// Overrides the provider logout endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
}

impl ProviderSettings {
    fn validate(&self) -> Result<(), AuthError> {
        let required = [
            ("provider.domain", &self.domain),
            ("provider.client_id", &self.client_id),
            ("provider.client_secret", &self.client_secret),
            ("provider.callback_url", &self.callback_url),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(AuthError::InvalidConfig {
                    key: key.to_string(),
                    reason: "cannot be empty".to_string(),
                });
            }
        }

        // Validate redirect URI format
        if !self.callback_url.starts_with("http://") && !self.callback_url.starts_with("https://") {
            return Err(AuthError::InvalidConfig {
                key: "provider.callback_url".to_string(),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        if !self.scopes.contains("openid") {
            return Err(AuthError::InvalidConfig {
                key: "provider.scopes".to_string(),
                reason: "must include openid".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            domain: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            callback_url: "http://localhost:9090/callback".to_string(),
            scopes: default_scopes(),
            logout_url: None,
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .field("scopes", &self.scopes)
            .field("logout_url", &self.logout_url)
            .finish()
    }
}

/// Cookie attributes shared by the session and credential cookies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Name of the cookie carrying the opaque session id
    #[serde(default = "default_session_cookie")]
    pub session_name: String,

    /// Name of the cookie carrying the sealed credential
    #[serde(default = "default_credential_cookie")]
    pub credential_name: String,

    /// Cookie domain (None = current domain)
    pub domain: Option<String>,

    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub path: String,

    /// Secure flag (HTTPS only) - should be true in production
    #[serde(default)]
    pub secure: bool,

    /// SameSite policy
    #[serde(default = "default_same_site")]
    pub same_site: SameSitePolicy,
}

impl CookieConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.session_name.is_empty() || self.credential_name.is_empty() {
            return Err(AuthError::InvalidConfig {
                key: "cookie.session_name".to_string(),
                reason: "cookie names cannot be empty".to_string(),
            });
        }

        if self.session_name == self.credential_name {
            return Err(AuthError::InvalidConfig {
                key: "cookie.credential_name".to_string(),
                reason: "must differ from cookie.session_name".to_string(),
            });
        }

        // Browsers drop SameSite=None cookies without Secure
        if self.same_site == SameSitePolicy::None && !self.secure {
            return Err(AuthError::InvalidConfig {
                key: "cookie.same_site".to_string(),
                reason: "none requires cookie.secure = true".to_string(),
            });
        }

        Ok(())
    }

    /// `Set-Cookie` value for `name=value` living `max_age`
    pub fn set_cookie(&self, name: &str, value: &str, max_age: Duration) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; HttpOnly; SameSite={}; Max-Age={}",
            name,
            value,
            self.path,
            self.same_site.as_str(),
            max_age.as_secs()
        );

        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }

        if self.secure {
            cookie.push_str("; Secure");
        }

        cookie
    }

    /// `Set-Cookie` value that makes the browser drop `name`
    pub fn clear_cookie(&self, name: &str) -> String {
        self.set_cookie(name, "", Duration::ZERO)
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            session_name: default_session_cookie(),
            credential_name: default_credential_cookie(),
            domain: None,
            path: default_cookie_path(),
            secure: false, // Development default
            same_site: SameSitePolicy::Lax,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl SameSitePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSitePolicy::Strict => "Strict",
            SameSitePolicy::Lax => "Lax",
            SameSitePolicy::None => "None",
        }
    }
}

/// Session secret and lifetimes
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Secret the cookie encryption key is derived from (minimum 32 characters)
    pub secret: String,

    /// How long a pending login state stays valid
    #[serde(default = "default_state_ttl")]
    pub state_ttl_secs: u64,

    /// Upper bound on credential lifetime
    #[serde(default = "default_credential_ttl")]
    pub credential_ttl_secs: u64,
}

impl SessionConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.secret.len() < 32 {
            return Err(AuthError::InvalidConfig {
                key: "session.secret".to_string(),
                reason: "must be at least 32 characters".to_string(),
            });
        }

        if self.state_ttl_secs == 0 {
            return Err(AuthError::InvalidConfig {
                key: "session.state_ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.credential_ttl_secs < 60 {
            return Err(AuthError::InvalidConfig {
                key: "session.credential_ttl_secs".to_string(),
                reason: "must be at least 60 seconds".to_string(),
            });
        }

        if self.credential_ttl_secs > 86400 * 7 {
            return Err(AuthError::InvalidConfig {
                key: "session.credential_ttl_secs".to_string(),
                reason: "must not exceed 7 days".to_string(),
            });
        }

        Ok(())
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(), // Must be set explicitly
            state_ttl_secs: default_state_ttl(),
            credential_ttl_secs: default_credential_ttl(),
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"[REDACTED]")
            .field("state_ttl_secs", &self.state_ttl_secs)
            .field("credential_ttl_secs", &self.credential_ttl_secs)
            .finish()
    }
}

/// Validate every auth-related section together
pub fn validate(
    provider: &ProviderSettings,
    cookie: &CookieConfig,
    session: &SessionConfig,
) -> Result<(), AuthError> {
    provider.validate()?;
    cookie.validate()?;
    session.validate()
}

// Default value functions
fn default_scopes() -> IndexSet<String> {
    ["openid", "profile", "email"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_session_cookie() -> String {
    "auth_session".to_string()
}

fn default_credential_cookie() -> String {
    "auth_credential".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_same_site() -> SameSitePolicy {
    SameSitePolicy::Lax
}

fn default_state_ttl() -> u64 {
    600 // 10 minutes
}

fn default_credential_ttl() -> u64 {
    3600 // 1 hour
}
