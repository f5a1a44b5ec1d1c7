//! Identity provider client
//!
//! The [`IdentityProvider`] trait is the seam between the login flow and the
//! remote authorization server. [`OidcProvider`] implements it over `reqwest`
//! using endpoints resolved by discovery.
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;
use url::Url;

use super::discovery::ProviderConfig;
use super::error::AuthError;

/// OAuth2 token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token for API requests
    pub access_token: String,

    /// Token type (usually "Bearer")
    #[serde(default)]
    pub token_type: String,

    /// Token expiration time in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// ID token (for OpenID Connect providers)
    #[serde(default)]
    pub id_token: Option<String>,

    /// OAuth2 scopes granted
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Reject tokens that cannot be used as a bearer credential
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty access token".to_string()));
        }

        if !self.token_type.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::InvalidToken(format!(
                "unsupported token type '{}'",
                self.token_type
            )));
        }

        if self.expires_in == Some(0) {
            return Err(AuthError::InvalidToken("token already expired".to_string()));
        }

        Ok(())
    }
}

/// Claims returned by the user-info endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    /// Unique user identifier from the provider
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    /// URL to the user's profile picture
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, deserialize_with = "deserialize_updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Best human-readable name for display
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.nickname.as_deref())
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

/// Auth0 sends RFC 3339 text, OIDC core specifies epoch seconds
fn deserialize_updated_at<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(i64),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
        Some(Raw::Seconds(secs)) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("updated_at out of range")),
    }
}

/// Remote authorization server operations used by the login flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to, carrying `state`
    fn authorization_url(&self, state: &str) -> Result<Url, AuthError>;

    /// Exchange an authorization code at the token endpoint
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError>;

    /// Fetch the user profile with a bearer access token
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AuthError>;

    /// Provider-side logout URL returning the browser to `return_to`
    fn logout_url(&self, return_to: &str) -> Result<Url, AuthError>;
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
}

/// OpenID Connect provider reached over HTTPS
pub struct OidcProvider {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl OidcProvider {
    pub fn new(config: ProviderConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }
}

/// HTTP client for provider calls; every request is bounded by `timeout`
pub fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AuthError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorization_url(&self, state: &str) -> Result<Url, AuthError> {
        let scope = self
            .config
            .scopes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        let mut url = self.config.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", state);

        Ok(url)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let token_request = TokenRequest {
            grant_type: "authorization_code",
            code,
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            redirect_uri: self.config.redirect_uri.as_str(),
        };

        let response = self
            .http_client
            .post(self.config.token_endpoint.clone())
            .form(&token_request)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!(
                "Token request failed with status {}: {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AuthError::TokenExchange(format!("Failed to parse token response: {}", e))
        })?;

        debug!(
            token_type = %token.token_type,
            expires_in = ?token.expires_in,
            "Exchanged authorization code"
        );

        Ok(token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AuthError> {
        let response = self
            .http_client
            .get(self.config.userinfo_endpoint.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetch(format!("Userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::ProfileFetch(format!(
                "Userinfo request failed with status {}: {}",
                status, error_text
            )));
        }

        let profile: UserProfile = response
            .json()
            .await
            .map_err(|e| AuthError::ProfileFetch(format!("Failed to parse user info: {}", e)))?;

        if profile.sub.is_empty() {
            return Err(AuthError::ProfileFetch("user info has no subject".to_string()));
        }

        Ok(profile)
    }

    fn logout_url(&self, return_to: &str) -> Result<Url, AuthError> {
        let return_to = Url::parse(return_to)
            .map_err(|e| AuthError::LogoutUrl(format!("Invalid returnTo '{}': {}", return_to, e)))?;

        let mut url = self.config.logout_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("returnTo", return_to.as_str())
            .append_pair("client_id", &self.config.client_id);

        Ok(url)
    }
}
