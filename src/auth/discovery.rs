//! OpenID Connect discovery.
//!
//! Resolves provider metadata from `{issuer}.well-known/openid-configuration`
//! once at startup and turns it, together with the client registration, into
//! an immutable [`ProviderConfig`].

use indexmap::IndexSet;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::config::ProviderSettings;
use super::error::AuthError;

/// Subset of the discovery document this server relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
}

/// Fully resolved provider endpoints and client registration.
#[derive(Clone)]
pub struct ProviderConfig {
    pub issuer: Url,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    pub logout_endpoint: Url,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub scopes: IndexSet<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("issuer", &self.issuer.as_str())
            .field("authorization_endpoint", &self.authorization_endpoint.as_str())
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("userinfo_endpoint", &self.userinfo_endpoint.as_str())
            .field("logout_endpoint", &self.logout_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Issuer URL for a tenant domain. Bare domains are served over https; a
/// full URL is kept as is. The result always ends with `/`.
pub fn issuer_from_domain(domain: &str) -> Result<Url, AuthError> {
    let domain = domain.trim();
    let mut issuer = if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{}", domain)
    };

    if !issuer.ends_with('/') {
        issuer.push('/');
    }

    Url::parse(&issuer)
        .map_err(|e| AuthError::Discovery(format!("Invalid issuer URL {}: {}", issuer, e)))
}

/// Fetch the discovery document and resolve the provider configuration.
pub async fn discover(
    settings: &ProviderSettings,
    http_client: &reqwest::Client,
) -> Result<ProviderConfig, AuthError> {
    let issuer = issuer_from_domain(&settings.domain)?;
    let discovery_url = issuer
        .join(".well-known/openid-configuration")
        .map_err(|e| AuthError::Discovery(format!("Invalid discovery URL: {}", e)))?;

    debug!(url = %discovery_url, "Fetching OIDC discovery document");

    let response = http_client
        .get(discovery_url.clone())
        .send()
        .await
        .map_err(|e| AuthError::Discovery(format!("Discovery request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(AuthError::Discovery(format!(
            "Discovery request returned status {}",
            response.status()
        )));
    }

    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| AuthError::Discovery(format!("Failed to parse discovery document: {}", e)))?;

    let config = resolve(settings, issuer, document)?;

    info!(
        issuer = %config.issuer,
        authorization_endpoint = %config.authorization_endpoint,
        token_endpoint = %config.token_endpoint,
        "OIDC provider discovered"
    );

    Ok(config)
}

/// Combine a fetched document with the client registration.
pub fn resolve(
    settings: &ProviderSettings,
    issuer: Url,
    document: DiscoveryDocument,
) -> Result<ProviderConfig, AuthError> {
    // Trailing slashes differ between providers; the rest must match exactly
    if document.issuer.trim_end_matches('/') != issuer.as_str().trim_end_matches('/') {
        return Err(AuthError::Discovery(format!(
            "Issuer mismatch: expected {}, got {}",
            issuer, document.issuer
        )));
    }

    let parse = |field: &str, value: &str| {
        Url::parse(value).map_err(|e| AuthError::Discovery(format!("Invalid {}: {}", field, e)))
    };

    let userinfo_endpoint = match document.userinfo_endpoint.as_deref() {
        Some(endpoint) => parse("userinfo_endpoint", endpoint)?,
        None => parse("userinfo_endpoint", &format!("{}userinfo", issuer))?,
    };

    let logout_endpoint = match settings.logout_url.as_deref() {
        Some(endpoint) => parse("logout_url", endpoint)?,
        None => parse("logout_endpoint", &format!("{}v2/logout", issuer))?,
    };

    let redirect_uri = Url::parse(&settings.callback_url).map_err(|e| AuthError::InvalidConfig {
        key: "provider.callback_url".to_string(),
        reason: e.to_string(),
    })?;

    Ok(ProviderConfig {
        authorization_endpoint: parse("authorization_endpoint", &document.authorization_endpoint)?,
        token_endpoint: parse("token_endpoint", &document.token_endpoint)?,
        userinfo_endpoint,
        logout_endpoint,
        issuer,
        client_id: settings.client_id.clone(),
        client_secret: settings.client_secret.clone(),
        redirect_uri,
        scopes: settings.scopes.clone(),
    })
}
