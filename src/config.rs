use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::AuthError;
use crate::auth::config::{self as auth_config, CookieConfig, ProviderSettings, SessionConfig};

/// Environment variables understood for compatibility with Auth0 quickstarts
const AUTH0_ENV: [(&str, &str); 4] = [
    ("AUTH0_DOMAIN", "provider.domain"),
    ("AUTH0_CLIENT_ID", "provider.client_id"),
    ("AUTH0_CLIENT_SECRET", "provider.client_secret"),
    ("AUTH0_CALLBACK_URL", "provider.callback_url"),
];

/// Configuration for the authgate server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub cookie: CookieConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9090,
        }
    }
}

/// Outbound calls to the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Layered sources: defaults, optional TOML file, `AUTHGATE_*` variables
    /// (`__` separates sections), then the `AUTH0_*` variables.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        let auth0_keys: Vec<&str> = AUTH0_ENV.iter().map(|(var, _)| *var).collect();

        figment
            .merge(Env::prefixed("AUTHGATE_").split("__"))
            .merge(Env::raw().only(&auth0_keys).map(|key| {
                AUTH0_ENV
                    .iter()
                    .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
                    .map(|(_, dotted)| *dotted)
                    .unwrap_or_else(|| key.as_str())
                    .into()
            }))
    }

    /// Load and validate configuration
    pub fn load(path: Option<&Path>) -> Result<Self, AuthError> {
        let config: Config = Self::figment(path)
            .extract()
            .map_err(|e| AuthError::ConfigError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        auth_config::validate(&self.provider, &self.cookie, &self.session)?;

        if self.http.timeout_secs == 0 {
            return Err(AuthError::InvalidConfig {
                key: "http.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
