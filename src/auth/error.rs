// Authentication Error Types
// Failure taxonomy for the authorization code flow and credential handling

use thiserror::Error;

use crate::error::ErrorCode;
use crate::security::EncryptionError;

#[derive(Debug, Error)]
pub enum AuthError {
    // State and session errors
    #[error("Secure random source unavailable: {0}")]
    EntropySource(String),

    #[error("Invalid OAuth2 state parameter")]
    InvalidState,

    #[error("Missing callback parameter: {0}")]
    MissingParameter(&'static str),

    // Provider errors
    #[error("Provider denied authorization: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("OAuth2 code exchange failed: {0}")]
    TokenExchange(String),

    #[error("Provider returned an unusable token: {0}")]
    InvalidToken(String),

    #[error("Failed to retrieve user info: {0}")]
    ProfileFetch(String),

    #[error("Provider discovery failed: {0}")]
    Discovery(String),

    #[error("Could not build provider logout URL: {0}")]
    LogoutUrl(String),

    // Credential errors
    #[error("Credential cookie could not be read: {0}")]
    Deserialize(String),

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },
}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidState
            | AuthError::MissingParameter(_)
            | AuthError::AuthorizationDenied { .. } => 400,

            AuthError::Deserialize(_) => 401,

            AuthError::TokenExchange(_)
            | AuthError::InvalidToken(_)
            | AuthError::ProfileFetch(_) => 502,

            AuthError::EntropySource(_)
            | AuthError::Discovery(_)
            | AuthError::LogoutUrl(_)
            | AuthError::Encryption(_)
            | AuthError::ConfigError(_)
            | AuthError::InvalidConfig { .. } => 500,
        }
    }

    /// Failures that may indicate tampering (forged state, forged or corrupted
    /// credential cookie). These are audited separately from provider outages.
    pub fn is_security_relevant(&self) -> bool {
        matches!(self, AuthError::InvalidState | AuthError::Deserialize(_))
    }

    /// Short machine-readable code returned to clients in place of details.
    pub fn error_code(&self) -> ErrorCode {
        match self.status_code() {
            400 => ErrorCode::BadRequest,
            401 => ErrorCode::Unauthorized,
            502 => ErrorCode::BadGateway,
            _ => ErrorCode::InternalServerError,
        }
    }

    /// Message safe to show to the browser. Never includes provider responses
    /// or internal error text.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidState => "Login request could not be verified. Please log in again.",
            AuthError::MissingParameter(_) => "Login callback was incomplete. Please log in again.",
            AuthError::AuthorizationDenied { .. } => "Login was cancelled or denied by the provider.",
            AuthError::TokenExchange(_) | AuthError::InvalidToken(_) | AuthError::ProfileFetch(_) => {
                "Could not complete login with the identity provider. Please try again."
            }
            AuthError::Deserialize(_) => "Authentication required",
            AuthError::LogoutUrl(_) => "Could not log out from the identity provider.",
            _ => "Internal authentication error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AuthError::InvalidState.status_code(), 400);
        assert_eq!(AuthError::MissingParameter("code").status_code(), 400);
        assert_eq!(
            AuthError::TokenExchange("invalid_grant".to_string()).status_code(),
            502
        );
        assert_eq!(AuthError::InvalidToken("empty".to_string()).status_code(), 502);
        assert_eq!(AuthError::ProfileFetch("500".to_string()).status_code(), 502);
        assert_eq!(
            AuthError::EntropySource("no device".to_string()).status_code(),
            500
        );
        assert_eq!(AuthError::LogoutUrl("bad host".to_string()).status_code(), 500);
    }

    #[test]
    fn test_security_relevant_errors() {
        assert!(AuthError::InvalidState.is_security_relevant());
        assert!(AuthError::Deserialize("bad tag".to_string()).is_security_relevant());
        assert!(!AuthError::TokenExchange("timeout".to_string()).is_security_relevant());
        assert!(!AuthError::ProfileFetch("refused".to_string()).is_security_relevant());
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = AuthError::TokenExchange("client_secret=hunter2 rejected".to_string());
        assert!(!err.public_message().contains("hunter2"));
        assert!(err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_error_display() {
        let err = AuthError::InvalidConfig {
            key: "session.secret".to_string(),
            reason: "too short".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for session.secret: too short"
        );
    }
}
