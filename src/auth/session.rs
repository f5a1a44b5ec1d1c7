// Browser Sessions
// Opaque random session ids carried in an HttpOnly cookie

use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};

use super::error::AuthError;
use super::state::random_token;

/// Length of a base64url-encoded 32 byte token
const TOKEN_LEN: usize = 43;

/// Opaque session identifier
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Result<Self, AuthError> {
        Ok(Self(random_token()?))
    }

    /// Accept only values this server could have issued
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == TOKEN_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short stable digest that identifies the session in logs
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        format!("{:x}", digest)[..16].to_string()
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({})", self.fingerprint())
    }
}

/// The session a request belongs to
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    /// True when the id was minted for this request and the cookie still has to be set
    pub is_new: bool,
}

impl Session {
    /// Session from the request cookie, if it carries a well-formed id
    pub fn existing(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        cookie_value(headers, cookie_name)
            .and_then(|raw| SessionId::parse(&raw))
            .map(|id| Session { id, is_new: false })
    }

    /// Existing session, or a fresh one when the cookie is missing or malformed
    pub fn load_or_create(headers: &HeaderMap, cookie_name: &str) -> Result<Self, AuthError> {
        match Self::existing(headers, cookie_name) {
            Some(session) => Ok(session),
            None => Ok(Session {
                id: SessionId::generate()?,
                is_new: true,
            }),
        }
    }

    pub fn fingerprint(&self) -> String {
        self.id.fingerprint()
    }
}

/// Value of the named cookie across all `Cookie` headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| value.to_string())
}
