//! Authentication Manager
//!
//! Orchestrates the authorization code flow: state issuance on login, state
//! verification and code exchange on callback, and session teardown on logout.
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::credential::Credential;
use super::error::AuthError;
use super::provider::IdentityProvider;
use super::session::Session;
use super::state::{StateGenerator, StateStore, generate_state};
use crate::security::SecurityAuditor;

/// Query parameters the provider appends to the redirect URI
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Central authentication manager
pub struct AuthManager {
    provider: Arc<dyn IdentityProvider>,
    states: Arc<dyn StateStore>,
    auditor: SecurityAuditor,
    credential_ttl: Duration,
    generate_state: StateGenerator,
}

impl AuthManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        states: Arc<dyn StateStore>,
        auditor: SecurityAuditor,
        credential_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            states,
            auditor,
            credential_ttl,
            generate_state,
        }
    }

    /// Replace the source of state values
    pub fn with_state_generator(mut self, generator: StateGenerator) -> Self {
        self.generate_state = generator;
        self
    }

    /// Issue a fresh state for `session` and build the authorization URL.
    ///
    /// Any state previously pending for the session is replaced.
    pub async fn start_login(&self, session: &Session) -> Result<Url, AuthError> {
        let state = (self.generate_state)()?;
        let auth_url = self.provider.authorization_url(&state)?;

        self.states.put(&session.id, state).await;
        self.auditor.log_auth_attempt(session.fingerprint()).await;

        Ok(auth_url)
    }

    /// Complete the flow for `session`.
    ///
    /// The pending state is consumed before anything else is looked at, so a
    /// failed callback can never be retried with the same state.
    pub async fn handle_callback(
        &self,
        session: &Session,
        params: CallbackParams,
    ) -> Result<Credential, AuthError> {
        let candidate = params.state.as_deref().unwrap_or_default();
        if !self.states.take_and_verify(&session.id, candidate).await {
            let mut details = HashMap::new();
            details.insert("new_session".to_string(), session.is_new.to_string());
            details.insert(
                "state_present".to_string(),
                params.state.is_some().to_string(),
            );
            self.auditor
                .log_suspicious_activity(Some(session.fingerprint()), "oauth_state_mismatch", details)
                .await;
            return Err(AuthError::InvalidState);
        }

        if let Some(error) = params.error {
            let err = AuthError::AuthorizationDenied {
                error,
                description: params.error_description,
            };
            self.auditor
                .log_auth_failure(session.fingerprint(), err.to_string())
                .await;
            return Err(err);
        }

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingParameter("code"))?;

        match self.complete(&code).await {
            Ok(credential) => {
                self.auditor
                    .log_auth_success(credential.profile.sub.clone(), session.fingerprint())
                    .await;
                Ok(credential)
            }
            Err(err) => {
                self.auditor
                    .log_auth_failure(session.fingerprint(), err.to_string())
                    .await;
                Err(err)
            }
        }
    }

    /// A callback whose query could not be read still burns the pending
    /// state, so it cannot be completed by a later, well-formed request.
    pub async fn reject_callback(&self, session: &Session, reason: &str) -> AuthError {
        self.states.discard(&session.id).await;

        let mut details = HashMap::new();
        details.insert("new_session".to_string(), session.is_new.to_string());
        details.insert("malformed_query".to_string(), reason.to_string());
        self.auditor
            .log_suspicious_activity(Some(session.fingerprint()), "oauth_state_mismatch", details)
            .await;

        AuthError::InvalidState
    }

    async fn complete(&self, code: &str) -> Result<Credential, AuthError> {
        let token = self.provider.exchange_code(code).await?;
        token.validate()?;

        let profile = self.provider.fetch_profile(&token.access_token).await?;

        Ok(Credential::new(&token, profile, self.credential_ttl))
    }

    /// Drop server-side state held for `session`
    pub async fn end_session(&self, session: &Session, user_id: Option<String>) {
        self.states.discard(&session.id).await;
        self.auditor
            .log_logout(user_id, Some(session.fingerprint()))
            .await;
    }

    /// Provider logout URL returning the browser to `return_to`
    pub fn logout_url(&self, return_to: &str) -> Result<Url, AuthError> {
        self.provider.logout_url(return_to)
    }

    /// Sweep expired pending states
    pub async fn cleanup_expired_states(&self) -> usize {
        self.states.cleanup_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{MockIdentityProvider, TokenResponse, UserProfile};
    use crate::auth::session::SessionId;
    use crate::auth::state::InMemoryStateStore;

    fn session() -> Session {
        Session {
            id: SessionId::generate().unwrap(),
            is_new: false,
        }
    }

    fn bearer_token() -> TokenResponse {
        TokenResponse {
            access_token: "at-1".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: Some(86400),
            id_token: None,
            scope: None,
        }
    }

    fn profile() -> UserProfile {
        UserProfile {
            sub: "auth0|42".to_string(),
            ..Default::default()
        }
    }

    fn mock_with_authorize() -> MockIdentityProvider {
        let mut provider = MockIdentityProvider::new();
        provider.expect_authorization_url().returning(|state| {
            Ok(Url::parse(&format!("https://idp.example.com/authorize?state={}", state)).unwrap())
        });
        provider
    }

    fn manager(provider: MockIdentityProvider) -> AuthManager {
        AuthManager::new(
            Arc::new(provider),
            Arc::new(InMemoryStateStore::new(Duration::from_secs(600))),
            SecurityAuditor::new(),
            Duration::from_secs(3600),
        )
    }

    fn state_of(url: &Url) -> String {
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_flow_produces_credential() {
        let mut provider = mock_with_authorize();
        provider
            .expect_exchange_code()
            .withf(|code| code == "good-code")
            .times(1)
            .returning(|_| Ok(bearer_token()));
        provider
            .expect_fetch_profile()
            .withf(|token| token == "at-1")
            .times(1)
            .returning(|_| Ok(profile()));
        let manager = manager(provider);
        let session = session();

        let url = manager.start_login(&session).await.unwrap();
        let credential = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    state: Some(state_of(&url)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(credential.access_token, "at-1");
        assert_eq!(credential.profile.sub, "auth0|42");
        // Capped by the configured credential lifetime
        assert!(credential.remaining() <= Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_state_mismatch_never_exchanges() {
        let mut provider = mock_with_authorize();
        provider.expect_exchange_code().never();
        provider.expect_fetch_profile().never();
        let manager = manager(provider);
        let session = session();

        manager.start_login(&session).await.unwrap();
        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    state: Some("forged".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_missing_state_is_mismatch() {
        let mut provider = mock_with_authorize();
        provider.expect_exchange_code().never();
        let manager = manager(provider);
        let session = session();

        manager.start_login(&session).await.unwrap();
        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_state_from_other_session_rejected() {
        let mut provider = mock_with_authorize();
        provider.expect_exchange_code().never();
        let manager = manager(provider);
        let victim = session();
        let attacker = session();

        let url = manager.start_login(&attacker).await.unwrap();
        let result = manager
            .handle_callback(
                &victim,
                CallbackParams {
                    code: Some("attacker-code".to_string()),
                    state: Some(state_of(&url)),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_provider_error_reported() {
        let mut provider = mock_with_authorize();
        provider.expect_exchange_code().never();
        let manager = manager(provider);
        let session = session();

        let url = manager.start_login(&session).await.unwrap();
        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    state: Some(state_of(&url)),
                    error: Some("access_denied".to_string()),
                    error_description: Some("User cancelled".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(AuthError::AuthorizationDenied { error, .. }) if error == "access_denied"
        ));
    }

    #[tokio::test]
    async fn test_missing_code() {
        let manager = manager(mock_with_authorize());
        let session = session();

        let url = manager.start_login(&session).await.unwrap();
        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    state: Some(state_of(&url)),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::MissingParameter("code"))));
    }

    #[tokio::test]
    async fn test_invalid_token_skips_profile() {
        let mut provider = mock_with_authorize();
        provider.expect_exchange_code().returning(|_| {
            Ok(TokenResponse {
                access_token: String::new(),
                ..bearer_token()
            })
        });
        provider.expect_fetch_profile().never();
        let manager = manager(provider);
        let session = session();

        let url = manager.start_login(&session).await.unwrap();
        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    state: Some(state_of(&url)),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_profile_failure_yields_no_credential() {
        let mut provider = mock_with_authorize();
        provider
            .expect_exchange_code()
            .returning(|_| Ok(bearer_token()));
        provider
            .expect_fetch_profile()
            .returning(|_| Err(AuthError::ProfileFetch("status 500".to_string())));
        let manager = manager(provider);
        let session = session();

        let url = manager.start_login(&session).await.unwrap();
        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    state: Some(state_of(&url)),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::ProfileFetch(_))));
    }

    #[tokio::test]
    async fn test_relogin_replaces_pending_state() {
        let manager = manager(mock_with_authorize());
        let session = session();

        let first = manager.start_login(&session).await.unwrap();
        let _second = manager.start_login(&session).await.unwrap();

        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    state: Some(state_of(&first)),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_end_session_discards_pending_state() {
        let mut provider = mock_with_authorize();
        provider.expect_exchange_code().never();
        let manager = manager(provider);
        let session = session();

        let url = manager.start_login(&session).await.unwrap();
        manager.end_session(&session, None).await;

        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    state: Some(state_of(&url)),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
    }

    fn failing_entropy() -> Result<String, AuthError> {
        Err(AuthError::EntropySource("no entropy available".to_string()))
    }

    #[tokio::test]
    async fn test_entropy_failure_stores_nothing() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_authorization_url().never();
        let states = Arc::new(InMemoryStateStore::new(Duration::from_secs(600)));
        let manager = AuthManager::new(
            Arc::new(provider),
            states.clone(),
            SecurityAuditor::new(),
            Duration::from_secs(3600),
        )
        .with_state_generator(failing_entropy);

        let result = manager.start_login(&session()).await;

        assert!(matches!(result, Err(AuthError::EntropySource(_))));
        assert!(states.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejected_callback_burns_pending_state() {
        let mut provider = mock_with_authorize();
        provider.expect_exchange_code().never();
        let manager = manager(provider);
        let session = session();

        let url = manager.start_login(&session).await.unwrap();
        let err = manager
            .reject_callback(&session, "duplicate field `state`")
            .await;
        assert!(matches!(err, AuthError::InvalidState));

        let result = manager
            .handle_callback(
                &session,
                CallbackParams {
                    code: Some("good-code".to_string()),
                    state: Some(state_of(&url)),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
    }
}
