//! Authentication Middleware
//!
//! Route guard that only lets requests carrying a valid credential reach the
//! wrapped handler, injecting the credential into request extensions.
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use super::credential::Credential;
use super::routes::AuthState;

/// Where unauthenticated browsers are sent
pub const LOGIN_REDIRECT: &str = "/";

/// Credential of the user behind a guarded request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Credential);

/// Require a valid, unexpired credential; otherwise redirect to the home page
/// without running the handler.
pub async fn require_authentication(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.credentials.load(req.headers()).await {
        Some(credential) => {
            req.extensions_mut().insert(AuthenticatedUser(credential));
            next.run(req).await
        }
        None => {
            debug!(path = %req.uri().path(), "Unauthenticated request redirected");
            Redirect::temporary(LOGIN_REDIRECT).into_response()
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| Redirect::temporary(LOGIN_REDIRECT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::CookieConfig;
    use crate::auth::credential::{CredentialStore, EncryptedCookieStore};
    use crate::auth::manager::AuthManager;
    use crate::auth::provider::{MockIdentityProvider, TokenResponse, UserProfile};
    use crate::auth::state::InMemoryStateStore;
    use crate::security::{DataEncryption, SecurityAuditor};
    use axum::{
        Router,
        body::Body,
        http::{HeaderMap, HeaderValue, Request, StatusCode, header},
        middleware,
        routing::get,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    fn auth_state() -> AuthState {
        let key: [u8; 32] = rand::random();
        let cookie = CookieConfig::default();
        let credentials = EncryptedCookieStore::new(
            DataEncryption::new(&key),
            cookie.clone(),
            Duration::from_secs(3600),
            SecurityAuditor::new(),
        );
        let manager = AuthManager::new(
            Arc::new(MockIdentityProvider::new()),
            Arc::new(InMemoryStateStore::new(Duration::from_secs(600))),
            SecurityAuditor::new(),
            Duration::from_secs(3600),
        );

        AuthState {
            manager: Arc::new(manager),
            credentials: Arc::new(credentials),
            cookie: Arc::new(cookie),
            session_ttl: Duration::from_secs(3600),
        }
    }

    fn guarded(state: AuthState, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/profile",
                get(move |AuthenticatedUser(credential): AuthenticatedUser| {
                    let hits = Arc::clone(&hits);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        credential.profile.sub
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_authentication,
            ))
            .with_state(state)
    }

    async fn cookie_for(state: &AuthState, expires_in: Option<u64>) -> String {
        let token = TokenResponse {
            access_token: "at-1".to_string(),
            token_type: "Bearer".to_string(),
            expires_in,
            id_token: None,
            scope: None,
        };
        let profile = UserProfile {
            sub: "auth0|42".to_string(),
            ..Default::default()
        };
        let credential = Credential::new(&token, profile, Duration::from_secs(3600));

        let mut headers = HeaderMap::new();
        state.credentials.store(&mut headers, &credential).await.unwrap();
        let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_missing_credential_redirects_without_running_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = guarded(auth_state(), Arc::clone(&hits));

        let response = app
            .oneshot(Request::get("/profile").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_credential_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let state = auth_state();
        let cookie = cookie_for(&state, Some(3600)).await;
        let app = guarded(state, Arc::clone(&hits));

        let response = app
            .oneshot(
                Request::get("/profile")
                    .header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_garbage_credential_redirects() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = guarded(auth_state(), Arc::clone(&hits));

        let response = app
            .oneshot(
                Request::get("/profile")
                    .header(header::COOKIE, "auth_credential=not-a-real-credential")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
