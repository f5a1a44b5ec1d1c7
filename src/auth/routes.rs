//! Authentication Routes
//!
//! HTTP handlers for the login flow (`/login`, `/callback`, `/logout`), the
//! guarded `/profile` page, and the public `/` and `/ping` endpoints.
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, header},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::config::CookieConfig;
use super::credential::CredentialStore;
use super::error::AuthError;
use super::manager::{AuthManager, CallbackParams};
use super::middleware::{AuthenticatedUser, require_authentication};
use super::session::Session;
use crate::error::ErrorResponse;
use crate::security::SECURITY_TARGET;

/// Where the browser lands after a successful login
pub const PROFILE_PATH: &str = "/profile";

/// Shared state for all authentication routes
#[derive(Clone)]
pub struct AuthState {
    pub manager: Arc<AuthManager>,
    pub credentials: Arc<dyn CredentialStore>,
    pub cookie: Arc<CookieConfig>,
    /// Max-Age of the session cookie
    pub session_ttl: Duration,
}

/// Log an authentication failure and turn it into a client-safe response
fn error_response(err: AuthError, path: &str) -> Response {
    if err.is_security_relevant() {
        warn!(target: SECURITY_TARGET, path, error = %err, "Authentication request rejected");
    } else if err.status_code() >= 500 {
        error!(path, error = %err, "Authentication request failed");
    } else {
        warn!(path, error = %err, "Authentication request rejected");
    }

    ErrorResponse::from_auth_error(&err, path).into_response()
}

fn append_cookie(headers: &mut HeaderMap, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => error!("Invalid Set-Cookie header: {}", e),
    }
}

/// `{scheme}://{host}` of the request, used as the post-logout landing page
fn request_origin(headers: &HeaderMap) -> Result<String, AuthError> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| AuthError::LogoutUrl("request has no Host header".to_string()))?;

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| s == "http" || s == "https")
        .unwrap_or_else(|| "http".to_string());

    Ok(format!("{}://{}", scheme, host))
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
</head>
<body>
    <main>
{}
    </main>
</body>
</html>"#,
        encode_text(title),
        body
    ))
}

/// Home page with a login link, or profile and logout links once signed in
async fn home(State(state): State<AuthState>, headers: HeaderMap) -> Html<String> {
    let body = match state.credentials.load(&headers).await {
        Some(credential) => format!(
            r#"        <h1>Welcome back, {}</h1>
        <p><a href="/profile">View profile</a> | <a href="/logout">Sign out</a></p>"#,
            encode_text(credential.profile.display_name())
        ),
        None => r#"        <h1>Welcome</h1>
        <p><a href="/login">Sign in</a></p>"#
            .to_string(),
    };

    page("Home", &body)
}

/// Liveness check
async fn ping() -> Json<&'static str> {
    Json("pong")
}

/// Start the login flow - redirects to the provider
async fn start_login(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let session = match Session::load_or_create(&headers, &state.cookie.session_name) {
        Ok(session) => session,
        Err(e) => return error_response(e, "/login"),
    };

    let auth_url = match state.manager.start_login(&session).await {
        Ok(url) => url,
        Err(e) => return error_response(e, "/login"),
    };

    let mut response = Redirect::temporary(auth_url.as_str()).into_response();
    if session.is_new {
        let cookie = state.cookie.set_cookie(
            &state.cookie.session_name,
            session.id.as_str(),
            state.session_ttl,
        );
        append_cookie(response.headers_mut(), &cookie);
    }

    response
}

/// Handle the provider redirect back to us
async fn oauth_callback(
    State(state): State<AuthState>,
    query: Result<Query<CallbackParams>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    // Without a session cookie no state can match; a throwaway session makes that explicit
    let session = match Session::load_or_create(&headers, &state.cookie.session_name) {
        Ok(session) => session,
        Err(e) => return error_response(e, "/callback"),
    };

    let params = match query {
        Ok(Query(params)) => params,
        Err(rejection) => {
            let err = state
                .manager
                .reject_callback(&session, &rejection.body_text())
                .await;
            return error_response(err, "/callback");
        }
    };

    let credential = match state.manager.handle_callback(&session, params).await {
        Ok(credential) => credential,
        Err(e) => return error_response(e, "/callback"),
    };

    let mut response = Redirect::temporary(PROFILE_PATH).into_response();
    if let Err(e) = state
        .credentials
        .store(response.headers_mut(), &credential)
        .await
    {
        return error_response(e, "/callback");
    }

    info!(sub = %credential.profile.sub, "User logged in");
    response
}

/// Clear local credentials, then send the browser through provider logout
async fn logout(State(state): State<AuthState>, headers: HeaderMap) -> Response {
    let mut cleared = HeaderMap::new();
    state.credentials.clear(&mut cleared);
    append_cookie(
        &mut cleared,
        &state.cookie.clear_cookie(&state.cookie.session_name),
    );

    let user_id = state
        .credentials
        .load(&headers)
        .await
        .map(|credential| credential.profile.sub);

    if let Some(session) = Session::existing(&headers, &state.cookie.session_name) {
        state.manager.end_session(&session, user_id).await;
    }

    let mut response = match request_origin(&headers)
        .and_then(|return_to| state.manager.logout_url(&return_to))
    {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(e) => error_response(e, "/logout"),
    };

    // Cookies are cleared whether or not the provider URL could be built
    for value in cleared.get_all(header::SET_COOKIE) {
        response
            .headers_mut()
            .append(header::SET_COOKIE, value.clone());
    }

    response
}

/// Protected profile page
async fn profile(AuthenticatedUser(credential): AuthenticatedUser) -> Html<String> {
    let user = &credential.profile;

    let mut body = format!(
        "        <h1>{}</h1>\n",
        encode_text(user.display_name())
    );

    if let Some(picture) = &user.picture {
        body.push_str(&format!(
            "        <img src=\"{}\" alt=\"Profile picture\" width=\"96\" height=\"96\">\n",
            encode_double_quoted_attribute(picture)
        ));
    }

    body.push_str("        <dl>\n");
    let fields = [
        ("Subject", Some(user.sub.as_str())),
        ("Nickname", user.nickname.as_deref()),
        ("Given name", user.given_name.as_deref()),
        ("Family name", user.family_name.as_deref()),
        ("Email", user.email.as_deref()),
        ("Locale", user.locale.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            body.push_str(&format!(
                "            <dt>{}</dt><dd>{}</dd>\n",
                label,
                encode_text(value)
            ));
        }
    }
    body.push_str(&format!(
        "            <dt>Email verified</dt><dd>{}</dd>\n",
        if user.email_verified { "yes" } else { "no" }
    ));
    if let Some(updated_at) = user.updated_at {
        body.push_str(&format!(
            "            <dt>Updated</dt><dd>{}</dd>\n",
            updated_at.to_rfc3339()
        ));
    }
    body.push_str(&format!(
        "            <dt>Session expires</dt><dd>{}</dd>\n",
        credential.expires_at.to_rfc3339()
    ));
    body.push_str("        </dl>\n        <p><a href=\"/logout\">Sign out</a></p>");

    page("Profile", &body)
}

/// Create authentication router with all routes
pub fn create_auth_router(state: AuthState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ping", get(ping))
        .route("/login", get(start_login))
        .route("/callback", get(oauth_callback))
        .route("/logout", get(logout))
        .route(
            PROFILE_PATH,
            get(profile).route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_authentication,
            )),
        )
        .with_state(state)
}
