#![allow(dead_code)]

use authgate::{app_router, build_auth_state, config::Config};
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const CLIENT_ID: &str = "test-client";
pub const SESSION_SECRET: &str = "integration-secret-0123456789abcdef";

/// Fake identity provider serving only the discovery document.
/// Token and userinfo mocks are mounted per test.
pub async fn start_fake_provider() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": format!("{}/", server.uri()),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}/oauth/token", server.uri()),
            "userinfo_endpoint": format!("{}/userinfo", server.uri()),
        })))
        .mount(&server)
        .await;

    server
}

pub fn test_config(provider: &MockServer) -> Config {
    let mut config = Config::default();
    config.server.port = 0;
    config.provider.domain = provider.uri();
    config.provider.client_id = CLIENT_ID.to_string();
    config.provider.client_secret = "test-secret".to_string();
    config.provider.callback_url = "http://localhost:9090/callback".to_string();
    config.session.secret = SESSION_SECRET.to_string();
    config.http.timeout_secs = 5;
    config
}

/// Application wired against the fake provider
pub async fn test_app(provider: &MockServer) -> Router {
    let state = build_auth_state(&test_config(provider))
        .await
        .expect("auth state should build against the fake provider");
    app_router(state)
}

pub fn get(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri).header(header::HOST, "localhost:9090");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect should carry a Location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` pairs of every Set-Cookie header, attributes dropped
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_string())
        .collect()
}

/// Value of a cookie set by the response, if any
pub fn cookie_from(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|pair| {
        pair.strip_prefix(&format!("{}=", name))
            .map(str::to_string)
    })
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
