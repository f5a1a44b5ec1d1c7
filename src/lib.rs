use axum::Router;
use axum_server::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub mod auth;
pub mod config;
pub mod error;
pub mod security;
pub mod telemetry;

use auth::{
    AuthManager, AuthState, EncryptedCookieStore, InMemoryStateStore, OidcProvider,
    create_auth_router, discovery, provider,
};
use security::SecurityAuditor;

/// Discover the provider and wire every authentication component together
pub async fn build_auth_state(config: &config::Config) -> anyhow::Result<AuthState> {
    let http_client = provider::http_client(config.http_timeout())?;

    let provider_config = discovery::discover(&config.provider, &http_client).await?;
    let provider = OidcProvider::new(provider_config, http_client);

    let auditor = SecurityAuditor::new();
    let credential_ttl = config.session.credential_ttl();

    let credentials = EncryptedCookieStore::from_secret(
        &config.session.secret,
        config.cookie.clone(),
        credential_ttl,
        auditor.clone(),
    )?;

    let manager = AuthManager::new(
        Arc::new(provider),
        Arc::new(InMemoryStateStore::new(config.session.state_ttl())),
        auditor,
        credential_ttl,
    );

    Ok(AuthState {
        manager: Arc::new(manager),
        credentials: Arc::new(credentials),
        cookie: Arc::new(config.cookie.clone()),
        session_ttl: credential_ttl,
    })
}

/// Router with request tracing
pub fn app_router(state: AuthState) -> Router {
    create_auth_router(state).layer(TraceLayer::new_for_http())
}

/// Periodically drop login states that were never completed
fn spawn_state_cleanup(
    manager: Arc<AuthManager>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = manager.cleanup_expired_states().await;
            if removed > 0 {
                debug!(removed, "Expired OAuth states removed");
            }
        }
    })
}

pub async fn start_server_with_config(
    config: config::Config,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let state = build_auth_state(&config).await?;
    let cleanup = spawn_state_cleanup(Arc::clone(&state.manager), config.session.state_ttl());
    let app = app_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("listening on {}", addr);
    debug!(
        "Server configuration - host: {}, port: {}, callback: {}",
        config.server.host, config.server.port, config.provider.callback_url
    );
    let svc = app.into_make_service();
    let server = Server::bind(addr).serve(svc);

    let result = tokio::select! {
        res = server => res.map_err(anyhow::Error::from),
        _ = &mut shutdown_rx => {
            info!("shutdown requested");
            Ok(())
        }
    };

    cleanup.abort();
    result
}
