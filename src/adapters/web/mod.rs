//! Web server adapter.
//!
//! JSON API over axum. Sessions live in memory behind a signed cookie;
//! axum-login guards everything under `/api`.

mod auth;
mod dto;
mod error;
mod handlers;

pub use auth::{AuthSession, Backend, SessionUser};
pub use dto::*;
pub use error::WebError;

use axum::{
    Router,
    routing::{get, post},
};
use axum_login::{AuthManagerLayerBuilder, login_required};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::Key;
use tower_sessions::{Expiry, MemoryStore as SessionStore, SessionManagerLayer};

use crate::domain::error::MarketError;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::StorePort;

pub struct AppState {
    pub store: Arc<dyn StorePort + Send + Sync>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
}

/// Cookie signing key from `[auth] session_secret` (128 hex chars).
/// Without one, a fresh key is generated and sessions end with the process.
fn session_key(config: &dyn ConfigPort) -> Result<Key, MarketError> {
    let Some(secret) = config.get_string("auth", "session_secret") else {
        tracing::warn!("no [auth] session_secret configured, using a random key");
        return Ok(Key::generate());
    };
    let invalid = |reason: String| MarketError::ConfigInvalid {
        section: "auth".into(),
        key: "session_secret".into(),
        reason,
    };
    let bytes = hex::decode(secret.trim()).map_err(|e| invalid(e.to_string()))?;
    Key::try_from(bytes.as_slice()).map_err(|_| {
        invalid(format!(
            "expected at least 64 bytes (128 hex chars), got {}",
            bytes.len()
        ))
    })
}

pub fn build_router(state: AppState) -> Result<Router, MarketError> {
    let key = session_key(state.config.as_ref())?;
    let lifetime = state.config.get_positive("auth", "session_lifetime", 86_400)?;
    let secure = state.config.get_bool("web", "secure_cookie", false)?;

    let session_layer = SessionManagerLayer::new(SessionStore::default())
        .with_secure(secure)
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(lifetime)))
        .with_signed(key);
    let backend = Backend::new(Arc::clone(&state.store));
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let api = Router::new()
        .route("/api/team", get(handlers::get_team))
        .route("/api/team/create", post(handlers::create_team))
        .route("/api/players/available", get(handlers::available_players))
        .route("/api/transfers", get(handlers::search_transfers))
        .route("/api/transfers/list", post(handlers::list_transfer))
        .route("/api/transfers/remove", post(handlers::remove_transfer))
        .route("/api/transfers/buy", post(handlers::buy_transfer))
        .route_layer(login_required!(Backend));

    Ok(Router::new()
        .merge(api)
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state)))
}

/// Bind `listen` and serve until the process is stopped.
pub async fn serve(state: AppState, listen: &str) -> Result<(), MarketError> {
    let router = build_router(state)?;
    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(address = %listen, "web server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

/// Run a store call on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, MarketError>
where
    F: FnOnce() -> Result<T, MarketError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MarketError::Internal {
            reason: format!("blocking task failed: {e}"),
        })?
}
