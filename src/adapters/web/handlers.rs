//! HTTP request handlers for web adapter.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use crate::domain::catalog;
use crate::domain::error::MarketError;
use crate::domain::identity::{self, Credentials};
use crate::domain::lifecycle;
use crate::domain::market;
use crate::domain::player::PlayerId;
use crate::domain::user::UserId;

use super::dto::*;
use super::{AppState, AuthSession, Backend, WebError, blocking};

type ApiResult<T> = Result<Json<T>, WebError>;

fn auth_err(err: axum_login::Error<Backend>) -> WebError {
    match err {
        axum_login::Error::Backend(e) => e.into(),
        axum_login::Error::Session(e) => MarketError::Internal {
            reason: format!("session: {e}"),
        }
        .into(),
    }
}

fn current_user(auth_session: &AuthSession) -> Result<UserId, WebError> {
    auth_session
        .user
        .as_ref()
        .map(|u| u.user.id)
        .ok_or_else(|| WebError::unauthorized("login required"))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn not_found() -> WebError {
    WebError::not_found("no such route")
}

/// Log in, registering unknown emails, and make sure the user has a team.
pub async fn login(
    mut auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<PrincipalDto> {
    let creds = Credentials {
        email: req.email,
        password: req.password,
    };
    let user = match auth_session.authenticate(creds).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(WebError::unauthorized("invalid email or password")),
        Err(e) => return Err(auth_err(e)),
    };
    auth_session.login(&user).await.map_err(auth_err)?;

    let store = Arc::clone(&state.store);
    let principal = blocking(move || {
        let user = user.user;
        if let Err(e) = lifecycle::ensure_team(store.as_ref(), user.id, &mut rand::thread_rng()) {
            tracing::warn!(user_id = %user.id, error = %e, "default team creation failed");
        }
        identity::principal(store.as_ref(), &user)
    })
    .await?;

    Ok(Json(principal.into()))
}

pub async fn logout(mut auth_session: AuthSession) -> Result<StatusCode, WebError> {
    auth_session.logout().await.map_err(auth_err)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_team(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
) -> ApiResult<TeamDto> {
    let user_id = current_user(&auth_session)?;
    let store = Arc::clone(&state.store);
    let squad = blocking(move || catalog::get_team_for_user(store.as_ref(), user_id))
        .await?
        .ok_or_else(|| MarketError::not_found("team"))?;
    Ok(Json(TeamDto::from(&squad)))
}

pub async fn create_team(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<TeamDto> {
    let user_id = current_user(&auth_session)?;
    let store = Arc::clone(&state.store);
    let ids = req.players.into_iter().map(PlayerId).collect();
    let mut squad = blocking(move || {
        lifecycle::create_team_from_selection(store.as_ref(), user_id, ids, &mut rand::thread_rng())
    })
    .await?;
    catalog::sort_by_position(&mut squad.players);
    Ok(Json(TeamDto::from(&squad)))
}

pub async fn available_players(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<PlayerDto>> {
    let store = Arc::clone(&state.store);
    let players = blocking(move || catalog::list_unassigned_players(store.as_ref())).await?;
    Ok(Json(players.iter().map(PlayerDto::from).collect()))
}

pub async fn search_transfers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransferQuery>,
) -> ApiResult<Vec<ListingDto>> {
    let query = query.into_market_query()?;
    let store = Arc::clone(&state.store);
    let listings = blocking(move || catalog::list_market_players(store.as_ref(), &query)).await?;
    Ok(Json(listings.iter().map(ListingDto::from).collect()))
}

pub async fn list_transfer(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ListRequest>,
) -> ApiResult<PlayerDto> {
    let user_id = current_user(&auth_session)?;
    let store = Arc::clone(&state.store);
    let player = blocking(move || {
        market::list_player(store.as_ref(), PlayerId(req.player_id), req.asking_price, user_id)
    })
    .await?;
    Ok(Json(PlayerDto::from(&player)))
}

pub async fn remove_transfer(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult<PlayerDto> {
    let user_id = current_user(&auth_session)?;
    let store = Arc::clone(&state.store);
    let player = blocking(move || {
        market::unlist_player(store.as_ref(), PlayerId(req.player_id), user_id)
    })
    .await?;
    Ok(Json(PlayerDto::from(&player)))
}

pub async fn buy_transfer(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult<PurchaseDto> {
    let user_id = current_user(&auth_session)?;
    let store = Arc::clone(&state.store);
    let purchase = blocking(move || {
        market::buy_player(store.as_ref(), PlayerId(req.player_id), user_id)
    })
    .await?;
    Ok(Json(PurchaseDto::from(&purchase)))
}
