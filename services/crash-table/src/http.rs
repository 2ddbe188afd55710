//! HTTP front end.
//!
//! Stands in for a chat front end: every command maps onto one [`Round`] call and answers
//! with a [`Reply`]. Rejections are replies, not HTTP errors.

use axum::extract::{Path, State as AxumState};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use crash_types::ChannelKey;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{EngineError, Reply};
use crate::registry::RoundRegistry;
use crate::round::{ChannelSettings, Round};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoundRegistry>,
    /// Start balance used when setup does not name one.
    pub start_balance: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/channels/:guild/:channel/setup", post(setup))
        .route("/channels/:guild/:channel/start", post(start))
        .route("/channels/:guild/:channel/stop", post(stop))
        .route("/channels/:guild/:channel/state", get(view))
        .route("/channels/:guild/:channel/join", post(join))
        .route("/channels/:guild/:channel/cashout", post(cashout))
        .route("/channels/:guild/:channel/autocash", post(autocash))
        .route("/channels/:guild/:channel/autoplay", post(autoplay))
        .route("/channels/:guild/:channel/balance", post(set_balance))
        .route("/channels/:guild/:channel/balance/:user", get(balance))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRequest {
    pub user: String,
    pub start_balance: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub user: String,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct AutoCashRequest {
    pub user: String,
    pub target: f64,
}

#[derive(Debug, Deserialize)]
pub struct SetBalanceRequest {
    pub actor: String,
    pub user: String,
    pub amount: i64,
}

async fn healthz() -> &'static str {
    "ok"
}

fn lookup(state: &AppState, guild: String, channel: String) -> Result<Arc<Round>, EngineError> {
    let key = ChannelKey::new(guild, channel);
    state
        .registry
        .get(&key)
        .ok_or(EngineError::NotFound(key))
}

async fn setup(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
    Json(request): Json<SetupRequest>,
) -> Json<Reply> {
    let key = ChannelKey::new(guild, channel);
    let settings = ChannelSettings {
        start_balance: request.start_balance.unwrap_or(state.start_balance).max(1),
        host: Some(request.user),
    };
    let start_balance = settings.start_balance;
    state.registry.setup(&key, settings);
    Json(Reply::ok(format!(
        "channel {key} ready, start balance {start_balance}"
    )))
}

/// Starts the channel's round, creating it with default settings if setup never ran.
/// A `{user}` body names the host of a channel created this way.
async fn start(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
    body: Option<Json<UserRequest>>,
) -> Json<Reply> {
    let result = async {
        let key = ChannelKey::new(guild, channel);
        let settings = ChannelSettings {
            start_balance: state.start_balance,
            host: body.map(|Json(request)| request.user),
        };
        let round = state.registry.get_or_create(&key, settings);
        let view = round.start().await?;
        Ok::<_, EngineError>(format!("round {} counting down", view.round_id))
    }
    .await;
    Json(Reply::from_result(result))
}

async fn stop(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
) -> Json<Reply> {
    let result = async {
        let round = lookup(&state, guild, channel)?;
        round.stop().await;
        Ok::<_, EngineError>("round stopped".to_string())
    }
    .await;
    Json(Reply::from_result(result))
}

async fn view(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
) -> impl IntoResponse {
    match lookup(&state, guild, channel) {
        Ok(round) => Json(round.view()).into_response(),
        Err(err) => Json(Reply::rejected(&err)).into_response(),
    }
}

async fn join(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
    Json(request): Json<JoinRequest>,
) -> Json<Reply> {
    let result = async {
        let round = lookup(&state, guild, channel)?;
        let balance = round.join(&request.user, request.amount).await?;
        Ok::<_, EngineError>(format!("joined with {}, balance {balance}", request.amount))
    }
    .await;
    Json(Reply::from_result(result))
}

async fn cashout(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
    Json(request): Json<UserRequest>,
) -> Json<Reply> {
    let result = async {
        let round = lookup(&state, guild, channel)?;
        let cashout = round.cashout_now(&request.user).await?;
        Ok::<_, EngineError>(format!(
            "cashed out at {:.2}x for {}, balance {}",
            cashout.multiplier, cashout.payout, cashout.balance
        ))
    }
    .await;
    Json(Reply::from_result(result))
}

async fn autocash(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
    Json(request): Json<AutoCashRequest>,
) -> Json<Reply> {
    let result = async {
        let round = lookup(&state, guild, channel)?;
        round.set_auto_cash(&request.user, request.target).await?;
        Ok::<_, EngineError>(format!("auto cashout set to {:.2}x", request.target))
    }
    .await;
    Json(Reply::from_result(result))
}

async fn autoplay(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
    Json(request): Json<UserRequest>,
) -> Json<Reply> {
    let result = async {
        let round = lookup(&state, guild, channel)?;
        let enabled = round.toggle_autoplay(&request.user).await;
        Ok::<_, EngineError>(format!("autoplay {}", if enabled { "on" } else { "off" }))
    }
    .await;
    Json(Reply::from_result(result))
}

async fn balance(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel, user)): Path<(String, String, String)>,
) -> Json<Reply> {
    let result = async {
        let round = lookup(&state, guild, channel)?;
        let balance = round.balance(&user).await?;
        Ok::<_, EngineError>(balance.to_string())
    }
    .await;
    Json(Reply::from_result(result))
}

async fn set_balance(
    AxumState(state): AxumState<AppState>,
    Path((guild, channel)): Path<(String, String)>,
    Json(request): Json<SetBalanceRequest>,
) -> Json<Reply> {
    let result = async {
        let round = lookup(&state, guild, channel)?;
        let balance = round
            .set_balance(&request.actor, &request.user, request.amount)
            .await?;
        Ok::<_, EngineError>(format!("balance of {} set to {balance}", request.user))
    }
    .await;
    Json(Reply::from_result(result))
}
