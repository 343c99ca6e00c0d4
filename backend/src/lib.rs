use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use santa_core::ReceiverView;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod draw;
pub mod error;
pub mod registration;
pub mod reveal;
pub mod store;
pub mod telemetry;

use config::AppConfig;
use draw::DrawCoordinator;
use error::CoreError;
use reveal::RevealGateway;
use store::{MemoryStore, ParticipantStore};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ParticipantStore>,
    config: Arc<AppConfig>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::default()), AppConfig::default())
    }
}

impl AppState {
    pub fn new(store: Arc<dyn ParticipantStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    fn draw_coordinator(&self) -> DrawCoordinator {
        DrawCoordinator::new(self.store.clone())
            .with_expected_participants(self.config.expected_participants)
            .with_seed(self.config.draw_seed)
    }

    fn reveal_gateway(&self) -> RevealGateway {
        RevealGateway::new(self.store.clone())
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/game", post(create_game).get(get_active_game))
        .route("/participants", post(register).get(list_participants))
        .route("/draw", post(draw))
        .route("/reset", post(reset))
        .route("/reveal", get(reveal_by_token).post(reveal_by_identity))
        .with_state(state)
}

fn require_admin(headers: &HeaderMap, config: &AppConfig) -> Result<(), CoreError> {
    let provided = headers
        .get("x-admin-password")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != config.admin_password {
        return Err(CoreError::Unauthorized);
    }
    Ok(())
}

#[derive(Serialize)]
struct CreateGameResponse {
    game_id: String,
}

async fn create_game(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, CoreError> {
    require_admin(&headers, &state.config)?;
    let game = registration::create_game(state.store.as_ref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateGameResponse { game_id: game.id }),
    ))
}

#[derive(Serialize)]
struct GameStatus {
    game_id: String,
    draw_completed: bool,
    participants: usize,
}

async fn get_active_game(State(state): State<AppState>) -> Result<Json<GameStatus>, CoreError> {
    let store = state.store.as_ref();
    let game = registration::active_game(store).await?;
    let participants = store.participants_for_game(&game.id).await?.len();
    Ok(Json(GameStatus {
        game_id: game.id,
        draw_completed: game.draw_completed,
        participants,
    }))
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    #[serde(default)]
    gifts: Vec<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    participant_id: String,
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, CoreError> {
    let Json(payload) = payload?;
    let store = state.store.as_ref();
    let game = registration::active_game(store).await?;
    let participant_id =
        registration::register_participant(store, &game.id, &payload.name, &payload.gifts).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { participant_id }),
    ))
}

/// Public listing entry; never carries the secret token.
#[derive(Serialize)]
struct ParticipantSummary {
    id: String,
    name: String,
    created_at: u64,
}

#[derive(Serialize)]
struct ParticipantsResponse {
    participants: Vec<ParticipantSummary>,
}

async fn list_participants(
    State(state): State<AppState>,
) -> Result<Json<ParticipantsResponse>, CoreError> {
    let store = state.store.as_ref();
    let game = registration::active_game(store).await?;
    let participants = registration::list_participants(store, &game.id)
        .await?
        .into_iter()
        .map(|p| ParticipantSummary {
            id: p.id,
            name: p.name,
            created_at: p.created_at,
        })
        .collect();
    Ok(Json(ParticipantsResponse { participants }))
}

#[derive(Serialize)]
struct DrawResponse {
    ok: bool,
    game_id: String,
    assignments: usize,
}

async fn draw(State(state): State<AppState>) -> Result<Json<DrawResponse>, CoreError> {
    let game = registration::active_game(state.store.as_ref()).await?;
    let summary = state.draw_coordinator().execute(&game.id).await?;
    Ok(Json(DrawResponse {
        ok: true,
        game_id: summary.game_id,
        assignments: summary.assignments,
    }))
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, CoreError> {
    require_admin(&headers, &state.config)?;
    let store = state.store.as_ref();
    let game = registration::active_game(store).await?;
    registration::reset_game(store, &game.id).await?;
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Deserialize)]
struct TokenParams {
    token: Option<String>,
}

#[derive(Serialize)]
struct TokenRevealResponse {
    receiver: ReceiverView,
}

async fn reveal_by_token(
    State(state): State<AppState>,
    Query(params): Query<TokenParams>,
) -> Result<Json<TokenRevealResponse>, CoreError> {
    let receiver = state
        .reveal_gateway()
        .reveal_by_token(params.token.as_deref())
        .await?;
    Ok(Json(TokenRevealResponse { receiver }))
}

#[derive(Deserialize)]
struct IdentityRevealRequest {
    #[serde(default)]
    participant_id: Option<String>,
}

#[derive(Serialize)]
struct IdentityRevealResponse {
    success: bool,
    receiver: ReceiverView,
}

async fn reveal_by_identity(
    State(state): State<AppState>,
    payload: Result<Json<IdentityRevealRequest>, JsonRejection>,
) -> Result<Json<IdentityRevealResponse>, CoreError> {
    let Json(payload) = payload?;
    let participant_id = payload.participant_id.unwrap_or_default();
    let receiver = state
        .reveal_gateway()
        .reveal_by_identity(&participant_id)
        .await?;
    Ok(Json(IdentityRevealResponse {
        success: true,
        receiver,
    }))
}
