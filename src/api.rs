//! HTTP routing layer.
//!
//! A thin surface over [`AppState`]: every handler resolves the caller from the
//! `x-player-id` header, runs one action and renders the result. Room views are
//! always tailored to the caller so other players' topics never leave the
//! server.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::GameError;
use crate::protocol::SceneView;
use crate::state::{AppState, BanOutcome};
use crate::types::*;

pub const PLAYER_HEADER: &str = "x-player-id";

/// A [`GameError`] rendered as `{code, msg}` with a matching status
#[derive(Debug)]
pub struct ApiError(GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    msg: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::PreconditionFailed(_) => StatusCode::BAD_REQUEST,
            GameError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            GameError::LockContention => StatusCode::CONFLICT,
            GameError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        let body = ErrorBody {
            code: self.0.code(),
            msg: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn header_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(PLAYER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
}

/// The caller's player id; a missing header means the session is gone
fn caller(headers: &HeaderMap) -> ApiResult<PlayerId> {
    let id = header_id(headers).ok_or_else(|| GameError::NotFound("session".to_string()))?;
    if is_bot(id) {
        return Err(GameError::precondition("reserved player id").into());
    }
    Ok(id.to_string())
}

/// Like [`caller`], but mints a fresh id for first-time visitors
fn caller_or_new(headers: &HeaderMap) -> ApiResult<PlayerId> {
    match header_id(headers) {
        Some(_) => caller(headers),
        None => Ok(ulid::Ulid::new().to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub passphrase: String,
    pub theme: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub name: String,
    pub passphrase: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// Send back as `x-player-id` on every later request
    pub player_id: PlayerId,
    pub view: SceneView,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub struct TargetRequest {
    pub target: PlayerId,
}

#[derive(Debug, Serialize)]
pub struct BanResponse {
    pub outcome: BanOutcome,
}

#[derive(Debug, Deserialize)]
pub struct SceneRequest {
    pub scene: GameScene,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/join", post(join_room))
        .route("/api/rooms/{room}/rounds/{index}", get(round_history))
        .route("/api/topic", post(register_topic))
        .route("/api/round/start", post(start_round))
        .route("/api/question", post(ask_question))
        .route("/api/answer", post(submit_answer))
        .route("/api/guess", post(guess_liar))
        .route("/api/ban", post(ban_player))
        .route("/api/scene", get(scene).post(set_scene))
        .route("/api/config", get(config).post(update_config))
        .route("/api/reset", post(reset_room))
        .with_state(state)
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let player = caller_or_new(&headers)?;
    let game = state
        .create_room(&player, &req.name, &req.passphrase, &req.theme)
        .await?;
    let view = SceneView::for_player(&game, &player);
    Ok(Json(SessionResponse {
        player_id: player,
        view,
    }))
}

/// POST /api/rooms/join
pub async fn join_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<JoinRoomRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let player = caller_or_new(&headers)?;
    let game = state.join_room(&player, &req.name, &req.passphrase).await?;
    let view = SceneView::for_player(&game, &player);
    Ok(Json(SessionResponse {
        player_id: player,
        view,
    }))
}

/// POST /api/topic
pub async fn register_topic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TopicRequest>,
) -> ApiResult<Json<SceneView>> {
    let player = caller(&headers)?;
    let game = state.register_topic(&player, &req.topic).await?;
    Ok(Json(SceneView::for_player(&game, &player)))
}

/// POST /api/round/start
pub async fn start_round(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<SceneView>> {
    let player = caller(&headers)?;
    let game = state.start_round(&player).await?;
    Ok(Json(SceneView::for_player(&game, &player)))
}

/// POST /api/question
///
/// Only the verdict is returned; the oracle's reason stays hidden until the
/// round closes.
pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<QuestionRequest>,
) -> ApiResult<Json<HistoryResult>> {
    let player = caller(&headers)?;
    let entry = state.ask_question(&player, &req.question).await?;
    Ok(Json(entry.result))
}

/// POST /api/answer
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AnswerRequest>,
) -> ApiResult<Json<HistoryResult>> {
    let player = caller(&headers)?;
    let entry = state.submit_answer(&player, &req.answer).await?;
    Ok(Json(entry.result))
}

/// POST /api/guess
pub async fn guess_liar(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TargetRequest>,
) -> ApiResult<Json<SceneView>> {
    let player = caller(&headers)?;
    let game = state.guess_liar(&player, &req.target).await?;
    Ok(Json(SceneView::for_player(&game, &player)))
}

/// POST /api/ban
pub async fn ban_player(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<TargetRequest>,
) -> ApiResult<Json<BanResponse>> {
    let player = caller(&headers)?;
    let outcome = state.ban_player(&player, &req.target).await?;
    Ok(Json(BanResponse { outcome }))
}

/// GET /api/scene
pub async fn scene(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<SceneView>> {
    let player = caller(&headers)?;
    Ok(Json(state.scene_view(&player).await?))
}

/// POST /api/scene
pub async fn set_scene(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SceneRequest>,
) -> ApiResult<Json<SceneView>> {
    let player = caller(&headers)?;
    let game = state.set_player_scene(&player, req.scene).await?;
    Ok(Json(SceneView::for_player(&game, &player)))
}

/// GET /api/config
pub async fn config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<GameConfig>> {
    let player = caller(&headers)?;
    Ok(Json(state.config(&player).await?))
}

/// POST /api/config
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(config): Json<GameConfig>,
) -> ApiResult<Json<GameConfig>> {
    let player = caller(&headers)?;
    let game = state.update_config(&player, config).await?;
    Ok(Json(game.config))
}

/// POST /api/reset
pub async fn reset_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let player = caller(&headers)?;
    state.reset_room(&player).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/rooms/{room}/rounds/{index}
///
/// Members only. The open round's log carries the oracle's reasons, so it is
/// withheld until answering closes.
pub async fn round_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((room, index)): Path<(RoomId, usize)>,
) -> ApiResult<Json<Vec<HistoryInfo>>> {
    let player = caller(&headers)?;
    let game = state.game_for_player(&player).await?;
    if game.id != room {
        return Err(GameError::NotFound("room".to_string()).into());
    }
    if game.scene == GameScene::QuestionAnswering && index + 1 == game.rounds.len() {
        return Err(GameError::precondition("the round is still in progress").into());
    }
    Ok(Json(state.round_history(&room, index).await?))
}
