use axum::{
    Json, Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::chat::{ChatSocketQuery, HistoryQuery, MessageSummary, SendMessageRequest},
    error::AppError,
    routes::auth::bearer_token,
    services::{
        auth_service::{self, CurrentUser},
        chat_service,
    },
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/games/{id}/messages",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier"), HistoryQuery),
    responses(
        (status = 200, description = "Most recent messages, oldest first", body = [MessageSummary]),
        (status = 403, description = "Caller is not a participant")
    )
)]
/// Fetch the chat history of a game.
pub async fn history(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageSummary>>, AppError> {
    Ok(Json(
        chat_service::history(&state, &current, id, query.limit).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/messages",
    tag = "chat",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and relayed", body = MessageSummary),
        (status = 400, description = "Empty, oversized or media content"),
        (status = 403, description = "Caller is not a participant")
    )
)]
/// Post a chat message to a game.
pub async fn post_message(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageSummary>), AppError> {
    let message = chat_service::post_message(&state, &current, id, &request.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/games/{id}/chat",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Game identifier"), ChatSocketQuery),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Missing or invalid session token"),
        (status = 403, description = "Caller is not a participant")
    )
)]
/// Upgrade to the live chat WebSocket of a game.
///
/// Browsers cannot set headers on WebSocket handshakes, so the session token
/// may also be passed as `?token=`.
pub async fn chat_socket(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChatSocketQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = bearer_token(&headers)
        .or(query.token.as_deref())
        .ok_or_else(|| AppError::Unauthorized("missing session token".into()))?;
    let current = auth_service::authenticate(&state, token).await?;
    let store = state.require_store().await?;
    chat_service::ensure_chat_access(&store, id, &current).await?;

    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| {
        chat_service::handle_socket(shared_state, socket, current, id)
    }))
}

/// Configure the chat endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/games/{id}/messages", get(history).post(post_message))
        .route("/games/{id}/chat", get(chat_socket))
}
