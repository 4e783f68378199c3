use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{
        AttendanceRequest, CreateGameRequest, GameListQuery, GameSummary, JoinResponse,
        RatingRequest, TeamsRequest, TransferHostRequest, UpdateGameRequest,
    },
    error::AppError,
    services::{auth_service::CurrentUser, game_service},
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    security(("bearer" = [])),
    request_body = CreateGameRequest,
    responses(
        (status = 201, description = "Game created", body = GameSummary),
        (status = 400, description = "Invalid payload")
    )
)]
/// Schedule a new game hosted by the caller.
pub async fn create_game(
    State(state): State<SharedState>,
    current: CurrentUser,
    Valid(Json(request)): Valid<Json<CreateGameRequest>>,
) -> Result<(StatusCode, Json<GameSummary>), AppError> {
    let game = game_service::create_game(&state, &current, request).await?;
    Ok((StatusCode::CREATED, Json(game)))
}

#[utoipa::path(
    get,
    path = "/games",
    tag = "games",
    params(GameListQuery),
    responses((status = 200, description = "Games matching the filters", body = [GameSummary]))
)]
/// List games matching the optional sport, status, skill level, host and text filters.
pub async fn list_games(
    State(state): State<SharedState>,
    Query(query): Query<GameListQuery>,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    Ok(Json(game_service::list_games(&state, &query).await?))
}

#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "games",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game detail", body = GameSummary),
        (status = 404, description = "Game not found")
    )
)]
/// Fetch a single game.
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::get_game(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/games/{id}",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = UpdateGameRequest,
    responses(
        (status = 200, description = "Game updated", body = GameSummary),
        (status = 403, description = "Caller is not the host"),
        (status = 409, description = "Game no longer upcoming")
    )
)]
/// Edit the descriptive fields of an upcoming game.
pub async fn update_game(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<UpdateGameRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::update_game(&state, &current, id, request).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/join",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Registered or join request filed", body = JoinResponse),
        (status = 409, description = "Already participating, full or not open")
    )
)]
/// Join a game, or ask the host for a spot when approval is required.
pub async fn join_game(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinResponse>, AppError> {
    Ok(Json(game_service::join_game(&state, &current, id).await?))
}

#[utoipa::path(
    post,
    path = "/games/{id}/requests/{user_id}/approve",
    tag = "games",
    security(("bearer" = [])),
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("user_id" = Uuid, Path, description = "Requesting user")
    ),
    responses((status = 200, description = "Request approved", body = GameSummary))
)]
/// Accept a pending join request.
pub async fn approve_request(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::approve_request(&state, &current, id, user_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/requests/{user_id}/reject",
    tag = "games",
    security(("bearer" = [])),
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("user_id" = Uuid, Path, description = "Requesting user")
    ),
    responses((status = 200, description = "Request rejected", body = GameSummary))
)]
/// Turn down a pending join request.
pub async fn reject_request(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::reject_request(&state, &current, id, user_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/leave",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses((status = 200, description = "Left the game", body = GameSummary))
)]
/// Leave a game, or withdraw a pending request.
pub async fn leave_game(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::leave_game(&state, &current, id).await?))
}

#[utoipa::path(
    post,
    path = "/games/{id}/kick/{user_id}",
    tag = "games",
    security(("bearer" = [])),
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("user_id" = Uuid, Path, description = "Player to remove")
    ),
    responses((status = 200, description = "Player removed", body = GameSummary))
)]
/// Remove a registered player from the roster.
pub async fn kick_player(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::kick_player(&state, &current, id, user_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/transfer",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = TransferHostRequest,
    responses((status = 200, description = "Host role handed over", body = GameSummary))
)]
/// Hand the host role to a registered player.
pub async fn transfer_host(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TransferHostRequest>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::transfer_host(&state, &current, id, request).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/games/{id}/teams",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = TeamsRequest,
    responses((status = 200, description = "Teams assigned", body = GameSummary))
)]
/// Split participants between the blue and red teams.
pub async fn set_teams(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<TeamsRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::set_teams(&state, &current, id, request).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/start",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game started", body = GameSummary),
        (status = 409, description = "Game is not upcoming")
    )
)]
/// Move an upcoming game to ongoing.
pub async fn start_game(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::start_game(&state, &current, id).await?))
}

#[utoipa::path(
    post,
    path = "/games/{id}/attendance",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = AttendanceRequest,
    responses((status = 200, description = "Attendance recorded", body = GameSummary))
)]
/// Record whether a participant showed up. The game completes once everyone is recorded.
pub async fn record_attendance(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AttendanceRequest>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::record_attendance(&state, &current, id, request).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/games/{id}/cancel",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game cancelled", body = GameSummary),
        (status = 409, description = "Game already finished")
    )
)]
/// Cancel a game that has not finished yet.
pub async fn cancel_game(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::cancel_game(&state, &current, id).await?))
}

#[utoipa::path(
    post,
    path = "/games/{id}/ratings",
    tag = "games",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Rating stored", body = GameSummary),
        (status = 409, description = "Already rated or game not completed")
    )
)]
/// Rate another participant of a completed game.
pub async fn rate_player(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<RatingRequest>>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(
        game_service::rate_player(&state, &current, id, request).await?,
    ))
}

/// Configure the game routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/games", get(list_games).post(create_game))
        .route("/games/{id}", get(get_game).put(update_game))
        .route("/games/{id}/join", post(join_game))
        .route(
            "/games/{id}/requests/{user_id}/approve",
            post(approve_request),
        )
        .route("/games/{id}/requests/{user_id}/reject", post(reject_request))
        .route("/games/{id}/leave", post(leave_game))
        .route("/games/{id}/kick/{user_id}", post(kick_player))
        .route("/games/{id}/transfer", post(transfer_host))
        .route("/games/{id}/teams", put(set_teams))
        .route("/games/{id}/start", post(start_game))
        .route("/games/{id}/attendance", post(record_attendance))
        .route("/games/{id}/cancel", post(cancel_game))
        .route("/games/{id}/ratings", post(rate_player))
}
