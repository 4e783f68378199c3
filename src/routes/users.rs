use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        game::GameSummary,
        user::{ProfileResponse, PublicProfile, UpdateProfileRequest},
    },
    error::AppError,
    services::{auth_service::CurrentUser, game_service, user_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfile),
        (status = 404, description = "User not found")
    )
)]
/// Fetch the public part of a user's profile.
pub async fn get_profile(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicProfile>, AppError> {
    Ok(Json(user_service::get_public_profile(&state, id).await?))
}

#[utoipa::path(
    put,
    path = "/users/me",
    tag = "users",
    security(("bearer" = [])),
    request_body = UpdateProfileRequest,
    responses((status = 200, description = "Profile updated", body = ProfileResponse))
)]
/// Update the caller's display name, bio or favorite sports.
pub async fn update_me(
    State(state): State<SharedState>,
    current: CurrentUser,
    Valid(Json(request)): Valid<Json<UpdateProfileRequest>>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(
        user_service::update_profile(&state, &current, request).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/users/me",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 204, description = "Account and owned data deleted"))
)]
/// Delete the caller's account along with everything it owns.
pub async fn delete_me(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<StatusCode, AppError> {
    user_service::delete_account(&state, &current).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/users/me/games",
    tag = "users",
    security(("bearer" = [])),
    responses((status = 200, description = "Games hosted or joined", body = [GameSummary]))
)]
/// List the games the caller hosts or plays in.
pub async fn my_games(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    Ok(Json(game_service::my_games(&state, &current).await?))
}

/// Configure the user profile routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/users/me", put(update_me).delete(delete_me))
        .route("/users/me/games", get(my_games))
        .route("/users/{id}", get(get_profile))
}
