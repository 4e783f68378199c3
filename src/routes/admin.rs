use axum::{
    Json, Router,
    body::Body,
    extract::{FromRequestParts, Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        admin::{BanUserRequest, StatsResponse, UpdateRoleRequest},
        game::GameSummary,
        report::{AdminReportSummary, DismissReportRequest, ReportListQuery, ResolveReportRequest},
        user::ProfileResponse,
    },
    error::AppError,
    services::{
        admin_service, auth_service::CurrentUser, chat_service, game_service, report_service,
    },
    state::SharedState,
};

/// Configure the moderation routes, all gated on the admin role.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}/ban", post(ban_user))
        .route("/admin/users/{id}/unban", post(unban_user))
        .route("/admin/users/{id}/role", put(set_role))
        .route("/admin/games", get(list_games))
        .route("/admin/games/{id}/cancel", post(cancel_game))
        .route("/admin/reports", get(list_reports))
        .route("/admin/reports/{id}/resolve", post(resolve_report))
        .route("/admin/reports/{id}/dismiss", post(dismiss_report))
        .route("/admin/messages/{id}", delete(delete_message))
        .route("/admin/stats", get(stats))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    security(("bearer" = [])),
    responses((status = 200, description = "Every registered account", body = [ProfileResponse]))
)]
/// List every account, banned ones included.
pub async fn list_users(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ProfileResponse>>, AppError> {
    Ok(Json(admin_service::list_users(&state).await?))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/ban",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User identifier")),
    request_body = BanUserRequest,
    responses(
        (status = 200, description = "User banned", body = ProfileResponse),
        (status = 400, description = "Admins cannot ban themselves")
    )
)]
/// Ban an account and revoke its sessions.
pub async fn ban_user(
    State(state): State<SharedState>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<BanUserRequest>>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(
        admin_service::ban_user(&state, &admin, id, request.reason).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/unban",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User reinstated", body = ProfileResponse),
        (status = 409, description = "User is not banned")
    )
)]
/// Lift a ban and notify the user.
pub async fn unban_user(
    State(state): State<SharedState>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(admin_service::unban_user(&state, &admin, id).await?))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "User identifier")),
    request_body = UpdateRoleRequest,
    responses((status = 200, description = "Role updated", body = ProfileResponse))
)]
/// Grant or revoke the admin role.
pub async fn set_role(
    State(state): State<SharedState>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(
        admin_service::set_role(&state, &admin, id, request.role).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/admin/games",
    tag = "admin",
    security(("bearer" = [])),
    responses((status = 200, description = "Every game regardless of status", body = [GameSummary]))
)]
/// List every game for moderation.
pub async fn list_games(
    State(state): State<SharedState>,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    Ok(Json(admin_service::list_games(&state).await?))
}

#[utoipa::path(
    post,
    path = "/admin/games/{id}/cancel",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Game cancelled", body = GameSummary),
        (status = 409, description = "Game already finished")
    )
)]
/// Cancel any unfinished game on behalf of its host.
pub async fn cancel_game(
    State(state): State<SharedState>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GameSummary>, AppError> {
    Ok(Json(game_service::cancel_game(&state, &admin, id).await?))
}

#[utoipa::path(
    get,
    path = "/admin/reports",
    tag = "admin",
    security(("bearer" = [])),
    params(ReportListQuery),
    responses((status = 200, description = "Reports ordered by priority, then age", body = [AdminReportSummary]))
)]
/// List reports with their derived priority.
pub async fn list_reports(
    State(state): State<SharedState>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<Vec<AdminReportSummary>>, AppError> {
    Ok(Json(report_service::list_for_admin(&state, &query).await?))
}

#[utoipa::path(
    post,
    path = "/admin/reports/{id}/resolve",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Report identifier")),
    request_body = ResolveReportRequest,
    responses(
        (status = 200, description = "Report resolved", body = AdminReportSummary),
        (status = 409, description = "Report is no longer pending")
    )
)]
/// Resolve a pending report, optionally banning the user or cancelling the game it targets.
pub async fn resolve_report(
    State(state): State<SharedState>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<ResolveReportRequest>>,
) -> Result<Json<AdminReportSummary>, AppError> {
    Ok(Json(
        report_service::resolve_report(&state, &admin, id, request).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/admin/reports/{id}/dismiss",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Report identifier")),
    request_body = DismissReportRequest,
    responses(
        (status = 200, description = "Report dismissed", body = AdminReportSummary),
        (status = 409, description = "Report is no longer pending")
    )
)]
/// Close a pending report without action.
pub async fn dismiss_report(
    State(state): State<SharedState>,
    admin: CurrentUser,
    Path(id): Path<Uuid>,
    Valid(Json(request)): Valid<Json<DismissReportRequest>>,
) -> Result<Json<AdminReportSummary>, AppError> {
    Ok(Json(
        report_service::dismiss_report(&state, &admin, id, request).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/admin/messages/{id}",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Message identifier")),
    responses(
        (status = 204, description = "Message removed"),
        (status = 404, description = "Message not found")
    )
)]
/// Remove a chat message.
pub async fn delete_message(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    chat_service::delete_message(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    security(("bearer" = [])),
    responses((status = 200, description = "Dashboard counters", body = StatsResponse))
)]
/// Dashboard counters.
pub async fn stats(State(state): State<SharedState>) -> Result<Json<StatsResponse>, AppError> {
    Ok(Json(admin_service::stats(&state).await?))
}

async fn require_admin(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let current = CurrentUser::from_request_parts(&mut parts, &state).await?;
    if !current.is_admin() {
        return Err(AppError::Forbidden("admin role required".into()));
    }
    Ok(next.run(Request::from_parts(parts, body)).await)
}
