use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::report::{CreateReportRequest, ReportSummary},
    error::AppError,
    services::{auth_service::CurrentUser, report_service},
    state::SharedState,
};

#[utoipa::path(
    post,
    path = "/reports",
    tag = "reports",
    security(("bearer" = [])),
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report filed", body = ReportSummary),
        (status = 404, description = "Reported target does not exist"),
        (status = 409, description = "A pending report on this target already exists")
    )
)]
/// Report a user or a game to the moderators.
pub async fn create_report(
    State(state): State<SharedState>,
    current: CurrentUser,
    Valid(Json(request)): Valid<Json<CreateReportRequest>>,
) -> Result<(StatusCode, Json<ReportSummary>), AppError> {
    let report = report_service::create_report(&state, &current, request).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

#[utoipa::path(
    get,
    path = "/reports/mine",
    tag = "reports",
    security(("bearer" = [])),
    responses((status = 200, description = "Reports filed by the caller", body = [ReportSummary]))
)]
/// List the reports the caller has filed.
pub async fn my_reports(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Json<Vec<ReportSummary>>, AppError> {
    Ok(Json(report_service::my_reports(&state, &current).await?))
}

/// Configure the report routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/reports", post(create_report))
        .route("/reports/mine", get(my_reports))
}
