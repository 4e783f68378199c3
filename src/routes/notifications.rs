use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{delete, get, post},
};
use futures::Stream;
use uuid::Uuid;

use crate::{
    dto::{
        common::CountResponse,
        notification::{NotificationSummary, UnreadCountResponse},
    },
    error::AppError,
    services::{auth_service::CurrentUser, notification_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Caller's notifications, newest first", body = [NotificationSummary]))
)]
/// List the caller's notifications.
pub async fn list_notifications(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Json<Vec<NotificationSummary>>, AppError> {
    Ok(Json(notification_service::list(&state, &current).await?))
}

#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    tag = "notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Number of unread notifications", body = UnreadCountResponse))
)]
/// Count the caller's unread notifications.
pub async fn unread_count(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    Ok(Json(
        notification_service::unread_count(&state, &current).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Notification identifier")),
    responses(
        (status = 200, description = "Notification marked as read", body = NotificationSummary),
        (status = 404, description = "Notification not found")
    )
)]
/// Mark one notification as read.
pub async fn mark_read(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationSummary>, AppError> {
    Ok(Json(
        notification_service::mark_read(&state, &current, id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Number of notifications marked as read", body = CountResponse))
)]
/// Mark every notification of the caller as read.
pub async fn mark_all_read(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Json<CountResponse>, AppError> {
    Ok(Json(
        notification_service::mark_all_read(&state, &current).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    tag = "notifications",
    security(("bearer" = [])),
    params(("id" = Uuid, Path, description = "Notification identifier")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    )
)]
/// Delete one of the caller's notifications.
pub async fn delete_notification(
    State(state): State<SharedState>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    notification_service::delete(&state, &current, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/notifications/stream",
    tag = "notifications",
    security(("bearer" = [])),
    responses((status = 200, description = "Live notification feed", content_type = "text/event-stream", body = String))
)]
/// Stream the caller's new notifications as server-sent events.
pub async fn notification_stream(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let feed = notification_service::live_feed(&state, current.id);
    notification_service::to_sse_stream(feed, current.id)
}

/// Configure the notification inbox routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/stream", get(notification_stream))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/notifications/{id}", delete(delete_notification))
}
