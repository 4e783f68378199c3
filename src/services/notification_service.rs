//! Per-user notifications: fire-and-forget creation, inbox management and the
//! live SSE feed.

use std::{
    convert::Infallible,
    time::{Duration, SystemTime},
};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{NotificationEntity, NotificationKind},
    dto::{
        common::CountResponse,
        notification::{NotificationSummary, UnreadCountResponse},
    },
    error::ServiceError,
    services::auth_service::CurrentUser,
    state::SharedState,
};

/// Record a notification for `user_id` and push it to their live streams.
///
/// Never fails: storage problems are logged and the triggering operation goes on.
pub async fn notify(
    state: &SharedState,
    user_id: Uuid,
    kind: NotificationKind,
    message: impl Into<String>,
    game_id: Option<Uuid>,
) {
    let notification = NotificationEntity {
        id: Uuid::new_v4(),
        user_id,
        kind,
        message: message.into(),
        game_id,
        read: false,
        created_at: SystemTime::now(),
    };

    match state.store().await {
        Some(store) => {
            if let Err(err) = store.save_notification(notification.clone()).await {
                warn!(user_id = %user_id, kind = ?kind, error = %err, "failed to persist notification");
            }
        }
        None => warn!(user_id = %user_id, kind = ?kind, "storage unavailable; notification not persisted"),
    }

    debug!(user_id = %user_id, kind = ?kind, "notification created");
    state.notifications().broadcast(notification);
}

/// Notify every user in `recipients` with the same message.
pub async fn notify_all<I>(
    state: &SharedState,
    recipients: I,
    kind: NotificationKind,
    message: &str,
    game_id: Option<Uuid>,
) where
    I: IntoIterator<Item = Uuid>,
{
    for user_id in recipients {
        notify(state, user_id, kind, message, game_id).await;
    }
}

/// The caller's inbox, newest first.
pub async fn list(
    state: &SharedState,
    current: &CurrentUser,
) -> Result<Vec<NotificationSummary>, ServiceError> {
    let store = state.require_store().await?;
    let notifications = store.list_notifications(current.id).await?;
    Ok(notifications.iter().map(NotificationSummary::from).collect())
}

/// How many of the caller's notifications are unread.
pub async fn unread_count(
    state: &SharedState,
    current: &CurrentUser,
) -> Result<UnreadCountResponse, ServiceError> {
    let store = state.require_store().await?;
    let unread = store
        .list_notifications(current.id)
        .await?
        .iter()
        .filter(|notification| !notification.read)
        .count();
    Ok(UnreadCountResponse { unread })
}

/// Load a notification owned by the caller. Other users' notifications read as missing.
async fn load_owned(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<NotificationEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_notification(id)
        .await?
        .filter(|notification| notification.user_id == current.id)
        .ok_or_else(|| ServiceError::NotFound(format!("notification `{id}` not found")))
}

/// Mark one of the caller's notifications as read.
pub async fn mark_read(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<NotificationSummary, ServiceError> {
    let mut notification = load_owned(state, current, id).await?;
    if !notification.read {
        notification.read = true;
        state
            .require_store()
            .await?
            .save_notification(notification.clone())
            .await?;
    }
    Ok(NotificationSummary::from(&notification))
}

/// Mark every unread notification of the caller as read.
pub async fn mark_all_read(
    state: &SharedState,
    current: &CurrentUser,
) -> Result<CountResponse, ServiceError> {
    let store = state.require_store().await?;
    let mut count = 0;
    for mut notification in store.list_notifications(current.id).await? {
        if notification.read {
            continue;
        }
        notification.read = true;
        store.save_notification(notification).await?;
        count += 1;
    }
    Ok(CountResponse { count })
}

/// Delete one of the caller's notifications.
pub async fn delete(state: &SharedState, current: &CurrentUser, id: Uuid) -> Result<(), ServiceError> {
    load_owned(state, current, id).await?;
    state.require_store().await?.delete_notification(id).await?;
    Ok(())
}

/// Subscribe to every notification created from now on.
pub fn subscribe(state: &SharedState) -> broadcast::Receiver<NotificationEntity> {
    state.notifications().subscribe()
}

/// Narrow the global notification feed to the ones addressed to `user_id`.
pub fn user_feed(
    receiver: broadcast::Receiver<NotificationEntity>,
    user_id: Uuid,
) -> impl Stream<Item = NotificationSummary> + Send + 'static {
    BroadcastStream::new(receiver).filter_map(move |item| async move {
        match item {
            Ok(notification) if notification.user_id == user_id => {
                Some(NotificationSummary::from(&notification))
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(user_id = %user_id, skipped, "notification stream lagged");
                None
            }
        }
    })
}

/// The caller's live feed, ending as soon as their sessions are revoked.
pub fn live_feed(
    state: &SharedState,
    user_id: Uuid,
) -> impl Stream<Item = NotificationSummary> + Send + 'static + use<> {
    let revoked = state.sessions().revoked(user_id);
    user_feed(subscribe(state), user_id).take_until(async move {
        revoked.await;
        info!(user_id = %user_id, "notification stream closed after revocation");
    })
}

/// Convert the caller's notification feed into an SSE response.
pub fn to_sse_stream(
    feed: impl Stream<Item = NotificationSummary> + Send + 'static,
    user_id: Uuid,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = %user_id, "notification stream connected");
    let ready = futures::stream::once(async {
        Ok(Event::default()
            .event("ready")
            .data("notification stream connected"))
    });
    let events = feed.filter_map(|payload| async move {
        match Event::default().event("notification").json_data(&payload) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                warn!(error = %err, "failed to serialise notification event");
                None
            }
        }
    });

    Sse::new(ready.chain(events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
