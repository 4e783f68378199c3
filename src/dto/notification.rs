use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{NotificationEntity, NotificationKind},
    dto::format_system_time,
};

/// Notification as delivered over REST and the SSE stream.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationSummary {
    /// Notification id.
    pub id: Uuid,
    /// Event that produced it.
    pub kind: NotificationKind,
    /// Human readable text.
    pub message: String,
    /// Related game, omitted when there is none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Uuid>,
    /// Whether the recipient has read it.
    pub read: bool,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<&NotificationEntity> for NotificationSummary {
    fn from(notification: &NotificationEntity) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            message: notification.message.clone(),
            game_id: notification.game_id,
            read: notification.read,
            created_at: format_system_time(notification.created_at),
        }
    }
}

/// Unread notification counter.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    /// Notifications not read yet.
    pub unread: usize,
}
