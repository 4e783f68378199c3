use tokio::sync::broadcast;

use crate::dao::models::NotificationEntity;

/// Broadcast hub fanning freshly created notifications out to SSE subscribers.
///
/// Every subscriber sees every notification; the stream handler keeps only the
/// ones addressed to its user.
pub struct NotificationHub {
    sender: broadcast::Sender<NotificationEntity>,
}

impl NotificationHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEntity> {
        self.sender.subscribe()
    }

    /// Send a notification to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, notification: NotificationEntity) {
        let _ = self.sender.send(notification);
    }
}
