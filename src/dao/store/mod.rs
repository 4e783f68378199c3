/// `DashMap`-backed store used by tests and `STORAGE_BACKEND=memory`.
pub mod memory;
/// MongoDB store, one collection per entity.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    GameEntity, MessageEntity, NotificationEntity, ReportEntity, UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryStore;

/// Abstraction over the persistence layer for every GameOn document type.
pub trait GameOnStore: Send + Sync {
    /// Insert a brand-new user, failing with a duplicate error when the email is taken.
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Upsert a user by id.
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a user by id.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Load a user by lowercased email.
    fn find_user_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Every user, oldest first.
    fn list_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    /// Delete a user; `false` when it did not exist.
    fn delete_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Upsert a game by id.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a game by id.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Every game ordered by `starts_at` ascending.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>>;

    /// Upsert a report by id.
    fn save_report(&self, report: ReportEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a report by id.
    fn find_report(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ReportEntity>>>;
    /// Every report, oldest first.
    fn list_reports(&self) -> BoxFuture<'static, StorageResult<Vec<ReportEntity>>>;
    /// Delete every report filed by `reporter_id` and return how many were removed.
    fn delete_reports_by_reporter(&self, reporter_id: Uuid)
    -> BoxFuture<'static, StorageResult<u64>>;

    /// Upsert a notification by id.
    fn save_notification(
        &self,
        notification: NotificationEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a notification by id.
    fn find_notification(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<NotificationEntity>>>;
    /// Notifications addressed to `user_id`, newest first.
    fn list_notifications(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<NotificationEntity>>>;
    /// Delete a notification; `false` when it did not exist.
    fn delete_notification(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete every notification addressed to `user_id`.
    fn delete_notifications_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>>;

    /// Insert a chat message.
    fn save_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a chat message by id.
    fn find_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MessageEntity>>>;
    /// The latest `limit` messages of a game, oldest first.
    fn list_messages(
        &self,
        game_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>>;
    /// Delete a chat message; `false` when it did not exist.
    fn delete_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete every message posted by `sender_id`.
    fn delete_messages_by_sender(&self, sender_id: Uuid)
    -> BoxFuture<'static, StorageResult<u64>>;

    /// Cheap round-trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the connection after failed health checks.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
