//! Process-local [`GameOnStore`] used by tests and by `STORAGE_BACKEND=memory` runs.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GameEntity, MessageEntity, NotificationEntity, ReportEntity, UserEntity},
    storage::{StorageError, StorageResult},
    store::GameOnStore,
};

/// In-process store keeping every entity in `DashMap`s; nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: DashMap<Uuid, UserEntity>,
    emails: DashMap<String, Uuid>,
    games: DashMap<Uuid, GameEntity>,
    reports: DashMap<Uuid, ReportEntity>,
    notifications: DashMap<Uuid, NotificationEntity>,
    messages: DashMap<Uuid, MessageEntity>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Clone every value out of a map so no shard lock outlives the call.
fn values<T: Clone>(map: &DashMap<Uuid, T>) -> Vec<T> {
    map.iter().map(|entry| entry.value().clone()).collect()
}

/// Remove every entry matching `predicate`, returning how many were dropped.
fn remove_where<T>(map: &DashMap<Uuid, T>, predicate: impl Fn(&T) -> bool) -> u64 {
    let mut removed = 0;
    map.retain(|_, value| {
        let drop = predicate(value);
        removed += u64::from(drop);
        !drop
    });
    removed
}

impl GameOnStore for MemoryStore {
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            match inner.emails.entry(user.email.clone()) {
                Entry::Occupied(_) => Err(StorageError::duplicate("user email", user.email)),
                Entry::Vacant(slot) => {
                    slot.insert(user.id);
                    inner.users.insert(user.id, user);
                    Ok(())
                }
            }
        })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.emails.insert(user.email.clone(), user.id);
            inner.users.insert(user.id, user);
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.users.get(&id).map(|entry| entry.value().clone())) })
    }

    fn find_user_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let Some(id) = inner.emails.get(&email).map(|entry| *entry.value()) else {
                return Ok(None);
            };
            Ok(inner.users.get(&id).map(|entry| entry.value().clone()))
        })
    }

    fn list_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut users = values(&inner.users);
            users.sort_by_key(|user| user.created_at);
            Ok(users)
        })
    }

    fn delete_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            match inner.users.remove(&id) {
                Some((_, user)) => {
                    inner.emails.remove(&user.email);
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.games.insert(game.id, game);
            Ok(())
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.games.get(&id).map(|entry| entry.value().clone())) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut games = values(&inner.games);
            games.sort_by_key(|game| game.starts_at);
            Ok(games)
        })
    }

    fn save_report(&self, report: ReportEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.reports.insert(report.id, report);
            Ok(())
        })
    }

    fn find_report(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ReportEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.reports.get(&id).map(|entry| entry.value().clone())) })
    }

    fn list_reports(&self) -> BoxFuture<'static, StorageResult<Vec<ReportEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut reports = values(&inner.reports);
            reports.sort_by_key(|report| report.created_at);
            Ok(reports)
        })
    }

    fn delete_reports_by_reporter(
        &self,
        reporter_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(remove_where(&inner.reports, |report| {
                report.reporter_id == reporter_id
            }))
        })
    }

    fn save_notification(
        &self,
        notification: NotificationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.notifications.insert(notification.id, notification);
            Ok(())
        })
    }

    fn find_notification(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<NotificationEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .notifications
                .get(&id)
                .map(|entry| entry.value().clone()))
        })
    }

    fn list_notifications(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<NotificationEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut notifications: Vec<_> = inner
                .notifications
                .iter()
                .filter(|entry| entry.user_id == user_id)
                .map(|entry| entry.value().clone())
                .collect();
            notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(notifications)
        })
    }

    fn delete_notification(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.notifications.remove(&id).is_some()) })
    }

    fn delete_notifications_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(remove_where(&inner.notifications, |notification| {
                notification.user_id == user_id
            }))
        })
    }

    fn save_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.messages.insert(message.id, message);
            Ok(())
        })
    }

    fn find_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MessageEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.messages.get(&id).map(|entry| entry.value().clone())) })
    }

    fn list_messages(
        &self,
        game_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut messages: Vec<_> = inner
                .messages
                .iter()
                .filter(|entry| entry.game_id == game_id)
                .map(|entry| entry.value().clone())
                .collect();
            messages.sort_by_key(|message| message.created_at);
            let skip = messages.len().saturating_sub(limit);
            Ok(messages.split_off(skip))
        })
    }

    fn delete_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.messages.remove(&id).is_some()) })
    }

    fn delete_messages_by_sender(
        &self,
        sender_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(remove_where(&inner.messages, |message| {
                message.sender_id == sender_id
            }))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::SystemTime,
    };

    use super::*;

    #[test]
    fn remove_where_counts_only_what_it_removed() {
        let map: Arc<DashMap<Uuid, u32>> = Arc::new(DashMap::new());
        for _ in 0..1_000 {
            map.insert(Uuid::new_v4(), 0);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let (map, stop) = (map.clone(), stop.clone());
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    map.insert(Uuid::new_v4(), 1);
                }
            })
        };

        let removed = remove_where(&map, |value| *value == 0);
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();

        assert_eq!(removed, 1_000);
        assert!(map.iter().all(|entry| *entry.value() == 1));
    }

    #[tokio::test]
    async fn deleting_by_sender_keeps_other_messages() {
        let store = MemoryStore::new();
        let (game_id, author, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for sender_id in [author, author, other] {
            store
                .save_message(MessageEntity {
                    id: Uuid::new_v4(),
                    game_id,
                    sender_id,
                    sender_name: "Sam".into(),
                    text: "hi".into(),
                    created_at: SystemTime::now(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.delete_messages_by_sender(author).await.unwrap(), 2);
        let left = store.list_messages(game_id, 10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].sender_id, other);
    }
}
