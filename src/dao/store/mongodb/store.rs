use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoGameDocument, MongoMessageDocument, MongoNotificationDocument, MongoReportDocument,
        MongoUserDocument, doc_id,
    },
};
use crate::dao::{
    models::{GameEntity, MessageEntity, NotificationEntity, ReportEntity, UserEntity},
    storage::StorageResult,
    store::GameOnStore,
};

const USER_COLLECTION_NAME: &str = "users";
const GAME_COLLECTION_NAME: &str = "games";
const REPORT_COLLECTION_NAME: &str = "reports";
const NOTIFICATION_COLLECTION_NAME: &str = "notifications";
const MESSAGE_COLLECTION_NAME: &str = "messages";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// `GameOnStore` backed by a MongoDB database; cheap to clone.
#[derive(Clone)]
pub struct MongoGameOnStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        info!(database = %self.config.database_name, "reconnected to MongoDB");
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl MongoGameOnStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes: [(&'static str, &'static str, Document, bool); 5] = [
            (USER_COLLECTION_NAME, "user_email_idx", doc! {"email": 1}, true),
            (GAME_COLLECTION_NAME, "game_starts_at_idx", doc! {"starts_at": 1}, false),
            (
                MESSAGE_COLLECTION_NAME,
                "message_game_idx",
                doc! {"game_id": 1, "created_at": -1},
                false,
            ),
            (
                NOTIFICATION_COLLECTION_NAME,
                "notification_user_idx",
                doc! {"user_id": 1, "created_at": -1},
                false,
            ),
            (REPORT_COLLECTION_NAME, "report_status_idx", doc! {"status": 1}, false),
        ];

        for (collection_name, index_name, keys, unique) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(index_name.to_owned()))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection_name)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: index_name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn users(&self) -> Collection<MongoUserDocument> {
        self.database().await.collection(USER_COLLECTION_NAME)
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        self.database().await.collection(GAME_COLLECTION_NAME)
    }

    async fn reports(&self) -> Collection<MongoReportDocument> {
        self.database().await.collection(REPORT_COLLECTION_NAME)
    }

    async fn notifications(&self) -> Collection<MongoNotificationDocument> {
        self.database().await.collection(NOTIFICATION_COLLECTION_NAME)
    }

    async fn messages(&self) -> Collection<MongoMessageDocument> {
        self.database().await.collection(MESSAGE_COLLECTION_NAME)
    }

    async fn insert_user(&self, user: UserEntity) -> MongoResult<()> {
        let id = user.id;
        let email = user.email.clone();
        let document: MongoUserDocument = user.into();
        self.users()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicateEmail { email }
                } else {
                    MongoDaoError::Save {
                        entity: "user",
                        id,
                        source,
                    }
                }
            })?;
        Ok(())
    }

    async fn save_user(&self, user: UserEntity) -> MongoResult<()> {
        let id = user.id;
        let document: MongoUserDocument = user.into();
        self.users()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                entity: "user",
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_user(&self, filter: Document, key: String) -> MongoResult<Option<UserEntity>> {
        let document = self
            .users()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Load {
                entity: "user",
                key,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_users(&self) -> MongoResult<Vec<UserEntity>> {
        let documents: Vec<MongoUserDocument> = self
            .users()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "users",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "users",
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_game(&self, game: GameEntity) -> MongoResult<()> {
        let id = game.id;
        let document: MongoGameDocument = game.into();
        self.games()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                entity: "game",
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_game(&self, id: Uuid) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                entity: "game",
                key: id.to_string(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_games(&self) -> MongoResult<Vec<GameEntity>> {
        let documents: Vec<MongoGameDocument> = self
            .games()
            .await
            .find(doc! {})
            .sort(doc! {"starts_at": 1})
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "games",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "games",
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_report(&self, report: ReportEntity) -> MongoResult<()> {
        let id = report.id;
        let document: MongoReportDocument = report.into();
        self.reports()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                entity: "report",
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_report(&self, id: Uuid) -> MongoResult<Option<ReportEntity>> {
        let document = self
            .reports()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                entity: "report",
                key: id.to_string(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_reports(&self) -> MongoResult<Vec<ReportEntity>> {
        let documents: Vec<MongoReportDocument> = self
            .reports()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "reports",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "reports",
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_notification(&self, notification: NotificationEntity) -> MongoResult<()> {
        let id = notification.id;
        let document: MongoNotificationDocument = notification.into();
        self.notifications()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Save {
                entity: "notification",
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> MongoResult<Option<NotificationEntity>> {
        let document = self
            .notifications()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                entity: "notification",
                key: id.to_string(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_notifications(&self, user_id: Uuid) -> MongoResult<Vec<NotificationEntity>> {
        let documents: Vec<MongoNotificationDocument> = self
            .notifications()
            .await
            .find(doc! {"user_id": user_id.to_string()})
            .sort(doc! {"created_at": -1})
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "notifications",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "notifications",
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn save_message(&self, message: MessageEntity) -> MongoResult<()> {
        let id = message.id;
        let document: MongoMessageDocument = message.into();
        self.messages()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Save {
                entity: "message",
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_message(&self, id: Uuid) -> MongoResult<Option<MessageEntity>> {
        let document = self
            .messages()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Load {
                entity: "message",
                key: id.to_string(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn list_messages(&self, game_id: Uuid, limit: usize) -> MongoResult<Vec<MessageEntity>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let documents: Vec<MongoMessageDocument> = self
            .messages()
            .await
            .find(doc! {"game_id": game_id.to_string()})
            .sort(doc! {"created_at": -1})
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "messages",
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List {
                entity: "messages",
                source,
            })?;
        // Newest-first from the cursor; callers expect chronological order.
        Ok(documents.into_iter().rev().map(Into::into).collect())
    }

    async fn delete_one<T>(
        collection: Collection<T>,
        entity: &'static str,
        id: Uuid,
    ) -> MongoResult<bool>
    where
        T: Send + Sync,
    {
        let result = collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                entity,
                key: id.to_string(),
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_many<T>(
        collection: Collection<T>,
        entity: &'static str,
        field: &'static str,
        id: Uuid,
    ) -> MongoResult<u64>
    where
        T: Send + Sync,
    {
        let mut filter = Document::new();
        filter.insert(field, id.to_string());
        let result = collection
            .delete_many(filter)
            .await
            .map_err(|source| MongoDaoError::Delete {
                entity,
                key: format!("{field}={id}"),
                source,
            })?;
        Ok(result.deleted_count)
    }
}

impl GameOnStore for MongoGameOnStore {
    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_user(user).await.map_err(Into::into) })
    }

    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_user(user).await.map_err(Into::into) })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_user(doc_id(id), id.to_string())
                .await
                .map_err(Into::into)
        })
    }

    fn find_user_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_user(doc! {"email": email.as_str()}, email.clone())
                .await
                .map_err(Into::into)
        })
    }

    fn list_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_users().await.map_err(Into::into) })
    }

    fn delete_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.users().await;
            Self::delete_one(collection, "user", id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_game(game).await.map_err(Into::into) })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_games().await.map_err(Into::into) })
    }

    fn save_report(&self, report: ReportEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_report(report).await.map_err(Into::into) })
    }

    fn find_report(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ReportEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_report(id).await.map_err(Into::into) })
    }

    fn list_reports(&self) -> BoxFuture<'static, StorageResult<Vec<ReportEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_reports().await.map_err(Into::into) })
    }

    fn delete_reports_by_reporter(
        &self,
        reporter_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.reports().await;
            Self::delete_many(collection, "reports", "reporter_id", reporter_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_notification(
        &self,
        notification: NotificationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_notification(notification)
                .await
                .map_err(Into::into)
        })
    }

    fn find_notification(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<NotificationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_notification(id).await.map_err(Into::into) })
    }

    fn list_notifications(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<NotificationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_notifications(user_id).await.map_err(Into::into) })
    }

    fn delete_notification(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.notifications().await;
            Self::delete_one(collection, "notification", id)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_notifications_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.notifications().await;
            Self::delete_many(collection, "notifications", "user_id", user_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_message(message).await.map_err(Into::into) })
    }

    fn find_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_message(id).await.map_err(Into::into) })
    }

    fn list_messages(
        &self,
        game_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_messages(game_id, limit)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.messages().await;
            Self::delete_one(collection, "message", id)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_messages_by_sender(
        &self,
        sender_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let collection = store.messages().await;
            Self::delete_many(collection, "messages", "sender_id", sender_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
