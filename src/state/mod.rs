/// Per-game chat relay.
pub mod chat;
/// Game status machine.
pub mod lifecycle;
/// Roster rules applied to a game.
pub mod roster;
/// Bearer sessions and revocation.
pub mod session;
mod sse;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{config::AppConfig, dao::store::GameOnStore, error::ServiceError};

pub use self::chat::{ChatEvent, ChatHub};
pub use self::session::SessionRegistry;
pub use self::sse::NotificationHub;

/// Handle shared by every handler and background task.
pub type SharedState = Arc<AppState>;
/// Upper bound on a gated mutation.
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(5);

const CHAT_CHANNEL_CAPACITY: usize = 64;
const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Central application state storing the storage handle, sessions and real-time hubs.
pub struct AppState {
    store: RwLock<Option<Arc<dyn GameOnStore>>>,
    config: Arc<AppConfig>,
    sessions: SessionRegistry,
    chat: ChatHub,
    notifications: NotificationHub,
    game_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    user_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    degraded: watch::Sender<bool>,
    mutation_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self::build(config, None))
    }

    /// Construct a state with `store` already installed.
    pub fn with_store(config: AppConfig, store: Arc<dyn GameOnStore>) -> SharedState {
        Arc::new(Self::build(config, Some(store)))
    }

    fn build(config: AppConfig, store: Option<Arc<dyn GameOnStore>>) -> Self {
        let (degraded_tx, _rx) = watch::channel(store.is_none());
        Self {
            store: RwLock::new(store),
            sessions: SessionRegistry::new(config.session_ttl()),
            config: Arc::new(config),
            chat: ChatHub::new(CHAT_CHANNEL_CAPACITY),
            notifications: NotificationHub::new(NOTIFICATION_CHANNEL_CAPACITY),
            game_gates: DashMap::new(),
            user_gates: DashMap::new(),
            degraded: degraded_tx,
            mutation_timeout: Some(DEFAULT_MUTATION_TIMEOUT),
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn GameOnStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// The current store, or [`ServiceError::Degraded`] while none is installed.
    pub async fn require_store(&self) -> Result<Arc<dyn GameOnStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn GameOnStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bearer sessions and revocation signals.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Per-game chat relay.
    pub fn chat(&self) -> &ChatHub {
        &self.chat
    }

    /// Broadcast hub feeding the notification SSE streams.
    pub fn notifications(&self) -> &NotificationHub {
        &self.notifications
    }

    /// Override the bound applied to gated game mutations. `None` disables it.
    pub fn set_mutation_timeout(&mut self, limit: Option<Duration>) {
        self.mutation_timeout = limit;
    }

    /// Run `work` while holding the exclusive gate of `game_id`.
    ///
    /// Mutations of the same game queue behind each other; `work` is abandoned with
    /// [`ServiceError::Timeout`] when it outlives the mutation timeout.
    pub async fn with_game_gate<F, Fut, T>(&self, game_id: Uuid, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.with_gate(&self.game_gates, "game", game_id, work).await
    }

    /// Run `work` while holding the exclusive gate of `user_id`, for read-modify-write
    /// updates of a user document. Same timeout as [`Self::with_game_gate`].
    pub async fn with_user_gate<F, Fut, T>(&self, user_id: Uuid, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        self.with_gate(&self.user_gates, "user", user_id, work).await
    }

    async fn with_gate<F, Fut, T>(
        &self,
        gates: &DashMap<Uuid, Arc<Mutex<()>>>,
        kind: &'static str,
        key: Uuid,
        work: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = gates.entry(key).or_default().clone();
        let outcome = {
            let _guard = gate.lock().await;
            let work_future = work();
            match self.mutation_timeout {
                Some(limit) => match timeout(limit, work_future).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(kind, id = %key, "gated mutation timed out");
                        Err(ServiceError::Timeout)
                    }
                },
                None => work_future.await,
            }
        };
        drop(gate);
        gates.remove_if(&key, |_, gate| Arc::strong_count(gate) == 1);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dao::store::MemoryStore;

    #[tokio::test]
    async fn degraded_until_store_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));

        let mut watcher = state.degraded_watcher();
        state.set_store(Arc::new(MemoryStore::new())).await;
        assert!(!state.is_degraded().await);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded().await);
    }

    #[tokio::test]
    async fn game_gate_serializes_work_and_is_released() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        let game = Uuid::new_v4();
        let inside = Arc::new(AtomicUsize::new(0));

        let run = |inside: Arc<AtomicUsize>| {
            let state = state.clone();
            async move {
                state
                    .with_game_gate(game, || async move {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, ServiceError>(())
                    })
                    .await
            }
        };

        let (a, b) = tokio::join!(run(inside.clone()), run(inside.clone()));
        assert!(a.is_ok() && b.is_ok());
        assert!(state.game_gates.is_empty());
    }

    #[tokio::test]
    async fn user_gates_are_independent_of_game_gates() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        let id = Uuid::new_v4();
        let nested = state
            .with_game_gate(id, || async {
                state
                    .with_user_gate(id, || async { Ok::<_, ServiceError>(7) })
                    .await
            })
            .await;
        assert_eq!(nested.unwrap(), 7);
        assert!(state.user_gates.is_empty());
    }

    #[tokio::test]
    async fn game_gate_times_out() {
        let mut raw = AppState::build(AppConfig::default(), None);
        raw.set_mutation_timeout(Some(Duration::from_millis(5)));
        let result = raw
            .with_game_gate(Uuid::new_v4(), || async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ServiceError>(())
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Timeout)));
    }
}
