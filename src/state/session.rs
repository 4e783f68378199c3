//! Opaque bearer sessions, ban tombstones and the per-user revocation signal.

use std::{
    future::Future,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use rand::RngCore;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;
const REVOCATION_CHANNEL_CAPACITY: usize = 64;

/// A live login session.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    /// Account the token was issued to.
    pub user_id: Uuid,
    /// Instant after which the token no longer resolves.
    pub expires_at: SystemTime,
}

/// In-memory registry of opaque bearer tokens.
///
/// Tokens revoked by a ban are kept as tombstones until they would have expired,
/// so a banned caller is told they are banned rather than logged out.
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    tombstones: DashMap<String, Session>,
    revocations: broadcast::Sender<Uuid>,
    ttl: Duration,
}

/// Remove every entry of `map` matching `predicate`, counting inside the sweep.
fn drain_where(
    map: &DashMap<String, Session>,
    mut predicate: impl FnMut(&String, &Session) -> bool,
) -> usize {
    let mut removed = 0;
    map.retain(|token, session| {
        if predicate(token, &*session) {
            removed += 1;
            false
        } else {
            true
        }
    });
    removed
}

impl SessionRegistry {
    /// Registry issuing tokens valid for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        let (revocations, _rx) = broadcast::channel(REVOCATION_CHANNEL_CAPACITY);
        Self {
            sessions: DashMap::new(),
            tombstones: DashMap::new(),
            revocations,
            ttl,
        }
    }

    /// Create a fresh token for `user_id`.
    pub fn issue(&self, user_id: Uuid) -> (String, Session) {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let session = Session {
            user_id,
            expires_at: SystemTime::now() + self.ttl,
        };
        self.sessions.insert(token.clone(), session);
        (token, session)
    }

    /// Look up the user behind `token`, dropping it when expired.
    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let session = *self.sessions.get(token)?;
        if session.expires_at <= SystemTime::now() {
            self.sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    /// Whether `token` was cut by a ban that is still in force.
    pub fn is_banned_token(&self, token: &str) -> bool {
        let Some(session) = self.tombstones.get(token).map(|entry| *entry) else {
            return false;
        };
        if session.expires_at <= SystemTime::now() {
            self.tombstones.remove(token);
            return false;
        }
        true
    }

    /// Drop a single token (logout).
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every session belonging to `user_id`, returning how many were revoked.
    pub fn revoke_user(&self, user_id: Uuid) -> usize {
        let revoked = drain_where(&self.sessions, |_, session| session.user_id == user_id);
        self.signal(user_id);
        revoked
    }

    /// Revoke every session of `user_id` and keep the tokens as ban tombstones.
    pub fn ban_user(&self, user_id: Uuid) -> usize {
        let revoked = drain_where(&self.sessions, |token, session| {
            if session.user_id != user_id {
                return false;
            }
            self.tombstones.insert(token.clone(), *session);
            true
        });
        self.signal(user_id);
        revoked
    }

    /// Forget the ban tombstones of `user_id`; those tokens now read as logged out.
    pub fn lift_ban(&self, user_id: Uuid) -> usize {
        drain_where(&self.tombstones, |_, session| session.user_id == user_id)
    }

    /// Resolves once every session of `user_id` is revoked or banned.
    ///
    /// The subscription is taken when this is called, so revocations that happen
    /// before the future is first polled are not missed.
    pub fn revoked(&self, user_id: Uuid) -> impl Future<Output = ()> + Send + 'static + use<> {
        let mut receiver = self.revocations.subscribe();
        async move {
            loop {
                match receiver.recv().await {
                    Ok(revoked) if revoked == user_id => return,
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return,
                }
            }
        }
    }

    /// Drop expired sessions and tombstones.
    pub fn purge_expired(&self) -> usize {
        let now = SystemTime::now();
        drain_where(&self.sessions, |_, session| session.expires_at <= now)
            + drain_where(&self.tombstones, |_, session| session.expires_at <= now)
    }

    fn signal(&self, user_id: Uuid) {
        // No receiver means no open stream for anyone.
        let _ = self.revocations.send(user_id);
    }
}
