//! Account creation, password checks and bearer-session resolution.

use std::time::SystemTime;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::RngCore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::normalize_email,
    dao::models::{UserEntity, UserRole},
    dto::{
        auth::{AuthResponse, LoginRequest, SignupRequest},
        format_system_time,
        user::ProfileResponse,
    },
    error::ServiceError,
    state::SharedState,
};

const SALT_BYTES: usize = 16;

/// Authenticated caller attached to each protected request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Account id.
    pub id: Uuid,
    /// Role loaded when the token was resolved.
    pub role: UserRole,
    /// Display name copied onto chat messages.
    pub display_name: String,
    /// Bearer token the request was authenticated with.
    pub token: String,
}

impl CurrentUser {
    /// Whether the caller holds the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Hash `password` into an Argon2id PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes)
        .map_err(|err| ServiceError::Internal(format!("password salt: {err}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::Internal(format!("password hashing: {err}")))
}

/// Check `password` against a stored PHC string. Unparseable hashes never match.
fn verify_password(user: &UserEntity, password: &str) -> bool {
    match PasswordHash::new(&user.password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(user_id = %user.id, error = %err, "stored password hash is unreadable");
            false
        }
    }
}

/// Run a CPU-heavy password operation on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ServiceError::Internal(format!("password task failed: {err}")))
}

fn issue_session(state: &SharedState, user: &UserEntity) -> AuthResponse {
    let (token, session) = state.sessions().issue(user.id);
    AuthResponse {
        token,
        expires_at: format_system_time(session.expires_at),
        user: ProfileResponse::from(user),
    }
}

/// Create an account and log it in.
pub async fn signup(
    state: &SharedState,
    request: SignupRequest,
) -> Result<AuthResponse, ServiceError> {
    let store = state.require_store().await?;
    let email = normalize_email(&request.email);
    let role = if state.config().is_admin_email(&email) {
        UserRole::Admin
    } else {
        UserRole::User
    };
    let password = request.password.clone();
    let password_hash = off_runtime(move || hash_password(&password)).await??;
    let now = SystemTime::now();
    let user = UserEntity {
        id: Uuid::new_v4(),
        password_hash,
        email,
        display_name: request.display_name.trim().to_string(),
        bio: None,
        favorite_sports: Vec::new(),
        role,
        is_banned: false,
        ban_reason: None,
        games_played: 0,
        average_rating: None,
        rating_count: 0,
        created_at: now,
        updated_at: now,
    };

    store.insert_user(user.clone()).await?;
    info!(user_id = %user.id, role = ?user.role, "account created");
    Ok(issue_session(state, &user))
}

/// Check credentials and open a session.
pub async fn login(
    state: &SharedState,
    request: LoginRequest,
) -> Result<AuthResponse, ServiceError> {
    let store = state.require_store().await?;
    let email = normalize_email(&request.email);
    let candidate = store.find_user_by_email(email).await?;
    let password = request.password;
    let user = off_runtime(move || candidate.filter(|user| verify_password(user, &password)))
        .await?
        .ok_or_else(|| ServiceError::Unauthorized("invalid email or password".into()))?;

    if user.is_banned {
        warn!(user_id = %user.id, "login refused for banned account");
        return Err(ServiceError::Forbidden("account is banned".into()));
    }

    Ok(issue_session(state, &user))
}

/// Revoke the token the caller authenticated with.
pub fn logout(state: &SharedState, current: &CurrentUser) {
    state.sessions().revoke(&current.token);
}

/// Resolve a bearer token into the calling user.
///
/// Banned accounts are refused with [`ServiceError::Forbidden`], including through
/// the tokens their ban revoked, and lose every session.
pub async fn authenticate(state: &SharedState, token: &str) -> Result<CurrentUser, ServiceError> {
    let Some(user_id) = state.sessions().resolve(token) else {
        if state.sessions().is_banned_token(token) {
            return Err(ServiceError::Forbidden("account is banned".into()));
        }
        return Err(ServiceError::Unauthorized("invalid or expired session".into()));
    };
    let store = state.require_store().await?;
    let Some(user) = store.find_user(user_id).await? else {
        state.sessions().revoke_user(user_id);
        return Err(ServiceError::Unauthorized("account no longer exists".into()));
    };
    if user.is_banned {
        state.sessions().ban_user(user_id);
        return Err(ServiceError::Forbidden("account is banned".into()));
    }

    Ok(CurrentUser {
        id: user.id,
        role: user.role,
        display_name: user.display_name,
        token: token.to_string(),
    })
}

/// Full profile of the caller.
pub async fn me(state: &SharedState, current: &CurrentUser) -> Result<ProfileResponse, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_user(current.id)
        .await?
        .map(|user| ProfileResponse::from(&user))
        .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", current.id)))
}
