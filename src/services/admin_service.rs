//! Business logic powering the admin REST routes: account moderation, game
//! oversight and dashboard counters. Role checks happen in the admin router.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{GameStatus, NotificationKind, ReportStatus, UserEntity, UserRole},
    dto::{
        admin::{GameStatusCounts, StatsResponse},
        game::GameSummary,
        user::ProfileResponse,
    },
    error::ServiceError,
    services::{auth_service::CurrentUser, notification_service},
    state::SharedState,
};

async fn load_user(state: &SharedState, id: Uuid) -> Result<UserEntity, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_user(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{id}` not found")))
}

/// Every account, for the moderation dashboard.
pub async fn list_users(state: &SharedState) -> Result<Vec<ProfileResponse>, ServiceError> {
    let store = state.require_store().await?;
    let users = store.list_users().await?;
    Ok(users.iter().map(ProfileResponse::from).collect())
}

/// Ban an account, cutting every open session.
pub async fn ban_user(
    state: &SharedState,
    admin: &CurrentUser,
    id: Uuid,
    reason: String,
) -> Result<ProfileResponse, ServiceError> {
    if id == admin.id {
        return Err(ServiceError::InvalidInput("admins cannot ban themselves".into()));
    }
    let mut user = load_user(state, id).await?;
    let reason = reason.trim().to_string();
    user.is_banned = true;
    user.ban_reason = Some(reason.clone());
    user.updated_at = SystemTime::now();
    state.require_store().await?.save_user(user.clone()).await?;

    let sessions = state.sessions().ban_user(id);
    info!(user_id = %id, by = %admin.id, sessions, "user banned");
    notification_service::notify(
        state,
        id,
        NotificationKind::Banned,
        format!("Your account has been banned: {reason}"),
        None,
    )
    .await;
    Ok(ProfileResponse::from(&user))
}

/// Lift a ban; tokens cut by the ban stay revoked.
pub async fn unban_user(
    state: &SharedState,
    admin: &CurrentUser,
    id: Uuid,
) -> Result<ProfileResponse, ServiceError> {
    let mut user = load_user(state, id).await?;
    if !user.is_banned {
        return Err(ServiceError::InvalidState(format!("user `{id}` is not banned")));
    }
    user.is_banned = false;
    user.ban_reason = None;
    user.updated_at = SystemTime::now();
    state.require_store().await?.save_user(user.clone()).await?;
    state.sessions().lift_ban(id);

    info!(user_id = %id, by = %admin.id, "user unbanned");
    notification_service::notify(
        state,
        id,
        NotificationKind::Unbanned,
        "Your account has been reinstated",
        None,
    )
    .await;
    Ok(ProfileResponse::from(&user))
}

/// Promote or demote an account.
pub async fn set_role(
    state: &SharedState,
    admin: &CurrentUser,
    id: Uuid,
    role: UserRole,
) -> Result<ProfileResponse, ServiceError> {
    if id == admin.id && role != UserRole::Admin {
        return Err(ServiceError::InvalidInput(
            "admins cannot remove their own admin role".into(),
        ));
    }
    let mut user = load_user(state, id).await?;
    if user.role != role {
        user.role = role;
        user.updated_at = SystemTime::now();
        state.require_store().await?.save_user(user.clone()).await?;
        info!(user_id = %id, by = %admin.id, role = ?role, "role changed");
    }
    Ok(ProfileResponse::from(&user))
}

/// Every game regardless of status, soonest first.
pub async fn list_games(state: &SharedState) -> Result<Vec<GameSummary>, ServiceError> {
    let store = state.require_store().await?;
    let games = store.list_games().await?;
    Ok(games.iter().map(GameSummary::from).collect())
}

/// Dashboard counters over users, games and reports.
pub async fn stats(state: &SharedState) -> Result<StatsResponse, ServiceError> {
    let store = state.require_store().await?;
    let users = store.list_users().await?;
    let games = store.list_games().await?;
    let reports = store.list_reports().await?;

    let mut games_by_status = GameStatusCounts::default();
    for game in &games {
        let slot = match game.status {
            GameStatus::Upcoming => &mut games_by_status.upcoming,
            GameStatus::Ongoing => &mut games_by_status.ongoing,
            GameStatus::Completed => &mut games_by_status.completed,
            GameStatus::Cancelled => &mut games_by_status.cancelled,
        };
        *slot += 1;
    }

    Ok(StatsResponse {
        users: users.len(),
        banned_users: users.iter().filter(|user| user.is_banned).count(),
        admins: users
            .iter()
            .filter(|user| user.role == UserRole::Admin)
            .count(),
        games: games.len(),
        games_by_status,
        pending_reports: reports
            .iter()
            .filter(|report| report.status == ReportStatus::Pending)
            .count(),
        total_reports: reports.len(),
    })
}
