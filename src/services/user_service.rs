//! Profiles and account self-deletion.

use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::user::{ProfileResponse, PublicProfile, UpdateProfileRequest},
    error::ServiceError,
    services::{auth_service::CurrentUser, game_service},
    state::SharedState,
};

/// Profile other players may see.
pub async fn get_public_profile(
    state: &SharedState,
    id: Uuid,
) -> Result<PublicProfile, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_user(id)
        .await?
        .map(|user| PublicProfile::from(&user))
        .ok_or_else(|| ServiceError::NotFound(format!("user `{id}` not found")))
}

/// Apply a partial profile update to the caller.
pub async fn update_profile(
    state: &SharedState,
    current: &CurrentUser,
    request: UpdateProfileRequest,
) -> Result<ProfileResponse, ServiceError> {
    let store = state.require_store().await?;
    let mut user = store
        .find_user(current.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", current.id)))?;

    if let Some(display_name) = request.display_name {
        user.display_name = display_name.trim().to_string();
    }
    if let Some(bio) = request.bio {
        let bio = bio.trim();
        user.bio = (!bio.is_empty()).then(|| bio.to_string());
    }
    if let Some(sports) = request.favorite_sports {
        let mut cleaned: Vec<String> = Vec::with_capacity(sports.len());
        for sport in sports {
            let sport = sport.trim();
            if !sport.is_empty() && !cleaned.iter().any(|known| known.eq_ignore_ascii_case(sport)) {
                cleaned.push(sport.to_string());
            }
        }
        user.favorite_sports = cleaned;
    }
    user.updated_at = SystemTime::now();

    store.save_user(user.clone()).await?;
    Ok(ProfileResponse::from(&user))
}

/// Delete the caller's account and every trace of it.
///
/// Hosted games that are still open are cancelled, the user is scrubbed from the
/// rosters of every other game, and their messages, filed reports, notifications
/// and sessions are dropped.
pub async fn delete_account(state: &SharedState, current: &CurrentUser) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let user_id = current.id;

    for game in store.list_games().await? {
        if game.host_id == user_id {
            if !game.status.is_terminal() {
                game_service::force_cancel(state, game.id, Some(user_id)).await?;
            }
            continue;
        }
        if !game.is_participant(user_id) && !game.has_join_request(user_id) {
            continue;
        }
        let store = store.clone();
        let game_id = game.id;
        state
            .with_game_gate(game_id, || async move {
                let Some(mut game) = store.find_game(game_id).await? else {
                    return Ok(());
                };
                if game.purge_user(user_id) {
                    game.updated_at = SystemTime::now();
                    store.save_game(game).await?;
                }
                Ok(())
            })
            .await?;
    }

    let messages = store.delete_messages_by_sender(user_id).await?;
    let reports = store.delete_reports_by_reporter(user_id).await?;
    let notifications = store.delete_notifications_for_user(user_id).await?;
    if !store.delete_user(user_id).await? {
        warn!(user_id = %user_id, "account vanished during deletion");
    }
    let sessions = state.sessions().revoke_user(user_id);

    info!(
        user_id = %user_id,
        messages,
        reports,
        notifications,
        sessions,
        "account deleted"
    );
    Ok(())
}
