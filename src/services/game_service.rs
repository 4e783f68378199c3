//! Game hosting workflow. Every mutation of a game runs under its per-game gate
//! as a single load, apply, save step; notifications are sent once the gate is
//! released.

use std::{sync::Arc, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameEntity, GameStatus, NotificationKind},
        store::GameOnStore,
    },
    dto::{
        game::{
            AttendanceRequest, CreateGameRequest, GameListQuery, GameSummary, JoinResponse,
            RatingRequest, TeamsRequest, TransferHostRequest, UpdateGameRequest,
        },
        parse_system_time,
    },
    error::ServiceError,
    services::{auth_service::CurrentUser, notification_service},
    state::{
        SharedState,
        lifecycle::GameEvent,
        roster::{JoinOutcome, LeaveOutcome},
    },
};

pub(crate) async fn load_game(
    store: &Arc<dyn GameOnStore>,
    id: Uuid,
) -> Result<GameEntity, ServiceError> {
    store
        .find_game(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{id}` not found")))
}

fn ensure_host(game: &GameEntity, current: &CurrentUser) -> Result<(), ServiceError> {
    if game.host_id != current.id {
        return Err(ServiceError::Forbidden(
            "only the host can manage this game".into(),
        ));
    }
    Ok(())
}

fn parse_future_start(value: &str) -> Result<SystemTime, ServiceError> {
    let starts_at = parse_system_time(value).map_err(|err| {
        ServiceError::InvalidInput(format!("starts_at must be an RFC 3339 timestamp: {err}"))
    })?;
    if starts_at <= SystemTime::now() {
        return Err(ServiceError::InvalidInput(
            "starts_at must be in the future".into(),
        ));
    }
    Ok(starts_at)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Load, modify and persist a game while holding its gate.
async fn mutate_game<T, F>(
    state: &SharedState,
    game_id: Uuid,
    apply: F,
) -> Result<(GameEntity, T), ServiceError>
where
    F: FnOnce(&mut GameEntity) -> Result<T, ServiceError>,
{
    let store = state.require_store().await?;
    state
        .with_game_gate(game_id, || async move {
            let mut game = load_game(&store, game_id).await?;
            let value = apply(&mut game)?;
            game.updated_at = SystemTime::now();
            store.save_game(game.clone()).await?;
            Ok((game, value))
        })
        .await
}

/// Host a new upcoming game with the caller as host.
pub async fn create_game(
    state: &SharedState,
    current: &CurrentUser,
    request: CreateGameRequest,
) -> Result<GameSummary, ServiceError> {
    let store = state.require_store().await?;
    let starts_at = parse_future_start(&request.starts_at)?;
    let now = SystemTime::now();
    let game = GameEntity {
        id: Uuid::new_v4(),
        title: request.title.trim().to_string(),
        sport: request.sport.trim().to_string(),
        description: non_empty(request.description),
        location: request.location.into(),
        starts_at,
        max_players: request.max_players,
        skill_level: request.skill_level,
        requires_approval: request.requires_approval,
        host_id: current.id,
        status: GameStatus::Upcoming,
        registered_players: Vec::new(),
        join_requests: Vec::new(),
        team_blue: Vec::new(),
        team_red: Vec::new(),
        attendance: Vec::new(),
        ratings: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    store.save_game(game.clone()).await?;
    info!(game_id = %game.id, host_id = %current.id, sport = %game.sport, "game created");
    Ok(GameSummary::from(&game))
}

/// Games matching every filter in `query`, soonest first.
pub async fn list_games(
    state: &SharedState,
    query: &GameListQuery,
) -> Result<Vec<GameSummary>, ServiceError> {
    let store = state.require_store().await?;
    let games = store.list_games().await?;
    Ok(games
        .iter()
        .filter(|game| query.matches(game))
        .map(GameSummary::from)
        .collect())
}

/// Load one game.
pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameSummary, ServiceError> {
    let store = state.require_store().await?;
    Ok(GameSummary::from(&load_game(&store, id).await?))
}

/// Games the caller hosts or is registered in, soonest first.
pub async fn my_games(
    state: &SharedState,
    current: &CurrentUser,
) -> Result<Vec<GameSummary>, ServiceError> {
    let store = state.require_store().await?;
    let games = store.list_games().await?;
    Ok(games
        .iter()
        .filter(|game| game.is_participant(current.id))
        .map(GameSummary::from)
        .collect())
}

/// Apply a host edit to an upcoming game.
pub async fn update_game(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    request: UpdateGameRequest,
) -> Result<GameSummary, ServiceError> {
    let starts_at = request
        .starts_at
        .as_deref()
        .map(parse_future_start)
        .transpose()?;

    let (game, ()) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        if game.status != GameStatus::Upcoming {
            return Err(ServiceError::InvalidState(format!(
                "game is {:?}; only upcoming games can be edited",
                game.status
            )));
        }
        if let Some(max_players) = request.max_players {
            game.set_max_players(max_players)?;
        }
        if let Some(title) = non_empty(request.title) {
            game.title = title;
        }
        if let Some(sport) = non_empty(request.sport) {
            game.sport = sport;
        }
        if let Some(description) = request.description {
            game.description = non_empty(Some(description));
        }
        if let Some(location) = request.location {
            game.location = location.into();
        }
        if let Some(starts_at) = starts_at {
            game.starts_at = starts_at;
        }
        if let Some(skill_level) = request.skill_level {
            game.skill_level = skill_level;
        }
        if let Some(requires_approval) = request.requires_approval {
            game.requires_approval = requires_approval;
        }
        Ok(())
    })
    .await?;

    Ok(GameSummary::from(&game))
}

/// Register the caller, or file a join request when the host approves players.
pub async fn join_game(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<JoinResponse, ServiceError> {
    let (game, outcome) = mutate_game(state, id, |game| {
        Ok(game.join(current.id, SystemTime::now())?)
    })
    .await?;

    let (kind, message) = match outcome {
        JoinOutcome::Registered => (
            NotificationKind::PlayerJoined,
            format!("{} joined {}", current.display_name, game.title),
        ),
        JoinOutcome::Requested => (
            NotificationKind::JoinRequested,
            format!("{} asked to join {}", current.display_name, game.title),
        ),
    };
    notification_service::notify(state, game.host_id, kind, message, Some(game.id)).await;
    info!(game_id = %id, user_id = %current.id, outcome = ?outcome, "join processed");

    Ok(JoinResponse {
        status: outcome.into(),
        game: GameSummary::from(&game),
    })
}

/// Register a pending requester and notify them.
pub async fn approve_request(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    user_id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let (game, ()) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        Ok(game.approve_request(user_id)?)
    })
    .await?;

    notification_service::notify(
        state,
        user_id,
        NotificationKind::RequestApproved,
        format!("Your request to join {} was approved", game.title),
        Some(game.id),
    )
    .await;
    Ok(GameSummary::from(&game))
}

/// Drop a pending request and notify the requester.
pub async fn reject_request(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    user_id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let (game, ()) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        Ok(game.reject_request(user_id)?)
    })
    .await?;

    notification_service::notify(
        state,
        user_id,
        NotificationKind::RequestRejected,
        format!("Your request to join {} was declined", game.title),
        Some(game.id),
    )
    .await;
    Ok(GameSummary::from(&game))
}

/// Leave the roster, or withdraw a pending join request.
pub async fn leave_game(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let (game, outcome) = mutate_game(state, id, |game| Ok(game.leave(current.id)?)).await?;

    if outcome == LeaveOutcome::LeftRoster {
        notification_service::notify(
            state,
            game.host_id,
            NotificationKind::PlayerLeft,
            format!("{} left {}", current.display_name, game.title),
            Some(game.id),
        )
        .await;
    }
    Ok(GameSummary::from(&game))
}

/// Remove a registered player and notify them.
pub async fn kick_player(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    user_id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let (game, ()) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        Ok(game.kick(user_id)?)
    })
    .await?;

    notification_service::notify(
        state,
        user_id,
        NotificationKind::Kicked,
        format!("You were removed from {}", game.title),
        Some(game.id),
    )
    .await;
    Ok(GameSummary::from(&game))
}

/// Hand the game to a registered player, who takes the caller's roster slot.
pub async fn transfer_host(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    request: TransferHostRequest,
) -> Result<GameSummary, ServiceError> {
    let new_host_id = request.new_host_id;
    let (game, previous) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        Ok(game.transfer_host(new_host_id)?)
    })
    .await?;

    info!(game_id = %id, from = %previous, to = %new_host_id, "host transferred");
    notification_service::notify(
        state,
        new_host_id,
        NotificationKind::HostTransferred,
        format!("You are now hosting {}", game.title),
        Some(game.id),
    )
    .await;
    Ok(GameSummary::from(&game))
}

/// Replace both team line-ups.
pub async fn set_teams(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    request: TeamsRequest,
) -> Result<GameSummary, ServiceError> {
    let (game, ()) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        Ok(game.assign_teams(request.team_blue, request.team_red)?)
    })
    .await?;
    Ok(GameSummary::from(&game))
}

/// Move an upcoming game to ongoing.
pub async fn start_game(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let (game, _) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        Ok(game.apply_event(GameEvent::Start)?)
    })
    .await?;
    info!(game_id = %id, "game started");
    Ok(GameSummary::from(&game))
}

/// Record attendance; the last missing record completes the game.
pub async fn record_attendance(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    request: AttendanceRequest,
) -> Result<GameSummary, ServiceError> {
    let (game, completed) = mutate_game(state, id, |game| {
        ensure_host(game, current)?;
        Ok(game.record_attendance(request.user_id, request.attended, SystemTime::now())?)
    })
    .await?;

    if completed {
        on_game_completed(state, &game).await;
    }
    Ok(GameSummary::from(&game))
}

/// Credit attendees and tell every participant. The game is already committed, so
/// profile refresh failures are logged and left for the next refresh to repair.
async fn on_game_completed(state: &SharedState, game: &GameEntity) {
    let attendees = game.attendees();
    for user_id in &attendees {
        if let Err(err) = refresh_player_stats(state, *user_id).await {
            warn!(game_id = %game.id, user_id = %user_id, error = %err, "failed to credit attendee");
        }
    }
    info!(game_id = %game.id, attendees = attendees.len(), "game completed");

    let message = format!("{} is complete; you can now rate the other players", game.title);
    notification_service::notify_all(
        state,
        game.participants(),
        NotificationKind::GameCompleted,
        &message,
        Some(game.id),
    )
    .await;
}

/// Recompute `games_played` and the rating aggregate of `user_id` from stored games.
///
/// Runs under the user's gate so concurrent refreshes cannot write stale totals, and
/// always rebuilds from scratch so an earlier failed refresh is repaired by the next.
pub(crate) async fn refresh_player_stats(
    state: &SharedState,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    state
        .with_user_gate(user_id, || async move {
            let games = store.list_games().await?;
            let Some(mut user) = store.find_user(user_id).await? else {
                warn!(user_id = %user_id, "player no longer exists");
                return Ok(());
            };

            let games_played = games
                .iter()
                .filter(|game| game.status == GameStatus::Completed)
                .filter(|game| game.attendees().contains(&user_id))
                .count();
            let scores: Vec<u32> = games
                .iter()
                .flat_map(|game| &game.ratings)
                .filter(|rating| rating.target_id == user_id)
                .map(|rating| u32::from(rating.score))
                .collect();

            user.games_played = u32::try_from(games_played).unwrap_or(u32::MAX);
            user.rating_count = u32::try_from(scores.len()).unwrap_or(u32::MAX);
            user.average_rating = (!scores.is_empty()).then(|| {
                f64::from(scores.iter().sum::<u32>()) / scores.len() as f64
            });
            user.updated_at = SystemTime::now();
            store.save_user(user).await?;
            Ok(())
        })
        .await
}

/// Cancel a game on behalf of its host or an administrator.
pub async fn cancel_game(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
) -> Result<GameSummary, ServiceError> {
    let (game, ()) = mutate_game(state, id, |game| {
        if !current.is_admin() {
            ensure_host(game, current)?;
        }
        game.apply_event(GameEvent::Cancel)?;
        Ok(())
    })
    .await?;

    info!(game_id = %id, by = %current.id, "game cancelled");
    notify_cancelled(state, &game, Some(current.id)).await;
    Ok(GameSummary::from(&game))
}

/// Cancel a game without an acting user (moderation and account deletion).
pub(crate) async fn force_cancel(
    state: &SharedState,
    id: Uuid,
    skip_notify: Option<Uuid>,
) -> Result<GameEntity, ServiceError> {
    let (game, _) = mutate_game(state, id, |game| Ok(game.apply_event(GameEvent::Cancel)?)).await?;
    info!(game_id = %id, "game cancelled by moderation");
    notify_cancelled(state, &game, skip_notify).await;
    Ok(game)
}

async fn notify_cancelled(state: &SharedState, game: &GameEntity, actor: Option<Uuid>) {
    let message = format!("{} has been cancelled", game.title);
    let recipients: Vec<Uuid> = game
        .participants()
        .filter(|user| Some(*user) != actor)
        .collect();
    notification_service::notify_all(
        state,
        recipients,
        NotificationKind::GameCancelled,
        &message,
        Some(game.id),
    )
    .await;
}

/// Rate another participant of a completed game and fold the score into their profile.
pub async fn rate_player(
    state: &SharedState,
    current: &CurrentUser,
    id: Uuid,
    request: RatingRequest,
) -> Result<GameSummary, ServiceError> {
    let target_id = request.user_id;
    let score = request.score;
    let (game, ()) = mutate_game(state, id, |game| {
        Ok(game.add_rating(current.id, target_id, score)?)
    })
    .await?;

    if let Err(err) = refresh_player_stats(state, target_id).await {
        warn!(game_id = %id, user_id = %target_id, error = %err, "rating stored but profile not refreshed");
    }
    Ok(GameSummary::from(&game))
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{
                MessageEntity, NotificationEntity, ReportEntity, SkillLevel, UserEntity, UserRole,
            },
            storage::{StorageError, StorageResult},
            store::MemoryStore,
        },
        dto::{
            format_system_time,
            game::{JoinStatus, LocationDto},
        },
        state::AppState,
    };

    async fn user(store: &MemoryStore, name: &str, role: UserRole) -> CurrentUser {
        let now = SystemTime::now();
        let entity = UserEntity {
            id: Uuid::new_v4(),
            email: format!("{name}@example.com"),
            display_name: name.into(),
            bio: None,
            favorite_sports: Vec::new(),
            role,
            is_banned: false,
            ban_reason: None,
            games_played: 0,
            average_rating: None,
            rating_count: 0,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        };
        let current = CurrentUser {
            id: entity.id,
            role,
            display_name: entity.display_name.clone(),
            token: String::new(),
        };
        store.save_user(entity).await.unwrap();
        current
    }

    fn create_request(max_players: u32, requires_approval: bool) -> CreateGameRequest {
        CreateGameRequest {
            title: "Evening hoops".into(),
            sport: "basketball".into(),
            description: Some("  ".into()),
            location: LocationDto {
                address: "Court 3, Riverside".into(),
                latitude: Some(48.85),
                longitude: Some(2.35),
            },
            starts_at: format_system_time(SystemTime::now() + Duration::from_secs(3600)),
            max_players,
            skill_level: SkillLevel::Intermediate,
            requires_approval,
        }
    }

    fn setup() -> (SharedState, MemoryStore) {
        let store = MemoryStore::new();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone()));
        (state, store)
    }

    async fn kinds_for(state: &SharedState, user: Uuid) -> Vec<NotificationKind> {
        let store = state.require_store().await.unwrap();
        store
            .list_notifications(user)
            .await
            .unwrap()
            .into_iter()
            .map(|notification| notification.kind)
            .collect()
    }

    #[tokio::test]
    async fn create_rejects_past_start() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let mut request = create_request(4, false);
        request.starts_at = "2001-01-01T00:00:00Z".into();
        assert!(matches!(
            create_game(&state, &host, request).await,
            Err(ServiceError::InvalidInput(_))
        ));

        let created = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        assert_eq!(created.status, GameStatus::Upcoming);
        assert_eq!(created.description, None);
        assert_eq!(created.player_count, 1);
    }

    #[tokio::test]
    async fn join_notifies_host_and_honours_approval() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let player = user(&store, "player", UserRole::User).await;
        let game = create_game(&state, &host, create_request(4, true))
            .await
            .unwrap();

        let joined = join_game(&state, &player, game.id).await.unwrap();
        assert_eq!(joined.status, JoinStatus::Requested);
        assert!(joined.game.registered_players.is_empty());
        assert_eq!(
            kinds_for(&state, host.id).await,
            vec![NotificationKind::JoinRequested]
        );

        assert!(matches!(
            approve_request(&state, &player, game.id, player.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        let approved = approve_request(&state, &host, game.id, player.id)
            .await
            .unwrap();
        assert_eq!(approved.registered_players, vec![player.id]);
        assert_eq!(
            kinds_for(&state, player.id).await,
            vec![NotificationKind::RequestApproved]
        );
    }

    #[tokio::test]
    async fn concurrent_joins_never_overfill() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let game = create_game(&state, &host, create_request(3, false))
            .await
            .unwrap();
        let mut players = Vec::new();
        for i in 0..6 {
            players.push(user(&store, &format!("p{i}"), UserRole::User).await);
        }

        let attempts = players.iter().map(|player| join_game(&state, player, game.id));
        let results = futures::future::join_all(attempts).await;
        let joined = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(joined, 2);
        assert!(
            results
                .iter()
                .filter_map(|result| result.as_ref().err())
                .all(|err| matches!(err, ServiceError::Conflict(_)))
        );

        let stored = get_game(&state, game.id).await.unwrap();
        assert_eq!(stored.player_count, 3);
    }

    #[tokio::test]
    async fn transfer_then_old_host_can_leave() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let player = user(&store, "player", UserRole::User).await;
        let game = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        join_game(&state, &player, game.id).await.unwrap();

        assert!(matches!(
            leave_game(&state, &host, game.id).await,
            Err(ServiceError::InvalidInput(_))
        ));
        let moved = transfer_host(
            &state,
            &host,
            game.id,
            TransferHostRequest {
                new_host_id: player.id,
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.host_id, player.id);
        assert_eq!(moved.registered_players, vec![host.id]);

        let left = leave_game(&state, &host, game.id).await.unwrap();
        assert!(left.registered_players.is_empty());
        assert!(kinds_for(&state, player.id)
            .await
            .contains(&NotificationKind::HostTransferred));
    }

    #[tokio::test]
    async fn attendance_completes_game_and_ratings_update_profile() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let player = user(&store, "player", UserRole::User).await;
        let game = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        join_game(&state, &player, game.id).await.unwrap();
        start_game(&state, &host, game.id).await.unwrap();

        let mark = |user_id, attended| AttendanceRequest { user_id, attended };
        let partial = record_attendance(&state, &host, game.id, mark(host.id, true))
            .await
            .unwrap();
        assert_eq!(partial.status, GameStatus::Ongoing);
        let done = record_attendance(&state, &host, game.id, mark(player.id, true))
            .await
            .unwrap();
        assert_eq!(done.status, GameStatus::Completed);

        let profile = store.find_user(player.id).await.unwrap().unwrap();
        assert_eq!(profile.games_played, 1);

        rate_player(&state, &host, game.id, RatingRequest { user_id: player.id, score: 4 })
            .await
            .unwrap();
        assert!(matches!(
            rate_player(&state, &host, game.id, RatingRequest { user_id: player.id, score: 2 })
                .await,
            Err(ServiceError::Conflict(_))
        ));
        let rated = store.find_user(player.id).await.unwrap().unwrap();
        assert_eq!(rated.rating_count, 1);
        assert_eq!(rated.average_rating, Some(4.0));
    }

    #[tokio::test]
    async fn admin_can_cancel_and_players_are_notified() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let player = user(&store, "player", UserRole::User).await;
        let admin = user(&store, "admin", UserRole::Admin).await;
        let game = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        join_game(&state, &player, game.id).await.unwrap();

        assert!(matches!(
            cancel_game(&state, &player, game.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        let cancelled = cancel_game(&state, &admin, game.id).await.unwrap();
        assert_eq!(cancelled.status, GameStatus::Cancelled);
        assert!(kinds_for(&state, player.id)
            .await
            .contains(&NotificationKind::GameCancelled));
        assert!(matches!(
            cancel_game(&state, &host, game.id).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn update_refuses_capacity_below_roster() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let player = user(&store, "player", UserRole::User).await;
        let game = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        join_game(&state, &player, game.id).await.unwrap();

        let shrink = UpdateGameRequest {
            max_players: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            update_game(&state, &host, game.id, shrink).await,
            Err(ServiceError::InvalidInput(_))
        ));
        let rename = UpdateGameRequest {
            title: Some(" Late hoops ".into()),
            max_players: Some(2),
            ..Default::default()
        };
        let updated = update_game(&state, &host, game.id, rename).await.unwrap();
        assert_eq!(updated.title, "Late hoops");
        assert_eq!(updated.max_players, 2);
    }

    #[tokio::test]
    async fn listing_filters_and_my_games() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let other = user(&store, "other", UserRole::User).await;
        create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        let mut tennis = create_request(2, false);
        tennis.sport = "tennis".into();
        tennis.title = "Doubles practice".into();
        create_game(&state, &other, tennis).await.unwrap();

        let query = GameListQuery {
            sport: Some("Tennis".into()),
            ..Default::default()
        };
        let found = list_games(&state, &query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Doubles practice");

        let query = GameListQuery {
            q: Some("riverside".into()),
            ..Default::default()
        };
        assert_eq!(list_games(&state, &query).await.unwrap().len(), 2);
        assert_eq!(my_games(&state, &host).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_status_skill_and_host() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let other = user(&store, "other", UserRole::User).await;
        let started = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        start_game(&state, &host, started.id).await.unwrap();
        let mut casual = create_request(4, false);
        casual.skill_level = SkillLevel::Beginner;
        let open = create_game(&state, &other, casual).await.unwrap();

        let by_status = GameListQuery {
            status: Some(GameStatus::Ongoing),
            ..Default::default()
        };
        let found = list_games(&state, &by_status).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, started.id);

        let by_skill = GameListQuery {
            skill_level: Some(SkillLevel::Beginner),
            ..Default::default()
        };
        let found = list_games(&state, &by_skill).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, open.id);

        let by_host = GameListQuery {
            host_id: Some(host.id),
            status: Some(GameStatus::Upcoming),
            ..Default::default()
        };
        assert!(list_games(&state, &by_host).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_is_refused_once_the_game_started() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let game = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        start_game(&state, &host, game.id).await.unwrap();

        let rename = UpdateGameRequest {
            title: Some("Too late".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_game(&state, &host, game.id, rename).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert_eq!(get_game(&state, game.id).await.unwrap().title, "Evening hoops");
    }

    #[tokio::test]
    async fn rejected_and_kicked_players_are_notified() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let hopeful = user(&store, "hopeful", UserRole::User).await;
        let regular = user(&store, "regular", UserRole::User).await;
        let game = create_game(&state, &host, create_request(4, true))
            .await
            .unwrap();

        join_game(&state, &hopeful, game.id).await.unwrap();
        join_game(&state, &regular, game.id).await.unwrap();
        approve_request(&state, &host, game.id, regular.id)
            .await
            .unwrap();

        let rejected = reject_request(&state, &host, game.id, hopeful.id)
            .await
            .unwrap();
        assert!(rejected.join_requests.is_empty());
        assert_eq!(
            kinds_for(&state, hopeful.id).await,
            vec![NotificationKind::RequestRejected]
        );

        assert!(matches!(
            kick_player(&state, &regular, game.id, host.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        let kicked = kick_player(&state, &host, game.id, regular.id)
            .await
            .unwrap();
        assert!(kicked.registered_players.is_empty());
        assert!(kinds_for(&state, regular.id)
            .await
            .contains(&NotificationKind::Kicked));
    }

    async fn completed_game(
        state: &SharedState,
        host: &CurrentUser,
        players: &[&CurrentUser],
    ) -> Uuid {
        let game = create_game(state, host, create_request(8, false))
            .await
            .unwrap();
        for player in players {
            join_game(state, player, game.id).await.unwrap();
        }
        start_game(state, host, game.id).await.unwrap();
        let everyone = std::iter::once(host.id).chain(players.iter().map(|player| player.id));
        for user_id in everyone.collect::<Vec<_>>() {
            record_attendance(state, host, game.id, AttendanceRequest { user_id, attended: true })
                .await
                .unwrap();
        }
        game.id
    }

    #[tokio::test]
    async fn concurrent_ratings_are_all_counted() {
        let (state, store) = setup();
        let host = user(&store, "host", UserRole::User).await;
        let target = user(&store, "target", UserRole::User).await;
        let raters = [
            user(&store, "r1", UserRole::User).await,
            user(&store, "r2", UserRole::User).await,
            user(&store, "r3", UserRole::User).await,
        ];
        let roster: Vec<&CurrentUser> = std::iter::once(&target).chain(raters.iter()).collect();
        let game_id = completed_game(&state, &host, &roster).await;

        let ratings = raters.iter().zip([2u8, 3, 5]).map(|(rater, score)| {
            rate_player(&state, rater, game_id, RatingRequest { user_id: target.id, score })
        });
        for result in futures::future::join_all(ratings).await {
            result.unwrap();
        }

        let profile = store.find_user(target.id).await.unwrap().unwrap();
        assert_eq!(profile.rating_count, 3);
        assert_eq!(profile.average_rating, Some(10.0 / 3.0));
        assert_eq!(profile.games_played, 1);
    }

    /// Memory store whose user writes can be switched off.
    #[derive(Clone)]
    struct FlakyUserWrites {
        inner: MemoryStore,
        failing: Arc<AtomicBool>,
    }

    impl GameOnStore for FlakyUserWrites {
        fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_user(user)
        }
        fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
            if self.failing.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(StorageError::unavailable(
                        "user writes disabled".into(),
                        std::io::Error::other("disabled"),
                    ))
                });
            }
            self.inner.save_user(user)
        }
        fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            self.inner.find_user(id)
        }
        fn find_user_by_email(
            &self,
            email: String,
        ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            self.inner.find_user_by_email(email)
        }
        fn list_users(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
            self.inner.list_users()
        }
        fn delete_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_user(id)
        }
        fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_game(game)
        }
        fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
            self.inner.find_game(id)
        }
        fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameEntity>>> {
            self.inner.list_games()
        }
        fn save_report(&self, report: ReportEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_report(report)
        }
        fn find_report(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ReportEntity>>> {
            self.inner.find_report(id)
        }
        fn list_reports(&self) -> BoxFuture<'static, StorageResult<Vec<ReportEntity>>> {
            self.inner.list_reports()
        }
        fn delete_reports_by_reporter(
            &self,
            reporter_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            self.inner.delete_reports_by_reporter(reporter_id)
        }
        fn save_notification(
            &self,
            notification: NotificationEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_notification(notification)
        }
        fn find_notification(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<NotificationEntity>>> {
            self.inner.find_notification(id)
        }
        fn list_notifications(
            &self,
            user_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<NotificationEntity>>> {
            self.inner.list_notifications(user_id)
        }
        fn delete_notification(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_notification(id)
        }
        fn delete_notifications_for_user(
            &self,
            user_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            self.inner.delete_notifications_for_user(user_id)
        }
        fn save_message(&self, message: MessageEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_message(message)
        }
        fn find_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MessageEntity>>> {
            self.inner.find_message(id)
        }
        fn list_messages(
            &self,
            game_id: Uuid,
            limit: usize,
        ) -> BoxFuture<'static, StorageResult<Vec<MessageEntity>>> {
            self.inner.list_messages(game_id, limit)
        }
        fn delete_message(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_message(id)
        }
        fn delete_messages_by_sender(
            &self,
            sender_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            self.inner.delete_messages_by_sender(sender_id)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn completion_survives_failed_profile_writes_and_heals_later() {
        let inner = MemoryStore::new();
        let failing = Arc::new(AtomicBool::new(false));
        let flaky = FlakyUserWrites {
            inner: inner.clone(),
            failing: failing.clone(),
        };
        let state = AppState::with_store(AppConfig::default(), Arc::new(flaky));
        let host = user(&inner, "host", UserRole::User).await;
        let player = user(&inner, "player", UserRole::User).await;
        let game = create_game(&state, &host, create_request(4, false))
            .await
            .unwrap();
        join_game(&state, &player, game.id).await.unwrap();
        start_game(&state, &host, game.id).await.unwrap();
        record_attendance(&state, &host, game.id, AttendanceRequest { user_id: host.id, attended: true })
            .await
            .unwrap();

        failing.store(true, Ordering::SeqCst);
        let done = record_attendance(
            &state,
            &host,
            game.id,
            AttendanceRequest {
                user_id: player.id,
                attended: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(done.status, GameStatus::Completed);
        assert_eq!(inner.find_user(player.id).await.unwrap().unwrap().games_played, 0);
        assert!(kinds_for(&state, player.id)
            .await
            .contains(&NotificationKind::GameCompleted));

        rate_player(&state, &host, game.id, RatingRequest { user_id: player.id, score: 5 })
            .await
            .unwrap();

        failing.store(false, Ordering::SeqCst);
        refresh_player_stats(&state, player.id).await.unwrap();
        let healed = inner.find_user(player.id).await.unwrap().unwrap();
        assert_eq!(healed.games_played, 1);
        assert_eq!(healed.rating_count, 1);
        assert_eq!(healed.average_rating, Some(5.0));
    }
}
