//! Per-game chat: history, posting through REST or WebSocket, and the live relay.

use std::{sync::Arc, time::SystemTime};

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{
        broadcast::error::RecvError,
        mpsc::{self, error::TrySendError},
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{GameEntity, MessageEntity},
        store::GameOnStore,
    },
    dto::{
        chat::{ChatInboundMessage, ChatOutboundMessage, MessageSummary},
        validation::check_message_text,
    },
    error::ServiceError,
    services::{
        auth_service::{self, CurrentUser},
        game_service,
    },
    state::{ChatEvent, SharedState},
};

/// Frames a socket may have queued before further relay traffic is dropped.
const OUTBOUND_BUFFER: usize = 64;

/// Load the game and check the caller may read and write its chat.
pub async fn ensure_chat_access(
    store: &Arc<dyn GameOnStore>,
    game_id: Uuid,
    current: &CurrentUser,
) -> Result<GameEntity, ServiceError> {
    let game = game_service::load_game(store, game_id).await?;
    if !current.is_admin() && !game.is_participant(current.id) {
        return Err(ServiceError::Forbidden(
            "only participants can use this game's chat".into(),
        ));
    }
    Ok(game)
}

/// Most recent messages of a game, oldest first.
pub async fn history(
    state: &SharedState,
    current: &CurrentUser,
    game_id: Uuid,
    limit: Option<usize>,
) -> Result<Vec<MessageSummary>, ServiceError> {
    let store = state.require_store().await?;
    ensure_chat_access(&store, game_id, current).await?;
    let max = state.config().chat().history_limit;
    let limit = limit.unwrap_or(max).clamp(1, max.max(1));
    let messages = store.list_messages(game_id, limit).await?;
    Ok(messages.iter().map(MessageSummary::from).collect())
}

/// Validate, persist and relay a chat line.
pub async fn post_message(
    state: &SharedState,
    current: &CurrentUser,
    game_id: Uuid,
    text: &str,
) -> Result<MessageSummary, ServiceError> {
    let max_length = state.config().chat().max_message_length;
    let text = check_message_text(text, max_length).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.into_owned())
                .unwrap_or_else(|| err.code.into_owned()),
        )
    })?;

    let store = state.require_store().await?;
    ensure_chat_access(&store, game_id, current).await?;

    let message = MessageEntity {
        id: Uuid::new_v4(),
        game_id,
        sender_id: current.id,
        sender_name: current.display_name.clone(),
        text,
        created_at: SystemTime::now(),
    };
    store.save_message(message.clone()).await?;
    let summary = MessageSummary::from(&message);
    let receivers = state.chat().publish(ChatEvent::Posted(message));
    debug!(game_id = %game_id, message_id = %summary.id, receivers, "chat message relayed");
    Ok(summary)
}

/// Moderator removal of a single message. Connected sockets are told to drop it.
pub async fn delete_message(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let message = store
        .find_message(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("message `{id}` not found")))?;
    if !store.delete_message(id).await? {
        return Err(ServiceError::NotFound(format!("message `{id}` not found")));
    }
    let receivers = state.chat().publish(ChatEvent::Removed {
        game_id: message.game_id,
        message_id: id,
    });
    info!(message_id = %id, game_id = %message.game_id, receivers, "chat message deleted by moderator");
    Ok(())
}

/// Writer side of the socket has gone away.
#[derive(Debug)]
struct ConnectionClosed;

/// Queue a frame for the writer task. A full buffer drops the frame.
fn send_frame(
    tx: &mpsc::Sender<Message>,
    frame: &ChatOutboundMessage,
) -> Result<(), ConnectionClosed> {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize chat frame");
            return Ok(());
        }
    };
    queue(tx, Message::Text(payload.into()))
}

fn queue(tx: &mpsc::Sender<Message>, message: Message) -> Result<(), ConnectionClosed> {
    match tx.try_send(message) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            warn!("chat socket is not draining; frame dropped");
            Ok(())
        }
        Err(TrySendError::Closed(_)) => Err(ConnectionClosed),
    }
}

fn error_frame(message: impl Into<String>) -> ChatOutboundMessage {
    ChatOutboundMessage::Error {
        message: message.into(),
    }
}

/// Send a final error frame followed by a policy close.
fn close_with(tx: &mpsc::Sender<Message>, reason: &str) {
    let _ = send_frame(tx, &error_frame(reason));
    let _ = queue(
        tx,
        Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Utf8Bytes::from(reason.to_owned()),
        })),
    );
}

/// What the socket loop does after an inbound text frame.
enum Reply {
    Silent,
    Send(ChatOutboundMessage),
    Close(String),
}

/// Parse one text frame and post it on behalf of `current`.
///
/// The session is resolved again first so bans, deletions and logouts take effect
/// on sockets that were opened before them.
async fn handle_text(
    state: &SharedState,
    current: &mut CurrentUser,
    game_id: Uuid,
    raw: &str,
) -> Reply {
    let text = match serde_json::from_str::<ChatInboundMessage>(raw) {
        Ok(ChatInboundMessage::Message { text }) => text,
        Ok(ChatInboundMessage::Unknown) => return Reply::Send(error_frame("unsupported frame type")),
        Err(err) => return Reply::Send(error_frame(format!("malformed frame: {err}"))),
    };

    match auth_service::authenticate(state, &current.token).await {
        Ok(fresh) => *current = fresh,
        Err(err @ (ServiceError::Unauthorized(_) | ServiceError::Forbidden(_))) => {
            return Reply::Close(err.to_string());
        }
        Err(err) => return Reply::Send(error_frame(err.to_string())),
    }

    match post_message(state, current, game_id, &text).await {
        // Accepted messages come back through the relay.
        Ok(_) => Reply::Silent,
        Err(err) => Reply::Send(error_frame(err.to_string())),
    }
}

/// Handle the full lifecycle of an authenticated chat WebSocket.
pub async fn handle_socket(
    state: SharedState,
    socket: WebSocket,
    mut current: CurrentUser,
    game_id: Uuid,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let relay_task = spawn_relay(&state, game_id, outbound_tx.clone());
    let revoked = state.sessions().revoked(current.id);
    tokio::pin!(revoked);
    info!(game_id = %game_id, user_id = %current.id, "chat socket connected");

    loop {
        let message = tokio::select! {
            () = &mut revoked => {
                info!(game_id = %game_id, user_id = %current.id, "closing chat socket of revoked user");
                close_with(&outbound_tx, "session revoked");
                break;
            }
            message = receiver.next() => message,
        };
        let Some(message) = message else {
            break;
        };

        match message {
            Ok(Message::Text(text)) => {
                match handle_text(&state, &mut current, game_id, &text).await {
                    Reply::Silent => {}
                    Reply::Send(frame) => {
                        if send_frame(&outbound_tx, &frame).is_err() {
                            break;
                        }
                    }
                    Reply::Close(reason) => {
                        close_with(&outbound_tx, &reason);
                        break;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                if queue(&outbound_tx, Message::Pong(payload)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(frame)) => {
                let _ = queue(&outbound_tx, Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                if send_frame(&outbound_tx, &error_frame("chat only accepts text frames")).is_err() {
                    break;
                }
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "chat socket error");
                break;
            }
        }
    }

    relay_task.abort();
    let _ = relay_task.await;
    state.chat().release(game_id);
    info!(
        game_id = %game_id,
        user_id = %current.id,
        remaining = state.chat().listeners(game_id),
        "chat socket disconnected"
    );
    finalize(writer_task, outbound_tx).await;
}

/// Forward every event relayed for `game_id` to this socket.
fn spawn_relay(
    state: &SharedState,
    game_id: Uuid,
    outbound_tx: mpsc::Sender<Message>,
) -> JoinHandle<()> {
    let mut relay = state.chat().subscribe(game_id);
    tokio::spawn(async move {
        loop {
            let frame = match relay.recv().await {
                Ok(ChatEvent::Posted(message)) => {
                    ChatOutboundMessage::Message(MessageSummary::from(&message))
                }
                Ok(ChatEvent::Removed { message_id, .. }) => {
                    ChatOutboundMessage::Deleted { message_id }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(game_id = %game_id, skipped, "chat relay lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if send_frame(&outbound_tx, &frame).is_err() {
                break;
            }
        }
    })
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::Sender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{models::SkillLevel, store::MemoryStore},
        dto::{
            auth::SignupRequest,
            format_system_time,
            game::{CreateGameRequest, LocationDto},
        },
        services::admin_service,
        state::AppState,
    };

    const FRAME: &str = r#"{"type":"message","text":"still here"}"#;

    async fn signup(state: &SharedState, name: &str) -> CurrentUser {
        let response = auth_service::signup(
            state,
            SignupRequest {
                email: format!("{name}@example.com"),
                password: "password123".into(),
                display_name: name.into(),
            },
        )
        .await
        .unwrap();
        auth_service::authenticate(state, &response.token)
            .await
            .unwrap()
    }

    async fn hosted_game(state: &SharedState, host: &CurrentUser) -> Uuid {
        game_service::create_game(
            state,
            host,
            CreateGameRequest {
                title: "Pickup".into(),
                sport: "football".into(),
                description: None,
                location: LocationDto {
                    address: "Field 1".into(),
                    latitude: None,
                    longitude: None,
                },
                starts_at: format_system_time(SystemTime::now() + Duration::from_secs(600)),
                max_players: 10,
                skill_level: SkillLevel::Any,
                requires_approval: false,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn posting_persists_and_relays() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        let host = signup(&state, "host").await;
        let game_id = hosted_game(&state, &host).await;
        let mut relay = state.chat().subscribe(game_id);

        let posted = post_message(&state, &host, game_id, "  kick-off at 7  ")
            .await
            .unwrap();
        assert_eq!(posted.text, "kick-off at 7");
        assert!(matches!(relay.recv().await.unwrap(), ChatEvent::Posted(m) if m.id == posted.id));

        let listed = history(&state, &host, game_id, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].sender_name, "host");
    }

    #[tokio::test]
    async fn outsiders_and_media_are_rejected() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        let host = signup(&state, "host").await;
        let outsider = signup(&state, "outsider").await;
        let game_id = hosted_game(&state, &host).await;

        assert!(matches!(
            post_message(&state, &outsider, game_id, "hello").await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            history(&state, &outsider, game_id, None).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            post_message(&state, &host, game_id, "<img src=x>").await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            post_message(&state, &host, game_id, &"x".repeat(1001)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn history_limit_keeps_latest_messages() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        let host = signup(&state, "host").await;
        let game_id = hosted_game(&state, &host).await;
        for i in 0..4 {
            post_message(&state, &host, game_id, &format!("msg {i}"))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let latest = history(&state, &host, game_id, Some(2)).await.unwrap();
        let texts: Vec<_> = latest.iter().map(|message| message.text.as_str()).collect();
        assert_eq!(texts, vec!["msg 2", "msg 3"]);

        delete_message(&state, latest[0].id).await.unwrap();
        assert!(matches!(
            delete_message(&state, latest[0].id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn socket_frames_recheck_the_session() {
        let state = AppState::with_store(
            AppConfig::default().with_admin_emails(["mod@example.com"]),
            Arc::new(MemoryStore::new()),
        );
        let admin = signup(&state, "mod").await;
        let mut host = signup(&state, "host").await;
        let game_id = hosted_game(&state, &host).await;

        assert!(matches!(
            handle_text(&state, &mut host, game_id, FRAME).await,
            Reply::Silent
        ));
        assert!(matches!(
            handle_text(&state, &mut host, game_id, r#"{"type":"wave"}"#).await,
            Reply::Send(ChatOutboundMessage::Error { .. })
        ));
        assert!(matches!(
            handle_text(&state, &mut host, game_id, "not json").await,
            Reply::Send(ChatOutboundMessage::Error { .. })
        ));

        admin_service::ban_user(&state, &admin, host.id, "spam".into())
            .await
            .unwrap();
        assert!(matches!(
            handle_text(&state, &mut host, game_id, FRAME).await,
            Reply::Close(reason) if reason.contains("banned")
        ));
        assert_eq!(history(&state, &admin, game_id, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn logged_out_socket_is_closed() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        let mut host = signup(&state, "host").await;
        let game_id = hosted_game(&state, &host).await;

        auth_service::logout(&state, &host);
        assert!(matches!(
            handle_text(&state, &mut host, game_id, FRAME).await,
            Reply::Close(_)
        ));
    }

    #[tokio::test]
    async fn moderator_removal_reaches_the_relay() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryStore::new()));
        let host = signup(&state, "host").await;
        let game_id = hosted_game(&state, &host).await;
        let mut relay = state.chat().subscribe(game_id);

        let posted = post_message(&state, &host, game_id, "oops").await.unwrap();
        assert!(matches!(relay.recv().await.unwrap(), ChatEvent::Posted(_)));

        delete_message(&state, posted.id).await.unwrap();
        assert!(matches!(
            relay.recv().await.unwrap(),
            ChatEvent::Removed { message_id, game_id: game } if message_id == posted.id && game == game_id
        ));
        assert!(history(&state, &host, game_id, None).await.unwrap().is_empty());
    }

    #[test]
    fn full_outbound_buffer_drops_instead_of_growing() {
        let (tx, mut rx) = mpsc::channel::<Message>(1);
        assert!(send_frame(&tx, &error_frame("first")).is_ok());
        assert!(send_frame(&tx, &error_frame("second")).is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(send_frame(&tx, &error_frame("gone")).is_err());
    }
}
