use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::models::MessageEntity;

/// Event relayed to every socket connected to a game's chat.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A message was accepted.
    Posted(MessageEntity),
    /// A moderator removed a message.
    Removed {
        /// Game whose chat held the message.
        game_id: Uuid,
        /// Id of the removed message.
        message_id: Uuid,
    },
}

impl ChatEvent {
    /// Game whose sockets receive this event.
    pub fn game_id(&self) -> Uuid {
        match self {
            ChatEvent::Posted(message) => message.game_id,
            ChatEvent::Removed { game_id, .. } => *game_id,
        }
    }
}

/// Per-game broadcast channels relaying chat events to connected sockets.
pub struct ChatHub {
    channels: DashMap<Uuid, broadcast::Sender<ChatEvent>>,
    capacity: usize,
}

impl ChatHub {
    /// Hub whose per-game channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Join the relay of `game_id`, creating the channel on first use.
    pub fn subscribe(&self, game_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        self.channels
            .entry(game_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Relay an event to the sockets of its game. Returns the number of receivers.
    pub fn publish(&self, event: ChatEvent) -> usize {
        let Some(sender) = self.channels.get(&event.game_id()) else {
            return 0;
        };
        sender.send(event).unwrap_or(0)
    }

    /// Drop the channel of `game_id` once nobody listens any more.
    pub fn release(&self, game_id: Uuid) {
        self.channels
            .remove_if(&game_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Sockets currently subscribed to `game_id`.
    pub fn listeners(&self, game_id: Uuid) -> usize {
        self.channels
            .get(&game_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn posted(game_id: Uuid, text: &str) -> ChatEvent {
        ChatEvent::Posted(MessageEntity {
            id: Uuid::new_v4(),
            game_id,
            sender_id: Uuid::new_v4(),
            sender_name: "Sam".into(),
            text: text.into(),
            created_at: SystemTime::now(),
        })
    }

    #[tokio::test]
    async fn events_stay_within_their_game() {
        let hub = ChatHub::new(8);
        let (game_a, game_b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx_a = hub.subscribe(game_a);
        let mut rx_b = hub.subscribe(game_b);

        assert_eq!(hub.publish(posted(game_a, "hello")), 1);
        assert!(matches!(rx_a.recv().await.unwrap(), ChatEvent::Posted(m) if m.text == "hello"));
        assert!(rx_b.try_recv().is_err());

        let message_id = Uuid::new_v4();
        assert_eq!(
            hub.publish(ChatEvent::Removed {
                game_id: game_b,
                message_id
            }),
            1
        );
        assert!(matches!(
            rx_b.recv().await.unwrap(),
            ChatEvent::Removed { message_id: removed, .. } if removed == message_id
        ));
    }

    #[test]
    fn release_keeps_channels_with_listeners() {
        let hub = ChatHub::new(8);
        let game = Uuid::new_v4();
        let rx = hub.subscribe(game);

        hub.release(game);
        assert_eq!(hub.listeners(game), 1);
        drop(rx);
        hub.release(game);
        assert_eq!(hub.listeners(game), 0);
        assert_eq!(hub.publish(posted(game, "nobody home")), 0);
    }
}
