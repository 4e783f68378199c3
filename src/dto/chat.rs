use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{dao::models::MessageEntity, dto::format_system_time};

/// Chat line as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageSummary {
    /// Message id.
    pub id: Uuid,
    /// Game whose chat holds the message.
    pub game_id: Uuid,
    /// Author id.
    pub sender_id: Uuid,
    /// Author display name at posting time.
    pub sender_name: String,
    /// Trimmed plain-text body.
    pub text: String,
    /// RFC 3339 posting time.
    pub created_at: String,
}

impl From<&MessageEntity> for MessageSummary {
    fn from(message: &MessageEntity) -> Self {
        Self {
            id: message.id,
            game_id: message.game_id,
            sender_id: message.sender_id,
            sender_name: message.sender_name.clone(),
            text: message.text.clone(),
            created_at: format_system_time(message.created_at),
        }
    }
}

/// REST payload for posting a message. Content rules are enforced by the chat service.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    /// Plain-text body.
    pub text: String,
}

/// Query accepted by the chat history route.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of most recent messages to return.
    pub limit: Option<usize>,
}

/// Query accepted by the chat WebSocket upgrade for clients that cannot set headers.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChatSocketQuery {
    /// Bearer token, used when no `Authorization` header is sent.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Frames accepted from chat WebSocket clients.
#[serde(tag = "type")]
pub enum ChatInboundMessage {
    /// Post `text` to the game's chat.
    #[serde(rename = "message")]
    Message {
        /// Plain-text body.
        text: String,
    },
    /// Anything else; answered with an error frame.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, ToSchema)]
/// Frames pushed to chat WebSocket clients.
#[serde(tag = "type")]
pub enum ChatOutboundMessage {
    /// A message posted by any participant, including the caller.
    #[serde(rename = "message")]
    Message(MessageSummary),
    /// A moderator removed a message from the history.
    #[serde(rename = "deleted")]
    Deleted {
        /// Id of the removed message.
        message_id: Uuid,
    },
    /// The caller's last frame was refused, or the session ended.
    #[serde(rename = "error")]
    Error {
        /// Human readable reason.
        message: String,
    },
}
