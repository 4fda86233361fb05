//! Request and response bodies for the chat backend
//!
//! Two message shapes exist on the wire: `{role, content}` and the older
//! `{sender, text}`. Only [`Message`] is used in memory; the shape is chosen
//! here, at the network boundary.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::state::{ChatState, ConversationSnapshot, Message, Role};

/// Message encoding used when talking to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageShape {
    /// `{role, content}` with `?role=` on polls
    #[default]
    RoleContent,
    /// `{sender, text}` with `?sender=` on polls
    SenderText,
}

impl MessageShape {
    pub fn poll_param(&self) -> &'static str {
        match self {
            MessageShape::RoleContent => "role",
            MessageShape::SenderText => "sender",
        }
    }
}

/// Legacy sender name for a role
pub fn sender_for(role: Role) -> &'static str {
    match role {
        Role::User => "customer",
        Role::System => "agent",
        Role::Assistant => "bot",
    }
}

/// Role for a legacy sender name. Anything unknown is treated as the
/// service side.
pub fn role_for_sender(sender: &str) -> Role {
    match sender.to_lowercase().as_str() {
        "customer" | "user" => Role::User,
        "bot" | "ai" | "assistant" => Role::Assistant,
        _ => Role::System,
    }
}

#[derive(Debug, Serialize)]
pub struct IntroRequest<'a> {
    pub url: &'a str,
}

/// Greeting returned by `/chat/intro`
#[derive(Debug, Clone, Deserialize)]
pub struct IntroResponse {
    pub long: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default, rename = "chatState")]
    pub chat_state: Option<ChatState>,
}

impl IntroResponse {
    pub fn into_message(self) -> Message {
        let mut message = Message::system(self.long);
        message.options = self.options.filter(|o| !o.is_empty());
        message
    }
}

/// Body of an AI turn on `/chat`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub url: String,
    #[serde(rename = "chatState")]
    pub chat_state: ChatState,
    #[serde(rename = "initialButtonsClicked")]
    pub initial_buttons_clicked: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelFlowResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, rename = "chatState")]
    pub chat_state: ChatState,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GreetingResponse {
    pub message: String,
}

/// A message handed to the agent side through `/send`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub role: Role,
    pub content: String,
    pub is_in_flow: bool,
}

impl OutgoingMessage {
    pub fn body(&self, shape: MessageShape) -> Value {
        match shape {
            MessageShape::RoleContent => json!({
                "role": self.role,
                "content": self.content,
                "is_in_flow": self.is_in_flow,
            }),
            MessageShape::SenderText => json!({
                "sender": sender_for(self.role),
                "text": self.content,
                "is_in_flow": self.is_in_flow,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyMessage {
    pub sender: String,
    pub text: String,
}

impl From<LegacyMessage> for Message {
    fn from(legacy: LegacyMessage) -> Self {
        Message::new(role_for_sender(&legacy.sender), legacy.text)
    }
}

/// What `/messages` may return. The list form carries messages only.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PollPayload {
    // Tried first: a bare array would otherwise be read as a struct sequence.
    Legacy(Vec<LegacyMessage>),
    Snapshot(ConversationSnapshot),
}
