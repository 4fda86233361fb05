//! UI-agnostic conversation state types
//!
//! These mirror what the chat backend owns. The client never merges them
//! incrementally: a snapshot from the server replaces the local one.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The customer
    User,
    /// A human agent, or the service itself (greetings, errors)
    System,
    /// The AI assistant
    Assistant,
}

/// A chat message. Options and select entries are offered as buttons or a
/// dropdown when the conversation state asks for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            options: None,
            select: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = Some(options);
        self
    }

    /// Offered options, empty when there are none
    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or_default()
    }

    /// Dropdown entries, empty when there are none
    pub fn select(&self) -> &[String] {
        self.select.as_deref().unwrap_or_default()
    }
}

/// Which input affordance the server wants rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UiState {
    #[default]
    TextInput,
    YesNo,
    MultiChoice,
    DropDown,
}

impl UiState {
    pub fn all() -> [UiState; 4] {
        [
            UiState::TextInput,
            UiState::YesNo,
            UiState::MultiChoice,
            UiState::DropDown,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UiState::TextInput => "TEXT_INPUT",
            UiState::YesNo => "YES_NO",
            UiState::MultiChoice => "MULTI_CHOICE",
            UiState::DropDown => "DROP_DOWN",
        }
    }
}

/// Sentinel used by the backend for "no flow" and "no step"
pub const NO_FLOW: i64 = -1;

/// Server-driven flow position and input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatState {
    pub flow: i64,
    #[serde(rename = "flowStepID")]
    pub flow_step_id: i64,
    #[serde(rename = "UI_state")]
    pub ui_state: UiState,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            flow: NO_FLOW,
            flow_step_id: NO_FLOW,
            ui_state: UiState::TextInput,
        }
    }
}

impl ChatState {
    /// Free text is accepted outside of flows, or inside a flow step that
    /// asks for text.
    pub fn can_send_message(&self) -> bool {
        self.flow == NO_FLOW || self.ui_state == UiState::TextInput
    }

    pub fn in_flow(&self) -> bool {
        self.flow != NO_FLOW
    }
}

/// The whole conversation as the server sees it.
///
/// [`Default`] is the state at mount, in AI mode. A decoded reply that omits
/// `isAIResponse` is in agent mode instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    #[serde(rename = "chatState")]
    pub chat_state: ChatState,
    #[serde(rename = "isAIResponse", default)]
    pub is_ai_response: bool,
    #[serde(rename = "isAgentAvailable")]
    pub is_agent_available: bool,
}

impl Default for ConversationSnapshot {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            chat_state: ChatState::default(),
            is_ai_response: true,
            is_agent_available: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        *self == ConnectionStatus::Connected
    }
}

/// Which side of the conversation this client plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Customer,
    Agent,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::Customer => "customer",
            View::Agent => "agent",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            View::Customer => "Customer Chat",
            View::Agent => "Agent Chat",
        }
    }

    /// Role stamped on messages typed in this view
    pub fn outgoing_role(&self) -> Role {
        match self {
            View::Customer => Role::User,
            View::Agent => Role::System,
        }
    }

    /// Speaker label for a message as seen from this view
    pub fn label(&self, role: Role) -> &'static str {
        match (self, role) {
            (_, Role::Assistant) => "AI:",
            (View::Customer, Role::User) => "You:",
            (View::Customer, Role::System) => "Agent:",
            (View::Agent, Role::User) => "Customer:",
            (View::Agent, Role::System) => "You:",
        }
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(View::Customer),
            "agent" => Ok(View::Agent),
            _ => Err(format!("unknown view '{s}', expected customer or agent")),
        }
    }
}
