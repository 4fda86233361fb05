pub mod api;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod poller;
pub mod session;
pub mod state;
pub mod wire;

// Re-export main types for convenience
pub use api::ChatApi;
pub use client::{ChatClient, SendOutcome};
pub use config::Config;
pub use dispatch::execute;
pub use error::ChatError;
pub use poller::Poller;
pub use session::{Affordance, ChatSession, Completion, Effect, Request, Sequencer, Ticket};
pub use state::{ChatState, ConnectionStatus, ConversationSnapshot, Message, Role, UiState, View};
pub use wire::MessageShape;
