//! Conversation session: plans requests and applies their results
//!
//! The session never touches the network. Each operation returns a
//! [`Request`] describing the call to make; the caller runs it (see
//! [`crate::dispatch::execute`]) and feeds the [`Completion`] back through
//! [`ChatSession::apply`]. Tickets order completions so a slow response
//! cannot overwrite a newer snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ChatError;
use crate::state::{
    ChatState, ConnectionStatus, ConversationSnapshot, Message, Role, UiState, View,
};
use crate::wire::{CancelFlowResponse, ChatRequest, IntroResponse, OutgoingMessage, PollPayload};

pub const INTRO_FAILED: &str = "Sorry, I couldn't reach the chat service. Please try again later.";
pub const SEND_FAILED: &str = "Failed to send your message. Please try again.";
pub const CANCEL_FAILED: &str = "Couldn't cancel the current flow. Please try again.";
pub const YES_NO_CHOICES: [&str; 2] = ["Yes", "No"];

/// True for the error notices this client appends itself, as opposed to
/// messages the backend sent.
pub fn is_local_notice(message: &Message) -> bool {
    message.role == Role::System
        && [INTRO_FAILED, SEND_FAILED, CANCEL_FAILED].contains(&message.content.as_str())
}

/// Issue order of a request. Higher tickets were issued later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Shared ticket counter. Clones hand out tickets from the same sequence,
/// so the poll task and the session agree on ordering.
#[derive(Debug, Clone, Default)]
pub struct Sequencer(Arc<AtomicU64>);

impl Sequencer {
    pub fn next(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// A backend call planned by the session
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Intro {
        ticket: Ticket,
        page_url: String,
    },
    /// AI turn. `handoff` is forwarded to `/send` if the reply switches the
    /// conversation to a human agent.
    AiTurn {
        ticket: Ticket,
        body: ChatRequest,
        handoff: OutgoingMessage,
    },
    AgentSend {
        ticket: Ticket,
        message: OutgoingMessage,
    },
    CancelFlow {
        ticket: Ticket,
    },
    Poll {
        ticket: Ticket,
        view: View,
    },
}

impl Request {
    pub fn ticket(&self) -> Ticket {
        match self {
            Request::Intro { ticket, .. }
            | Request::AiTurn { ticket, .. }
            | Request::AgentSend { ticket, .. }
            | Request::CancelFlow { ticket }
            | Request::Poll { ticket, .. } => *ticket,
        }
    }
}

/// The result of running a [`Request`]
#[derive(Debug)]
pub enum Completion {
    Intro {
        ticket: Ticket,
        result: Result<IntroResponse, ChatError>,
    },
    AiTurn {
        ticket: Ticket,
        result: Result<ConversationSnapshot, ChatError>,
        handoff: Option<Result<(), ChatError>>,
    },
    AgentSend {
        ticket: Ticket,
        result: Result<(), ChatError>,
    },
    CancelFlow {
        ticket: Ticket,
        result: Result<CancelFlowResponse, ChatError>,
    },
    Poll {
        ticket: Ticket,
        result: Result<PollPayload, ChatError>,
    },
}

impl Completion {
    pub fn ticket(&self) -> Ticket {
        match self {
            Completion::Intro { ticket, .. }
            | Completion::AiTurn { ticket, .. }
            | Completion::AgentSend { ticket, .. }
            | Completion::CancelFlow { ticket, .. }
            | Completion::Poll { ticket, .. } => *ticket,
        }
    }
}

/// What applying a completion changed, for the owner to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// A user message reached the backend
    Delivered { ticket: Ticket },
    /// A user message did not reach the backend
    SendFailed { ticket: Ticket, text: String },
    /// `isAIResponse` flipped
    ModeChanged { ai: bool },
    Disconnected,
    /// An older response arrived after a newer snapshot and was dropped
    Discarded { ticket: Ticket },
}

/// Input widget the current state calls for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    /// Free text, with optional quick-reply buttons
    Composer { quick_replies: Vec<String> },
    Buttons(Vec<String>),
    Dropdown(Vec<String>),
}

impl Affordance {
    /// Labels that can be chosen directly
    pub fn choices(&self) -> &[String] {
        match self {
            Affordance::Composer { quick_replies } => quick_replies,
            Affordance::Buttons(choices) | Affordance::Dropdown(choices) => choices,
        }
    }

    pub fn accepts_text(&self) -> bool {
        matches!(self, Affordance::Composer { .. })
    }
}

#[derive(Debug, Clone)]
struct Pending {
    ticket: Ticket,
    message: Message,
}

pub struct ChatSession {
    view: View,
    page_url: String,
    snapshot: ConversationSnapshot,
    connection: ConnectionStatus,
    in_flow: bool,
    initial_buttons_clicked: bool,
    intro_options: Vec<String>,
    // Optimistic messages the server may not have seen yet
    pending: Vec<Pending>,
    sequencer: Sequencer,
    last_snapshot: Option<Ticket>,
    awaiting: Vec<Ticket>,
}

impl ChatSession {
    pub fn new(view: View, page_url: &str) -> Self {
        Self::with_sequencer(view, page_url, Sequencer::default())
    }

    pub fn with_sequencer(view: View, page_url: &str, sequencer: Sequencer) -> Self {
        Self {
            view,
            page_url: page_url.to_string(),
            snapshot: ConversationSnapshot::default(),
            connection: ConnectionStatus::Connected,
            in_flow: false,
            initial_buttons_clicked: false,
            intro_options: Vec::new(),
            pending: Vec::new(),
            sequencer,
            last_snapshot: None,
            awaiting: Vec::new(),
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn snapshot(&self) -> &ConversationSnapshot {
        &self.snapshot
    }

    pub fn messages(&self) -> &[Message] {
        &self.snapshot.messages
    }

    pub fn chat_state(&self) -> ChatState {
        self.snapshot.chat_state
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn is_ai_response(&self) -> bool {
        self.snapshot.is_ai_response
    }

    pub fn in_flow(&self) -> bool {
        self.in_flow
    }

    pub fn can_send_message(&self) -> bool {
        self.snapshot.chat_state.can_send_message()
    }

    /// True while an intro or AI turn is outstanding
    pub fn is_waiting(&self) -> bool {
        !self.awaiting.is_empty()
    }

    /// Whether the agent poll loop should be running
    pub fn should_poll(&self) -> bool {
        self.connection.is_connected()
            && (self.view == View::Agent || !self.snapshot.is_ai_response)
    }

    /// Whether to warn that nobody will pick up the conversation
    pub fn no_agents_warning(&self) -> bool {
        if self.snapshot.is_agent_available {
            return false;
        }
        // the AI answers customers until it hands over
        self.view == View::Agent || !self.snapshot.is_ai_response
    }

    pub fn affordance(&self) -> Affordance {
        let last = self.snapshot.messages.last();
        let options = || last.map(|m| m.options().to_vec()).unwrap_or_default();

        if self.can_send_message() {
            return Affordance::Composer {
                quick_replies: options(),
            };
        }

        match self.snapshot.chat_state.ui_state {
            UiState::YesNo => {
                Affordance::Buttons(YES_NO_CHOICES.iter().map(|c| c.to_string()).collect())
            }
            UiState::MultiChoice => Affordance::Buttons(options()),
            UiState::DropDown => {
                let select = last.map(|m| m.select().to_vec()).unwrap_or_default();
                if select.is_empty() {
                    Affordance::Dropdown(options())
                } else {
                    Affordance::Dropdown(select)
                }
            }
            UiState::TextInput => Affordance::Composer {
                quick_replies: options(),
            },
        }
    }

    pub fn intro(&mut self) -> Request {
        let ticket = self.sequencer.next();
        self.awaiting.push(ticket);
        Request::Intro {
            ticket,
            page_url: self.page_url.clone(),
        }
    }

    /// Append `text` optimistically and plan its delivery. Returns `None`
    /// for blank input, which is dropped without a request.
    pub fn send_message(&mut self, text: &str) -> Option<Request> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let ticket = self.sequencer.next();
        let role = self.view.outgoing_role();
        let message = Message::new(role, text);
        self.snapshot.messages.push(message.clone());
        self.pending.push(Pending { ticket, message });

        let outgoing = OutgoingMessage {
            role,
            content: text.to_string(),
            is_in_flow: self.in_flow,
        };

        if self.view == View::Customer && self.snapshot.is_ai_response {
            let body = ChatRequest {
                messages: self.snapshot.messages.clone(),
                url: self.page_url.clone(),
                chat_state: self.snapshot.chat_state,
                initial_buttons_clicked: std::mem::take(&mut self.initial_buttons_clicked),
            };
            self.awaiting.push(ticket);
            Some(Request::AiTurn {
                ticket,
                body,
                handoff: outgoing,
            })
        } else {
            Some(Request::AgentSend {
                ticket,
                message: outgoing,
            })
        }
    }

    /// Send a button, yes/no or dropdown choice
    pub fn choose_option(&mut self, label: &str) -> Option<Request> {
        if self.intro_options.iter().any(|o| o == label) {
            self.initial_buttons_clicked = true;
        }
        self.send_message(label)
    }

    pub fn cancel_flow(&mut self) -> Request {
        Request::CancelFlow {
            ticket: self.sequencer.next(),
        }
    }

    pub fn poll(&self) -> Request {
        Request::Poll {
            ticket: self.sequencer.next(),
            view: self.view,
        }
    }

    /// Mark the connection usable again. Returns true if it was down.
    pub fn reconnect(&mut self) -> bool {
        if self.connection.is_connected() {
            return false;
        }
        tracing::info!("reconnecting");
        self.connection = ConnectionStatus::Connected;
        true
    }

    pub fn apply(&mut self, completion: Completion) -> Vec<Effect> {
        let ticket = completion.ticket();
        self.awaiting.retain(|t| *t != ticket);
        let mut effects = Vec::new();

        match completion {
            Completion::Intro { result, .. } => {
                if self.is_stale(ticket) {
                    effects.push(Effect::Discarded { ticket });
                    return effects;
                }
                let message = match result {
                    Ok(intro) => {
                        let chat_state = intro.chat_state;
                        let message = intro.into_message();
                        self.intro_options = message.options().to_vec();
                        if let Some(chat_state) = chat_state {
                            self.adopt_chat_state(chat_state);
                        }
                        message
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "intro request failed");
                        Message::system(INTRO_FAILED)
                    }
                };
                self.snapshot.messages = vec![message];
                self.settle(ticket);
            }

            Completion::AiTurn {
                result, handoff, ..
            } => {
                match result {
                    Ok(snapshot) => {
                        effects.push(Effect::Delivered { ticket });
                        if self.is_stale(ticket) {
                            effects.push(Effect::Discarded { ticket });
                        } else {
                            self.replace_snapshot(ticket, snapshot, &mut effects);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "AI turn failed");
                        self.snapshot.messages.push(Message::system(SEND_FAILED));
                        effects.push(Effect::SendFailed {
                            ticket,
                            text: self.pending_text(ticket),
                        });
                    }
                }
                if let Some(Err(e)) = handoff {
                    tracing::warn!(error = %e, "hand-off to agent failed");
                    self.snapshot.messages.push(Message::system(SEND_FAILED));
                    self.disconnect(&mut effects);
                }
            }

            Completion::AgentSend { result, .. } => match result {
                Ok(()) => effects.push(Effect::Delivered { ticket }),
                Err(e) => {
                    tracing::warn!(error = %e, "send to agent failed");
                    self.snapshot.messages.push(Message::system(SEND_FAILED));
                    effects.push(Effect::SendFailed {
                        ticket,
                        text: self.pending_text(ticket),
                    });
                    self.disconnect(&mut effects);
                }
            },

            Completion::CancelFlow { result, .. } => match result {
                Ok(response) => {
                    self.snapshot.messages.extend(response.messages);
                    self.adopt_chat_state(response.chat_state);
                    self.in_flow = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cancel flow failed");
                    self.snapshot.messages.push(Message::system(CANCEL_FAILED));
                }
            },

            Completion::Poll { result, .. } => match result {
                Ok(_) if self.is_stale(ticket) => effects.push(Effect::Discarded { ticket }),
                Ok(PollPayload::Snapshot(snapshot)) => {
                    self.replace_snapshot(ticket, snapshot, &mut effects);
                }
                Ok(PollPayload::Legacy(list)) => {
                    self.snapshot.messages = list.into_iter().map(Message::from).collect();
                    self.settle(ticket);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "poll failed");
                    self.disconnect(&mut effects);
                }
            },
        }

        if let Some(Effect::Discarded { ticket }) = effects.last() {
            tracing::debug!(ticket = ticket.value(), "discarded stale response");
        }
        effects
    }

    fn is_stale(&self, ticket: Ticket) -> bool {
        self.last_snapshot.is_some_and(|last| ticket < last)
    }

    fn adopt_chat_state(&mut self, chat_state: ChatState) {
        self.snapshot.chat_state = chat_state;
        self.in_flow = chat_state.in_flow();
    }

    fn replace_snapshot(
        &mut self,
        ticket: Ticket,
        snapshot: ConversationSnapshot,
        effects: &mut Vec<Effect>,
    ) {
        let was_ai = self.snapshot.is_ai_response;
        self.snapshot = snapshot;
        self.in_flow = self.snapshot.chat_state.in_flow();
        if was_ai != self.snapshot.is_ai_response {
            tracing::info!(ai = self.snapshot.is_ai_response, "conversation mode changed");
            effects.push(Effect::ModeChanged {
                ai: self.snapshot.is_ai_response,
            });
        }
        self.settle(ticket);
    }

    /// Record `ticket` as the newest snapshot and put back optimistic
    /// messages issued after it.
    fn settle(&mut self, ticket: Ticket) {
        self.last_snapshot = Some(ticket);
        self.pending.retain(|p| p.ticket > ticket);
        self.snapshot
            .messages
            .extend(self.pending.iter().map(|p| p.message.clone()));
    }

    fn disconnect(&mut self, effects: &mut Vec<Effect>) {
        if self.connection.is_connected() {
            tracing::info!("connection lost");
            self.connection = ConnectionStatus::Disconnected;
            effects.push(Effect::Disconnected);
        }
    }

    fn pending_text(&self, ticket: Ticket) -> String {
        self.pending
            .iter()
            .find(|p| p.ticket == ticket)
            .map(|p| p.message.content.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::LegacyMessage;
    use reqwest::StatusCode;

    const PAGE: &str = "http://localhost:3000/";

    fn failure(endpoint: &'static str) -> ChatError {
        ChatError::Status {
            endpoint,
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn agent_snapshot(messages: Vec<Message>) -> ConversationSnapshot {
        ConversationSnapshot {
            messages,
            is_ai_response: false,
            ..ConversationSnapshot::default()
        }
    }

    fn intro(options: &[&str]) -> IntroResponse {
        IntroResponse {
            long: "Hi, how can I help?".to_string(),
            options: Some(options.iter().map(|o| o.to_string()).collect()),
            chat_state: None,
        }
    }

    #[test]
    fn test_blank_input_is_dropped() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        for text in ["", "   ", "\t\n"] {
            assert!(session.send_message(text).is_none());
        }
        assert!(session.messages().is_empty());
    }

    #[test]
    fn test_intro_replaces_messages_with_greeting() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        let request = session.intro();
        assert!(session.is_waiting());

        session.apply(Completion::Intro {
            ticket: request.ticket(),
            result: Ok(intro(&["Billing", "Technical"])),
        });

        assert!(!session.is_waiting());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);
        assert_eq!(
            session.affordance(),
            Affordance::Composer {
                quick_replies: vec!["Billing".to_string(), "Technical".to_string()]
            }
        );
    }

    #[test]
    fn test_intro_failure_shows_error_message() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        let request = session.intro();
        session.apply(Completion::Intro {
            ticket: request.ticket(),
            result: Err(failure("/chat/intro")),
        });
        assert_eq!(session.messages(), [Message::system(INTRO_FAILED)]);
        assert!(session.connection().is_connected());
    }

    #[test]
    fn test_intro_adopts_chat_state() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        let request = session.intro();
        let mut response = intro(&[]);
        response.chat_state = Some(ChatState {
            flow: 2,
            flow_step_id: 0,
            ui_state: UiState::YesNo,
        });
        session.apply(Completion::Intro {
            ticket: request.ticket(),
            result: Ok(response),
        });
        assert!(session.in_flow());
        assert!(!session.can_send_message());
        assert!(session.messages()[0].options.is_none());
    }

    #[test]
    fn test_ai_path_sends_history_with_optimistic_message() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        session.snapshot.chat_state = ChatState {
            flow: 1,
            flow_step_id: 3,
            ui_state: UiState::YesNo,
        };
        session.in_flow = true;

        let request = session.choose_option("Yes").unwrap();
        let Request::AiTurn { body, handoff, .. } = request else {
            panic!("expected AI turn");
        };
        assert_eq!(body.messages.last(), Some(&Message::user("Yes")));
        assert_eq!(body.chat_state.ui_state, UiState::YesNo);
        assert_eq!(body.url, PAGE);
        assert!(handoff.is_in_flow);
        assert_eq!(session.messages().last(), Some(&Message::user("Yes")));
    }

    #[test]
    fn test_initial_buttons_flag_is_one_shot() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        let request = session.intro();
        session.apply(Completion::Intro {
            ticket: request.ticket(),
            result: Ok(intro(&["Billing", "Technical"])),
        });

        let Some(Request::AiTurn { body, .. }) = session.choose_option("Billing") else {
            panic!("expected AI turn");
        };
        assert!(body.initial_buttons_clicked);

        let Some(Request::AiTurn { body, .. }) = session.send_message("more") else {
            panic!("expected AI turn");
        };
        assert!(!body.initial_buttons_clicked);
    }

    #[test]
    fn test_agent_path_when_not_ai() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        session.snapshot.is_ai_response = false;
        let request = session.send_message("  where is my order? ").unwrap();
        assert_eq!(
            request,
            Request::AgentSend {
                ticket: request.ticket(),
                message: OutgoingMessage {
                    role: Role::User,
                    content: "where is my order?".to_string(),
                    is_in_flow: false,
                },
            }
        );
        assert!(!session.is_waiting());
    }

    #[test]
    fn test_agent_view_always_sends_as_system() {
        let mut session = ChatSession::new(View::Agent, PAGE);
        assert!(session.is_ai_response());
        let Some(Request::AgentSend { message, .. }) = session.send_message("On it") else {
            panic!("expected agent send");
        };
        assert_eq!(message.role, Role::System);
        assert!(session.should_poll());
    }

    #[test]
    fn test_ai_reply_switching_to_agent_mode() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        assert!(!session.should_poll());
        let request = session.send_message("talk to a human").unwrap();

        let effects = session.apply(Completion::AiTurn {
            ticket: request.ticket(),
            result: Ok(agent_snapshot(vec![
                Message::user("talk to a human"),
                Message::new(Role::Assistant, "Connecting you now"),
            ])),
            handoff: Some(Ok(())),
        });

        assert!(effects.contains(&Effect::ModeChanged { ai: false }));
        assert!(session.should_poll());
        // the reply echoed the message, so it is not re-appended
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_failed_ai_turn_keeps_optimistic_message() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        let request = session.send_message("hello").unwrap();
        let effects = session.apply(Completion::AiTurn {
            ticket: request.ticket(),
            result: Err(failure("/chat")),
            handoff: None,
        });
        assert_eq!(
            effects,
            vec![Effect::SendFailed {
                ticket: request.ticket(),
                text: "hello".to_string()
            }]
        );
        assert_eq!(
            session.messages(),
            [Message::user("hello"), Message::system(SEND_FAILED)]
        );
        assert!(session.connection().is_connected());
    }

    #[test]
    fn test_failed_agent_send_disconnects() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        session.snapshot.is_ai_response = false;
        let request = session.send_message("anyone there?").unwrap();
        let effects = session.apply(Completion::AgentSend {
            ticket: request.ticket(),
            result: Err(failure("/send")),
        });
        assert!(effects.contains(&Effect::Disconnected));
        assert!(!session.connection().is_connected());
        assert!(!session.should_poll());
        assert_eq!(session.messages()[0], Message::user("anyone there?"));
    }

    #[test]
    fn test_stale_poll_is_discarded() {
        let mut session = ChatSession::new(View::Agent, PAGE);
        let older = session.poll();
        let newer = session.poll();

        session.apply(Completion::Poll {
            ticket: newer.ticket(),
            result: Ok(PollPayload::Snapshot(agent_snapshot(vec![
                Message::user("one"),
                Message::user("two"),
            ]))),
        });
        let effects = session.apply(Completion::Poll {
            ticket: older.ticket(),
            result: Ok(PollPayload::Snapshot(agent_snapshot(vec![Message::user("one")]))),
        });

        assert_eq!(
            effects,
            vec![Effect::Discarded {
                ticket: older.ticket()
            }]
        );
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_optimistic_message_survives_earlier_poll() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        session.snapshot.is_ai_response = false;
        let poll = session.poll();
        let send = session.send_message("still here").unwrap();

        session.apply(Completion::Poll {
            ticket: poll.ticket(),
            result: Ok(PollPayload::Snapshot(agent_snapshot(vec![Message::system(
                "Hello, I'm Sam",
            )]))),
        });
        assert_eq!(
            session.messages(),
            [Message::system("Hello, I'm Sam"), Message::user("still here")]
        );

        session.apply(Completion::AgentSend {
            ticket: send.ticket(),
            result: Ok(()),
        });
        let later = session.poll();
        session.apply(Completion::Poll {
            ticket: later.ticket(),
            result: Ok(PollPayload::Snapshot(agent_snapshot(vec![
                Message::system("Hello, I'm Sam"),
                Message::user("still here"),
            ]))),
        });
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_legacy_poll_replaces_messages_only() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        session.snapshot.is_ai_response = false;
        session.snapshot.is_agent_available = true;
        let poll = session.poll();
        session.apply(Completion::Poll {
            ticket: poll.ticket(),
            result: Ok(PollPayload::Legacy(vec![LegacyMessage {
                sender: "agent".to_string(),
                text: "hi".to_string(),
            }])),
        });
        assert_eq!(session.messages(), [Message::system("hi")]);
        assert!(session.snapshot().is_agent_available);
        assert!(!session.is_ai_response());
    }

    #[test]
    fn test_poll_failure_disconnects_until_reconnect() {
        let mut session = ChatSession::new(View::Agent, PAGE);
        let poll = session.poll();
        let effects = session.apply(Completion::Poll {
            ticket: poll.ticket(),
            result: Err(failure("/messages")),
        });
        assert_eq!(effects, vec![Effect::Disconnected]);
        assert!(!session.should_poll());

        assert!(session.reconnect());
        assert!(!session.reconnect());
        assert!(session.should_poll());
    }

    #[test]
    fn test_cancel_flow_appends_and_clears_flow() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        session.snapshot.messages.push(Message::system("Pick a plan"));
        session.adopt_chat_state(ChatState {
            flow: 4,
            flow_step_id: 1,
            ui_state: UiState::MultiChoice,
        });
        assert!(session.in_flow());

        let request = session.cancel_flow();
        session.apply(Completion::CancelFlow {
            ticket: request.ticket(),
            result: Ok(CancelFlowResponse {
                messages: vec![Message::system("Flow cancelled")],
                chat_state: ChatState::default(),
            }),
        });
        assert!(!session.in_flow());
        assert!(session.can_send_message());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_cancel_flow_failure_keeps_state() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        session.adopt_chat_state(ChatState {
            flow: 4,
            flow_step_id: 1,
            ui_state: UiState::YesNo,
        });
        let request = session.cancel_flow();
        session.apply(Completion::CancelFlow {
            ticket: request.ticket(),
            result: Err(failure("/chat/cancel_flow")),
        });
        assert!(session.in_flow());
        assert_eq!(session.messages(), [Message::system(CANCEL_FAILED)]);
    }

    #[test]
    fn test_affordances_follow_ui_state() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        let mut question = Message::system("Which one?").with_options(vec!["A".into(), "B".into()]);
        question.select = Some(vec!["X".into(), "Y".into(), "Z".into()]);
        session.snapshot.messages.push(question);

        let flow = |ui_state| ChatState {
            flow: 7,
            flow_step_id: 0,
            ui_state,
        };

        session.adopt_chat_state(flow(UiState::YesNo));
        assert_eq!(
            session.affordance(),
            Affordance::Buttons(vec!["Yes".to_string(), "No".to_string()])
        );

        session.adopt_chat_state(flow(UiState::MultiChoice));
        assert_eq!(session.affordance().choices(), ["A", "B"]);

        session.adopt_chat_state(flow(UiState::DropDown));
        assert_eq!(
            session.affordance(),
            Affordance::Dropdown(vec!["X".into(), "Y".into(), "Z".into()])
        );

        session.adopt_chat_state(flow(UiState::TextInput));
        assert!(session.affordance().accepts_text());

        // outside a flow the ui state does not block text
        session.adopt_chat_state(ChatState {
            flow: -1,
            flow_step_id: -1,
            ui_state: UiState::DropDown,
        });
        assert!(session.affordance().accepts_text());
    }

    #[test]
    fn test_no_agents_warning() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        assert!(!session.no_agents_warning());
        let poll = session.poll();
        session.apply(Completion::Poll {
            ticket: poll.ticket(),
            result: Ok(PollPayload::Snapshot(agent_snapshot(Vec::new()))),
        });
        assert!(session.no_agents_warning());
        assert!(session.can_send_message());
    }

    #[test]
    fn test_agent_view_warns_before_first_poll() {
        let mut session = ChatSession::new(View::Agent, PAGE);
        assert!(session.is_ai_response());
        assert!(session.no_agents_warning());

        let poll = session.poll();
        session.apply(Completion::Poll {
            ticket: poll.ticket(),
            result: Ok(PollPayload::Snapshot(ConversationSnapshot {
                is_agent_available: true,
                ..agent_snapshot(Vec::new())
            })),
        });
        assert!(!session.no_agents_warning());
    }

    #[test]
    fn test_poll_without_mode_flag_stays_with_agent() {
        let mut session = ChatSession::new(View::Customer, PAGE);
        let poll = session.poll();
        session.apply(Completion::Poll {
            ticket: poll.ticket(),
            result: Ok(PollPayload::Snapshot(agent_snapshot(Vec::new()))),
        });
        assert!(session.should_poll());

        let payload: PollPayload = serde_json::from_str(
            r#"{"messages": [{"role": "system", "content": "Hi, this is Dana"}],
                "isAgentAvailable": true}"#,
        )
        .unwrap();
        let poll = session.poll();
        let effects = session.apply(Completion::Poll {
            ticket: poll.ticket(),
            result: Ok(payload),
        });

        assert!(effects.is_empty());
        assert!(!session.is_ai_response());
        assert!(session.should_poll());
        assert_eq!(session.messages(), [Message::system("Hi, this is Dana")]);
    }

    #[test]
    fn test_local_notices() {
        assert!(is_local_notice(&Message::system(SEND_FAILED)));
        assert!(is_local_notice(&Message::system(CANCEL_FAILED)));
        assert!(!is_local_notice(&Message::user(SEND_FAILED)));
        assert!(!is_local_notice(&Message::system("Hi, this is Dana")));
    }

    #[test]
    fn test_sequencer_is_shared_between_clones() {
        let sequencer = Sequencer::default();
        let clone = sequencer.clone();
        let a = sequencer.next();
        let b = clone.next();
        assert!(b > a);
    }
}
