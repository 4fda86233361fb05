use crate::api::ChatApi;
use crate::dispatch::execute;
use crate::session::{ChatSession, Effect, Request};

/// Result of handing text to [`ChatClient::send_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing was sent or appended
    Ignored,
    Delivered,
    Failed,
}

/// Runs session operations one at a time, awaiting each request.
///
/// The terminal UI drives [`ChatSession`] directly so requests can overlap;
/// this wrapper is for callers that do not need that.
pub struct ChatClient {
    api: ChatApi,
    session: ChatSession,
}

impl ChatClient {
    pub fn new(api: ChatApi, session: ChatSession) -> Self {
        Self { api, session }
    }

    pub fn api(&self) -> &ChatApi {
        &self.api
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ChatSession {
        &mut self.session
    }

    async fn run(&mut self, request: Request) -> Vec<Effect> {
        let completion = execute(&self.api, request).await;
        self.session.apply(completion)
    }

    pub async fn fetch_intro(&mut self) -> Vec<Effect> {
        let request = self.session.intro();
        self.run(request).await
    }

    pub async fn send_message(&mut self, text: &str) -> SendOutcome {
        let request = self.session.send_message(text);
        self.deliver(request).await
    }

    pub async fn choose_option(&mut self, label: &str) -> SendOutcome {
        let request = self.session.choose_option(label);
        self.deliver(request).await
    }

    async fn deliver(&mut self, request: Option<Request>) -> SendOutcome {
        let Some(request) = request else {
            return SendOutcome::Ignored;
        };
        let effects = self.run(request).await;
        if effects
            .iter()
            .any(|e| matches!(e, Effect::SendFailed { .. } | Effect::Disconnected))
        {
            SendOutcome::Failed
        } else {
            SendOutcome::Delivered
        }
    }

    pub async fn cancel_flow(&mut self) -> Vec<Effect> {
        let request = self.session.cancel_flow();
        self.run(request).await
    }

    /// A single poll tick. Does nothing while polling is not wanted.
    pub async fn poll_agent_messages(&mut self) -> Vec<Effect> {
        if !self.session.should_poll() {
            return Vec::new();
        }
        let request = self.session.poll();
        self.run(request).await
    }

    pub fn reconnect(&mut self) -> bool {
        self.session.reconnect()
    }
}
