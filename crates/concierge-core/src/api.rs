use reqwest::{Client, Response};
use serde_json::json;

use crate::error::{ChatError, Result};
use crate::state::{ConversationSnapshot, View};
use crate::wire::{
    CancelFlowResponse, ChatRequest, GreetingResponse, IntroRequest, IntroResponse,
    MessageShape, OutgoingMessage, PollPayload,
};

pub const GREETING_PATH: &str = "/api/hello";
pub const INTRO_PATH: &str = "/chat/intro";
pub const CHAT_PATH: &str = "/chat";
pub const CANCEL_FLOW_PATH: &str = "/chat/cancel_flow";
pub const SEND_PATH: &str = "/send";
pub const MESSAGES_PATH: &str = "/messages";

/// HTTP client for the chat backend
#[derive(Clone)]
pub struct ChatApi {
    client: Client,
    base_url: String,
    shape: MessageShape,
}

impl ChatApi {
    pub fn new(base_url: &str, shape: MessageShape) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            shape,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn shape(&self) -> MessageShape {
        self.shape
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(endpoint: &'static str, response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status { endpoint, status });
        }
        Ok(response)
    }

    /// Demo greeting from `/api/hello`
    pub async fn greeting(&self) -> Result<String> {
        tracing::debug!(path = GREETING_PATH, "GET");
        let response = self.client.get(self.url(GREETING_PATH)).send().await?;
        let greeting: GreetingResponse = Self::check(GREETING_PATH, response)?.json().await?;
        Ok(greeting.message)
    }

    pub async fn intro(&self, page_url: &str) -> Result<IntroResponse> {
        tracing::debug!(path = INTRO_PATH, page_url, "POST");
        let response = self
            .client
            .post(self.url(INTRO_PATH))
            .json(&IntroRequest { url: page_url })
            .send()
            .await?;
        Ok(Self::check(INTRO_PATH, response)?.json().await?)
    }

    /// One AI turn. The reply replaces the whole conversation.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ConversationSnapshot> {
        tracing::debug!(path = CHAT_PATH, history = request.messages.len(), "POST");
        let response = self
            .client
            .post(self.url(CHAT_PATH))
            .json(request)
            .send()
            .await?;
        Ok(Self::check(CHAT_PATH, response)?.json().await?)
    }

    pub async fn cancel_flow(&self) -> Result<CancelFlowResponse> {
        tracing::debug!(path = CANCEL_FLOW_PATH, "POST");
        let response = self
            .client
            .post(self.url(CANCEL_FLOW_PATH))
            .json(&json!({}))
            .send()
            .await?;
        Ok(Self::check(CANCEL_FLOW_PATH, response)?.json().await?)
    }

    /// Hand a message to the agent side. The response body is ignored.
    pub async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        tracing::debug!(path = SEND_PATH, role = ?message.role, "POST");
        let response = self
            .client
            .post(self.url(SEND_PATH))
            .json(&message.body(self.shape))
            .send()
            .await?;
        Self::check(SEND_PATH, response)?;
        Ok(())
    }

    pub async fn messages(&self, view: View) -> Result<PollPayload> {
        tracing::debug!(path = MESSAGES_PATH, view = view.as_str(), "GET");
        let response = self
            .client
            .get(self.url(MESSAGES_PATH))
            .query(&[(self.shape.poll_param(), view.as_str())])
            .send()
            .await?;
        Ok(Self::check(MESSAGES_PATH, response)?.json().await?)
    }
}
