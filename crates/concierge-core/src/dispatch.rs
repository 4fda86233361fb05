use crate::api::ChatApi;
use crate::session::{Completion, Request};

/// Run one planned request against the backend.
///
/// An AI turn whose reply hands the conversation to a human agent also
/// forwards the user's message to `/send`, inside the same call.
pub async fn execute(api: &ChatApi, request: Request) -> Completion {
    match request {
        Request::Intro { ticket, page_url } => Completion::Intro {
            ticket,
            result: api.intro(&page_url).await,
        },
        Request::AiTurn {
            ticket,
            body,
            handoff,
        } => {
            let result = api.chat(&body).await;
            let handoff = match &result {
                Ok(snapshot) if !snapshot.is_ai_response => {
                    tracing::info!(ticket = ticket.value(), "handing conversation to an agent");
                    Some(api.send(&handoff).await)
                }
                _ => None,
            };
            Completion::AiTurn {
                ticket,
                result,
                handoff,
            }
        }
        Request::AgentSend { ticket, message } => Completion::AgentSend {
            ticket,
            result: api.send(&message).await,
        },
        Request::CancelFlow { ticket } => Completion::CancelFlow {
            ticket,
            result: api.cancel_flow().await,
        },
        Request::Poll { ticket, view } => Completion::Poll {
            ticket,
            result: api.messages(view).await,
        },
    }
}
