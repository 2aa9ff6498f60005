use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AppContext, Caller};
use crate::agent::RunConfig;
use crate::translator::EventTranslator;
use crate::types::{ChatRequest, ModelMessage, WireEvent, WireFrame};

/// The streaming chat operation.
#[derive(Debug, Clone)]
pub struct ChatService {
    ctx: AppContext,
}

impl ChatService {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Run one user message and stream the resulting wire frames.
    ///
    /// The stream always ends with `done` or `error`. Failures before the
    /// agent starts produce a single `error` frame.
    pub fn stream_responses(&self, caller: &Caller, request: ChatRequest) -> BoxStream<'static, WireFrame> {
        let supplied = match request
            .checkpoint_id
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
        {
            None => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    let frame = WireFrame::new(
                        raw,
                        WireEvent::Error {
                            message: format!("invalid checkpoint id: {raw}"),
                        },
                    );
                    return Box::pin(stream::once(async move { frame }));
                }
            },
        };

        let ledger = self.ctx.ledger.clone();
        let agents = self.ctx.agents.clone();
        let translator = EventTranslator::new(ledger.clone(), supplied);
        let conversation_id = translator.conversation_id();
        let owner = caller.user_id;
        let run = RunConfig {
            thread_id: conversation_id.to_string(),
            user_id: owner.map(|id| id.to_string()),
            user_profile: caller.profile.clone(),
            system_prompt: None,
        };
        let message = request.message;

        let frames = async_stream::stream! {
            if message.trim().is_empty() {
                yield translator.error_frame("message must not be empty");
                return;
            }
            let agent = match agents.get_agent().await {
                Ok(agent) => agent,
                Err(e) => {
                    warn!(error = %e, "agent unavailable");
                    yield translator.error_frame(e.to_string());
                    return;
                }
            };
            if let Err(e) = ledger.ensure(conversation_id, owner, None).await {
                yield translator.error_frame(e.to_string());
                return;
            }
            if let Err(e) = ledger.maybe_update_title(conversation_id, &message).await {
                warn!(conversation_id = %conversation_id, error = %e, "failed to update title");
            }

            info!(
                conversation_id = %conversation_id,
                new = translator.is_new_conversation(),
                "chat stream started"
            );
            let raw = agent.stream_events(vec![ModelMessage::user(message)], run);
            let mut frames = translator.translate(raw);
            while let Some(frame) = frames.next().await {
                yield frame;
            }
        };

        Box::pin(frames)
    }
}
