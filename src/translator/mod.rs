//! Event stream translator: raw agent events in, wire frames out.
//!
//! Guarantees per stream:
//! - `checkpoint` comes first, and only when the conversation id was minted here;
//! - at most one `final_response`;
//! - `done` comes last exactly once, unless an `error` ended the stream.
//!
//! Ledger touches are best-effort and never interrupt the stream.

mod state;

pub use state::{Step, TranslatorState};

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::ledger::ConversationLedger;
use crate::types::{ConversationId, RawEvent, WireEvent, WireFrame};

/// Translates one agent run for one conversation.
pub struct EventTranslator {
    ledger: Arc<dyn ConversationLedger>,
    conversation_id: ConversationId,
    announce_checkpoint: bool,
}

impl EventTranslator {
    /// Bind to `supplied`, or mint a fresh conversation id (announced with a
    /// leading `checkpoint` frame) when none was supplied.
    pub fn new(ledger: Arc<dyn ConversationLedger>, supplied: Option<ConversationId>) -> Self {
        let (conversation_id, announce_checkpoint) = match supplied {
            Some(id) => (id, false),
            None => (Uuid::new_v4(), true),
        };
        Self {
            ledger,
            conversation_id,
            announce_checkpoint,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    /// Whether the conversation id was minted by this translator.
    pub fn is_new_conversation(&self) -> bool {
        self.announce_checkpoint
    }

    /// A single `error` frame, for failures before the agent stream exists.
    pub fn error_frame(&self, message: impl Into<String>) -> WireFrame {
        WireFrame::new(
            self.conversation_id.to_string(),
            WireEvent::Error {
                message: message.into(),
            },
        )
    }

    /// Translate `raw` into wire frames. An `Err` item ends the stream with
    /// an `error` frame, like a chain error.
    pub fn translate(
        self,
        raw: BoxStream<'static, Result<RawEvent>>,
    ) -> BoxStream<'static, WireFrame> {
        let Self {
            ledger,
            conversation_id,
            announce_checkpoint,
        } = self;
        let checkpoint_id = conversation_id.to_string();

        let stream = async_stream::stream! {
            let frame = |event: WireEvent| WireFrame::new(checkpoint_id.clone(), event);
            if announce_checkpoint {
                yield frame(WireEvent::Checkpoint);
            }

            let mut state = TranslatorState::new();
            let mut raw = raw;
            while let Some(item) = raw.next().await {
                let step = match item {
                    Ok(event) => {
                        debug!(kind = %event.kind(), scope = ?event.scope, "raw event");
                        state.apply(event)
                    }
                    Err(e) => {
                        warn!(error = %e, "agent stream failed");
                        state.fail(e.to_string())
                    }
                };
                if step.touch {
                    touch(ledger.as_ref(), conversation_id).await;
                }
                for event in step.events {
                    yield frame(event);
                }
                if step.terminal {
                    return;
                }
            }

            let step = state.finish();
            if step.touch {
                touch(ledger.as_ref(), conversation_id).await;
            }
            for event in step.events {
                yield frame(event);
            }
        };

        Box::pin(stream)
    }
}

async fn touch(ledger: &dyn ConversationLedger, conversation_id: ConversationId) {
    if let Err(e) = ledger.touch(conversation_id).await {
        warn!(conversation_id = %conversation_id, error = %e, "failed to touch conversation");
    }
}
