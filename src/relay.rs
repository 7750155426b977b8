//! Message-to-reply pipeline
//!
//! One inbound webhook event goes through: text extraction, instruction
//! resolution (describing images), the sender's assistant session, an
//! assistant run, and finally reply delivery. Failures at any stage are
//! logged and reported as a [`RelayOutcome`]; nothing is surfaced to the
//! webhook caller or the sender.

use std::sync::Arc;

use crate::Result;
use crate::assistant::{RunOrchestrator, SessionRegistry};
use crate::channels::{Channel, OutgoingMessage, WhatsAppWebhook};
use crate::instruction::InstructionResolver;

/// What happened to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The event carried no text message
    NoInstruction,
    /// No sender on the event and no default recipient configured
    NoRecipient,
    /// The run ended without a reply
    NoReply,
    /// Reply delivered
    Delivered { to: String },
    /// Instruction resolution or the assistant run failed
    Failed,
    /// Reply produced but the channel rejected it
    DispatchFailed,
}

/// Relays webhook events to the assistant and replies back
pub struct Relay {
    resolver: InstructionResolver,
    sessions: SessionRegistry,
    orchestrator: RunOrchestrator,
    channel: Arc<dyn Channel>,
    default_recipient: Option<String>,
}

impl Relay {
    /// Assemble a relay from its stages
    #[must_use]
    pub fn new(
        resolver: InstructionResolver,
        sessions: SessionRegistry,
        orchestrator: RunOrchestrator,
        channel: Arc<dyn Channel>,
    ) -> Self {
        Self {
            resolver,
            sessions,
            orchestrator,
            channel,
            default_recipient: None,
        }
    }

    /// Deliver to `recipient` when an event has no sender
    #[must_use]
    pub fn with_default_recipient(mut self, recipient: Option<String>) -> Self {
        self.default_recipient = recipient;
        self
    }

    /// Session registry, for startup warm-up
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Assistant replies come from
    #[must_use]
    pub fn assistant_id(&self) -> &str {
        self.orchestrator.assistant_id()
    }

    /// Process one event end to end
    pub async fn handle_event(&self, event: &WhatsAppWebhook) -> RelayOutcome {
        let (to, reply) = match self.produce_reply(event).await {
            Ok(Produced::Reply { to, text }) => (to, text),
            Ok(Produced::Nothing(outcome)) => return outcome,
            Err(e) => {
                tracing::error!(error = %e, "failed to produce assistant reply");
                return RelayOutcome::Failed;
            }
        };

        let message = OutgoingMessage {
            to: to.clone(),
            content: reply,
        };
        match self.channel.send(message).await {
            Ok(()) => {
                tracing::info!(channel = self.channel.name(), to = %to, "reply delivered");
                RelayOutcome::Delivered { to }
            }
            Err(e) => {
                tracing::error!(
                    channel = self.channel.name(),
                    to = %to,
                    error = %e,
                    "failed to deliver reply"
                );
                RelayOutcome::DispatchFailed
            }
        }
    }

    async fn produce_reply(&self, event: &WhatsAppWebhook) -> Result<Produced> {
        let messages = event.text_messages();
        let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();

        let Some(instruction) = self.resolver.resolve(&bodies).await? else {
            tracing::debug!("no valid instruction received or message body is empty");
            return Ok(Produced::Nothing(RelayOutcome::NoInstruction));
        };

        let first = messages.first();
        let message_id = first.and_then(|m| m.id.as_deref()).unwrap_or_default();
        let sender = first.and_then(|m| m.from.clone());
        let Some(to) = sender.or_else(|| self.default_recipient.clone()) else {
            tracing::warn!("event has no sender and no default recipient is configured");
            return Ok(Produced::Nothing(RelayOutcome::NoRecipient));
        };

        let session = self.sessions.session_for(&to).await?;
        tracing::info!(
            sender = %to,
            message_id,
            thread_id = %session.thread_id(),
            source = ?instruction.source,
            "relaying instruction to assistant"
        );

        match self.orchestrator.run(&session, &instruction.text).await? {
            Some(text) => Ok(Produced::Reply { to, text }),
            None => Ok(Produced::Nothing(RelayOutcome::NoReply)),
        }
    }
}

enum Produced {
    Reply { to: String, text: String },
    Nothing(RelayOutcome),
}
