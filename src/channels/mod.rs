//! Messaging channel adapters
//!
//! A channel delivers assistant replies back to the person who wrote in.

mod whatsapp;

use async_trait::async_trait;

pub use whatsapp::{
    InboundText, WhatsAppChannel, WhatsAppMessage, WhatsAppTextContent, WhatsAppWebhook,
    WhatsAppWebhookChange, WhatsAppWebhookEntry, WhatsAppWebhookValue,
};

use crate::Result;

/// A message to send through a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Recipient identifier (phone number for `WhatsApp`)
    pub to: String,

    /// Message text
    pub content: String,
}

/// Outbound side of a messaging channel
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logging
    fn name(&self) -> &'static str;

    /// Deliver a message
    async fn send(&self, message: OutgoingMessage) -> Result<()>;
}
