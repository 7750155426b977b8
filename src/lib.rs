//! Assistant Relay - `WhatsApp` webhook bridge to hosted AI assistant threads
//!
//! Inbound `WhatsApp` messages are posted to an assistant thread, the
//! resulting run is polled to completion, and the assistant's reply is sent
//! back to the sender.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        Webhook Ingress (GET/POST /webhook)   │
//! └──────────────────────┬───────────────────────┘
//!                        │ event
//! ┌──────────────────────▼───────────────────────┐
//! │  Extract text  →  Resolve instruction        │
//! │                   (images via Vision)        │
//! └──────────────────────┬───────────────────────┘
//!                        │ instruction
//! ┌──────────────────────▼───────────────────────┐
//! │  Session (thread per sender)  →  Run + poll  │
//! └──────────────────────┬───────────────────────┘
//!                        │ reply
//! ┌──────────────────────▼───────────────────────┐
//! │            WhatsApp channel (send)           │
//! └──────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod channels;
pub mod config;
pub mod error;
pub mod instruction;
pub mod relay;
pub mod vision;

pub use api::{ApiServer, ApiState};
pub use assistant::{
    AssistantApi, OpenAiAssistantClient, PollPolicy, RunOrchestrator, RunStatus, Session,
    SessionRegistry, SessionScope,
};
pub use channels::{Channel, OutgoingMessage, WhatsAppChannel, WhatsAppWebhook};
pub use config::Config;
pub use error::{Error, Result};
pub use instruction::{Instruction, InstructionResolver, InstructionSource, is_image_url};
pub use relay::{Relay, RelayOutcome};
pub use vision::{VisionClient, VisionDescriber};
