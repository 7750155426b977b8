//! Hosted assistant service: threads, messages, and runs
//!
//! The relay never talks to the service directly; everything goes through the
//! [`AssistantApi`] trait so the orchestration logic can be exercised against
//! in-memory fakes.

#[cfg(test)]
pub(crate) mod fake;
mod openai;
mod orchestrator;
mod session;

use async_trait::async_trait;
use serde::Deserialize;

pub use openai::OpenAiAssistantClient;
pub use orchestrator::{PollPolicy, RunOrchestrator};
pub use session::{Session, SessionRegistry, SessionScope};

use crate::Result;

/// Assistant definition as stored by the service
#[derive(Debug, Clone, Deserialize)]
pub struct Assistant {
    /// Assistant identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Backing model
    #[serde(default)]
    pub model: Option<String>,
}

/// Conversation thread handle
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    /// Thread identifier
    pub id: String,
}

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
    /// Status added by the service after this client was written
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether polling should stop at this status
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Incomplete | Self::Expired
        )
    }

    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the service for a failed run
#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

/// Unit of assistant work within a thread
#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    /// Run identifier
    pub id: String,
    /// Thread the run belongs to
    pub thread_id: String,
    /// Current status
    pub status: RunStatus,
    /// Failure details, present when `status` is `failed`
    #[serde(default)]
    pub last_error: Option<RunError>,
}

/// Author of a thread message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Text payload of a message content part
#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
}

/// One content part of a thread message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    /// Image files, image URLs and anything else the relay cannot forward
    #[serde(other)]
    Other,
}

/// Message stored in a thread
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    /// Message identifier
    pub id: String,
    /// Author
    pub role: MessageRole,
    /// Ordered content parts
    #[serde(default)]
    pub content: Vec<MessageContent>,
    /// Run that produced the message, for assistant messages
    #[serde(default)]
    pub run_id: Option<String>,
}

impl ThreadMessage {
    /// Primary textual content: the first text part
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

/// Operations the relay needs from the assistant service
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Fetch an assistant definition
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant>;

    /// Open a new, empty thread
    async fn create_thread(&self) -> Result<Thread>;

    /// Append a user turn to a thread
    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage>;

    /// Start a run of the given assistant on a thread
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;

    /// Fetch the current state of a run
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// List thread messages newest first, optionally only those produced by `run_id`
    async fn list_messages(
        &self,
        thread_id: &str,
        run_id: Option<&str>,
    ) -> Result<Vec<ThreadMessage>>;
}
