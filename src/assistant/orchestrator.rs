//! Drives one instruction through an assistant run
//!
//! A turn is: append the instruction as a user message, start a run, poll the
//! run until it reaches a terminal status, then read the reply the run wrote.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{AssistantApi, MessageRole, Run, RunStatus, Session};
use crate::{Error, Result};

/// How often and how long to poll a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status checks
    pub interval: Duration,
    /// Status checks before giving up with [`Error::RunTimeout`]
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 100,
        }
    }
}

/// Runs instructions against a fixed assistant
pub struct RunOrchestrator {
    api: Arc<dyn AssistantApi>,
    assistant_id: String,
    poll: PollPolicy,
    cancel: CancellationToken,
}

impl RunOrchestrator {
    /// Create an orchestrator for `assistant_id`
    #[must_use]
    pub fn new(
        api: Arc<dyn AssistantApi>,
        assistant_id: impl Into<String>,
        poll: PollPolicy,
    ) -> Self {
        Self {
            api,
            assistant_id: assistant_id.into(),
            poll,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight polls when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Assistant every run is started against
    #[must_use]
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Post `instruction` to the session's thread and wait for the assistant's reply
    ///
    /// Returns `Ok(None)` when the run ends without a reply (`failed`,
    /// `cancelled`, `expired`, `incomplete`, or completed with no text).
    ///
    /// # Errors
    ///
    /// Returns error if any service call fails, if the run is still pending
    /// after the poll budget ([`Error::RunTimeout`]), or if polling is
    /// cancelled ([`Error::RunCancelled`])
    pub async fn run(&self, session: &Session, instruction: &str) -> Result<Option<String>> {
        let _turn = session.begin_turn().await;
        let thread_id = session.thread_id();

        self.api.add_user_message(thread_id, instruction).await?;
        let run = self.api.create_run(thread_id, &self.assistant_id).await?;
        tracing::info!(thread_id, run_id = %run.id, "run started");

        let run = self.wait_for_run(thread_id, &run.id).await?;
        match run.status {
            RunStatus::Completed => self.fetch_reply(thread_id, &run.id).await,
            RunStatus::Failed => {
                let reason = run
                    .last_error
                    .as_ref()
                    .map_or("unknown", |e| e.message.as_str());
                tracing::warn!(thread_id, run_id = %run.id, reason, "run failed");
                Ok(None)
            }
            status => {
                tracing::warn!(thread_id, run_id = %run.id, %status, "run ended without a reply");
                Ok(None)
            }
        }
    }

    /// Poll until the run reaches a terminal status
    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let max_attempts = self.poll.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::RunCancelled(run_id.to_string()));
            }

            let run = self.api.retrieve_run(thread_id, run_id).await?;
            tracing::debug!(run_id, attempt, status = %run.status, "polled run");

            if run.status.is_terminal() {
                return Ok(run);
            }

            if attempt < max_attempts {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        return Err(Error::RunCancelled(run_id.to_string()));
                    }
                    () = tokio::time::sleep(self.poll.interval) => {}
                }
            }
        }

        Err(Error::RunTimeout {
            run_id: run_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// Newest assistant message written by the run
    async fn fetch_reply(&self, thread_id: &str, run_id: &str) -> Result<Option<String>> {
        let messages = self.api.list_messages(thread_id, Some(run_id)).await?;

        let reply = messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .find_map(|m| m.text())
            .map(ToString::to_string);

        if reply.is_none() {
            tracing::warn!(thread_id, run_id, "run completed without a text reply");
        }
        Ok(reply)
    }
}
