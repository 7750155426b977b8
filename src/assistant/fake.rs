//! Scripted in-memory assistant service for unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{
    Assistant, AssistantApi, MessageContent, MessageRole, Run, RunStatus, TextContent, Thread,
    ThreadMessage,
};
use crate::{Error, Result};

/// Replays a fixed sequence of run statuses; the last status repeats
pub struct ScriptedAssistant {
    statuses: Mutex<VecDeque<RunStatus>>,
    reply: Option<String>,
    fail_append: bool,
    fail_threads: bool,
    threads: AtomicUsize,
    runs: AtomicUsize,
    polls: AtomicUsize,
    appended: Mutex<Vec<(String, String)>>,
    calls: Mutex<Vec<String>>,
}

impl Default for ScriptedAssistant {
    fn default() -> Self {
        Self::new(&[RunStatus::Completed], Some("ok"))
    }
}

impl ScriptedAssistant {
    pub fn new(statuses: &[RunStatus], reply: Option<&str>) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            reply: reply.map(ToString::to_string),
            fail_append: false,
            fail_threads: false,
            threads: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            appended: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_append() -> Self {
        Self {
            fail_append: true,
            ..Self::default()
        }
    }

    pub fn failing_threads() -> Self {
        Self {
            fail_threads: true,
            ..Self::default()
        }
    }

    pub fn threads_created(&self) -> usize {
        self.threads.load(Ordering::SeqCst)
    }

    pub fn runs_created(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// `(thread_id, content)` of every appended user message
    pub fn appended(&self) -> Vec<(String, String)> {
        self.appended.lock().unwrap().clone()
    }

    /// Appends and reply fetches in the order they happened, as
    /// `append:<content>` and `list:<run_id>`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_status(&self) -> RunStatus {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front().unwrap_or(RunStatus::Unknown)
        } else {
            statuses.front().copied().unwrap_or(RunStatus::Unknown)
        }
    }
}

#[async_trait]
impl AssistantApi for ScriptedAssistant {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        Ok(Assistant {
            id: assistant_id.to_string(),
            name: Some("test".to_string()),
            model: None,
        })
    }

    async fn create_thread(&self) -> Result<Thread> {
        let n = self.threads.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;
        if self.fail_threads {
            return Err(Error::Assistant("API error 503: unavailable".to_string()));
        }
        Ok(Thread {
            id: format!("thread_{n}"),
        })
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        if self.fail_append {
            return Err(Error::Assistant("API error 500: boom".to_string()));
        }
        self.appended
            .lock()
            .unwrap()
            .push((thread_id.to_string(), content.to_string()));
        self.record(format!("append:{content}"));
        Ok(ThreadMessage {
            id: "msg_user".to_string(),
            role: MessageRole::User,
            content: vec![],
            run_id: None,
        })
    }

    async fn create_run(&self, thread_id: &str, _assistant_id: &str) -> Result<Run> {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Run {
            id: format!("run_{n}"),
            thread_id: thread_id.to_string(),
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            status: self.next_status(),
            last_error: None,
        })
    }

    async fn list_messages(
        &self,
        _thread_id: &str,
        run_id: Option<&str>,
    ) -> Result<Vec<ThreadMessage>> {
        self.record(format!("list:{}", run_id.unwrap_or_default()));
        Ok(self
            .reply
            .iter()
            .map(|reply| ThreadMessage {
                id: "msg_reply".to_string(),
                role: MessageRole::Assistant,
                content: vec![MessageContent::Text {
                    text: TextContent {
                        value: reply.clone(),
                    },
                }],
                run_id: run_id.map(ToString::to_string),
            })
            .collect())
    }
}
