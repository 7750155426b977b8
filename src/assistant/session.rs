//! Conversation sessions: which assistant thread a sender talks to

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, OnceCell};

use super::AssistantApi;
use crate::{Error, Result};

/// Registry key used when every sender shares one thread
const SHARED_KEY: &str = "*";

/// How senders are mapped onto assistant threads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionScope {
    /// One thread per sender, created on first contact
    #[default]
    PerSender,
    /// One thread for the whole process, created at startup
    Shared,
}

impl FromStr for SessionScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "per-sender" | "per_sender" | "sender" => Ok(Self::PerSender),
            "shared" | "global" => Ok(Self::Shared),
            other => Err(Error::Config(format!("unknown session scope: {other}"))),
        }
    }
}

/// A live assistant thread
///
/// Turns on one session are serialised: a caller holds [`Session::begin_turn`]
/// from appending the instruction until the reply has been read.
#[derive(Debug)]
pub struct Session {
    thread_id: String,
    turn: Mutex<()>,
}

impl Session {
    /// Wrap an existing thread
    #[must_use]
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            turn: Mutex::new(()),
        }
    }

    /// Assistant thread identifier
    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Wait until no other turn is running on this thread
    pub async fn begin_turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }
}

/// Lazily-populated map from session key to assistant thread
///
/// Sessions live for the process lifetime; the map holds one entry per
/// sender that has had a thread opened and is not bounded. Keys whose thread
/// creation failed are removed again.
pub struct SessionRegistry {
    api: Arc<dyn AssistantApi>,
    scope: SessionScope,
    sessions: Mutex<HashMap<String, Arc<OnceCell<Arc<Session>>>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(api: Arc<dyn AssistantApi>, scope: SessionScope) -> Self {
        Self {
            api,
            scope,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Configured scope
    #[must_use]
    pub const fn scope(&self) -> SessionScope {
        self.scope
    }

    /// Open the process-wide thread up front when running with a shared scope
    ///
    /// No-op for per-sender scope.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be created
    pub async fn warm_up(&self) -> Result<()> {
        if self.scope == SessionScope::Shared {
            let session = self.session_for(SHARED_KEY).await?;
            tracing::info!(thread_id = %session.thread_id(), "shared conversation thread ready");
        }
        Ok(())
    }

    /// Session for a sender, creating its thread on first use
    ///
    /// Concurrent first calls for the same key create exactly one thread.
    ///
    /// # Errors
    ///
    /// Returns error if a new thread is needed and cannot be created
    pub async fn session_for(&self, sender: &str) -> Result<Arc<Session>> {
        let key = match self.scope {
            SessionScope::PerSender => sender,
            SessionScope::Shared => SHARED_KEY,
        };

        let cell = {
            let mut sessions = self.sessions.lock().await;
            Arc::clone(sessions.entry(key.to_string()).or_default())
        };

        let created = cell
            .get_or_try_init(|| async {
                let thread = self.api.create_thread().await?;
                tracing::info!(session = key, thread_id = %thread.id, "opened conversation thread");
                Ok::<_, Error>(Arc::new(Session::new(thread.id)))
            })
            .await;

        match created {
            Ok(session) => Ok(Arc::clone(session)),
            Err(e) => {
                self.forget_unopened(key, &cell).await;
                Err(e)
            }
        }
    }

    /// Drop a key whose thread was never opened, unless another caller has
    /// since replaced or filled its cell
    async fn forget_unopened(&self, key: &str, cell: &Arc<OnceCell<Arc<Session>>>) {
        let mut sessions = self.sessions.lock().await;
        let stale = sessions
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            sessions.remove(key);
        }
    }

    /// Number of sessions with an open thread
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.lock().await;
        sessions.values().filter(|cell| cell.initialized()).count()
    }

    /// Whether no thread has been opened yet
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
