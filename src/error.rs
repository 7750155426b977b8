//! Error types for the assistant relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while relaying messages
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Vision API error
    #[error("vision error: {0}")]
    Vision(String),

    /// Assistant service error (threads, messages, runs)
    #[error("assistant error: {0}")]
    Assistant(String),

    /// Run did not reach a terminal state within the poll budget
    #[error("run {run_id} still pending after {attempts} polls")]
    RunTimeout {
        /// Run that was being polled
        run_id: String,
        /// Number of status checks performed
        attempts: u32,
    },

    /// Polling was interrupted by shutdown
    #[error("run {0} polling cancelled")]
    RunCancelled(String),

    /// Channel (reply delivery) error
    #[error("channel error: {0}")]
    Channel(String),

    /// IO error while serving
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
