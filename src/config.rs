//! Configuration for the assistant relay
//!
//! Everything is read once at startup from environment variables. A `.env`
//! file in the working directory is loaded first by the binary.

use std::time::Duration;

use secrecy::SecretString;

use crate::assistant::{PollPolicy, SessionScope};
use crate::{Error, Result, vision};

/// Port used when `PORT` is unset
pub const DEFAULT_PORT: u16 = 1337;

/// Assistant service root used when `OPENAI_BASE_URL` is unset
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// `WhatsApp` channel settings
    pub whatsapp: WhatsAppConfig,

    /// Assistant and vision service settings
    pub openai: OpenAiConfig,

    /// Run polling
    pub poll: PollPolicy,

    /// How senders map onto assistant threads
    pub session_scope: SessionScope,

    /// Port the webhook server listens on
    pub port: u16,
}

/// `WhatsApp` Cloud API settings
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Bearer token for the send endpoint (`WHATSAPP_TOKEN`)
    pub access_token: SecretString,

    /// Messages endpoint replies are POSTed to (`WHATSAPP_URL`)
    pub send_url: String,

    /// Secret expected in the verification handshake (`VERIFY_TOKEN`)
    pub verify_token: SecretString,

    /// Recipient used when an event carries no sender (`WHATSAPP_DEFAULT_RECIPIENT`)
    pub default_recipient: Option<String>,
}

/// Assistant and vision service settings
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for both assistants and vision (`OPEN_VISION_API_KEY`)
    pub api_key: SecretString,

    /// Assistant every run is started against (`ASSISTANT_ID`)
    pub assistant_id: String,

    /// API root (`OPENAI_BASE_URL`)
    pub base_url: String,

    /// Vision model (`OPENAI_VISION_MODEL`)
    pub vision_model: String,

    /// Image described when an empty reference is given (`VISION_DEFAULT_IMAGE_URL`)
    pub default_image_url: String,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is invalid
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns error if a required variable is missing or a value is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("{key} must be set")))
        };

        let whatsapp = WhatsAppConfig {
            access_token: SecretString::from(require("WHATSAPP_TOKEN")?),
            send_url: require("WHATSAPP_URL")?,
            verify_token: SecretString::from(require("VERIFY_TOKEN")?),
            default_recipient: get("WHATSAPP_DEFAULT_RECIPIENT"),
        };

        let openai = OpenAiConfig {
            api_key: SecretString::from(require("OPEN_VISION_API_KEY")?),
            assistant_id: require("ASSISTANT_ID")?,
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            vision_model: get("OPENAI_VISION_MODEL")
                .unwrap_or_else(|| vision::DEFAULT_MODEL.to_string()),
            default_image_url: get("VISION_DEFAULT_IMAGE_URL")
                .unwrap_or_else(|| vision::DEFAULT_IMAGE_URL.to_string()),
        };

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            interval: parse_var(&get, "RELAY_POLL_INTERVAL_MS")?
                .map_or(defaults.interval, Duration::from_millis),
            max_attempts: parse_var(&get, "RELAY_POLL_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
        };
        if poll.max_attempts == 0 {
            return Err(Error::Config(
                "RELAY_POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let session_scope = get("RELAY_SESSION_SCOPE")
            .map(|s| s.parse::<SessionScope>())
            .transpose()?
            .unwrap_or_default();

        let port = parse_var(&get, "PORT")?.unwrap_or(DEFAULT_PORT);

        Ok(Self {
            whatsapp,
            openai,
            poll,
            session_scope,
            port,
        })
    }
}

/// Parse an optional numeric variable
fn parse_var<T, F>(get: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key} '{raw}': {e}")))
        })
        .transpose()
}
