//! `WhatsApp` channel adapter
//!
//! Uses the `WhatsApp` Cloud API for sending. Inbound messages arrive through
//! the `/webhook` endpoint as [`WhatsAppWebhook`] payloads.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use super::{Channel, OutgoingMessage};
use crate::{Error, Result};

/// `WhatsApp` channel adapter
pub struct WhatsAppChannel {
    /// `WhatsApp` Business API access token
    access_token: SecretString,
    /// Full messages endpoint, e.g. `https://graph.facebook.com/v18.0/<phone-id>/messages`
    send_url: String,
    client: Client,
}

impl WhatsAppChannel {
    /// Create a new `WhatsApp` channel adapter
    ///
    /// # Arguments
    ///
    /// * `access_token` - `WhatsApp` Business API access token
    /// * `send_url` - messages endpoint of the sending phone number
    #[must_use]
    pub fn new(access_token: SecretString, send_url: String) -> Self {
        Self {
            access_token,
            send_url,
            client: Client::new(),
        }
    }

    /// Send a text message to a `WhatsApp` number
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or is rejected
    pub async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": text
            }
        });

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("WhatsApp API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "WhatsApp API error: {status} - {body}"
            )));
        }

        tracing::debug!(to, "WhatsApp message sent");
        Ok(())
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        self.send_text(&message.to, &message.content).await
    }
}

/// A text message pulled out of a webhook payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    /// Sender phone number, when the platform supplied one
    pub from: Option<String>,
    /// Platform message ID
    pub id: Option<String>,
    /// Text body, never empty
    pub body: String,
}

/// `WhatsApp` webhook payload from Cloud API
///
/// Each entry, change and message decodes on its own: an element with an
/// unexpected shape is dropped without affecting its siblings.
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppWebhook {
    /// Top-level object marker (`whatsapp_business_account`)
    #[serde(default, deserialize_with = "lenient")]
    pub object: Option<String>,
    /// Webhook entries
    #[serde(default, deserialize_with = "lenient_vec")]
    pub entry: Vec<WhatsAppWebhookEntry>,
}

/// `WhatsApp` webhook entry
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppWebhookEntry {
    /// Changes in this entry
    #[serde(default, deserialize_with = "lenient_vec")]
    pub changes: Vec<WhatsAppWebhookChange>,
}

/// `WhatsApp` webhook change
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppWebhookChange {
    /// The change value
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<WhatsAppWebhookValue>,
}

/// `WhatsApp` webhook value containing messages
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppWebhookValue {
    /// Incoming messages (empty for status updates)
    #[serde(default, deserialize_with = "lenient_vec")]
    pub messages: Vec<WhatsAppMessage>,
}

/// `WhatsApp` message
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppMessage {
    /// Sender phone number
    #[serde(default)]
    pub from: Option<String>,
    /// Message ID
    #[serde(default)]
    pub id: Option<String>,
    /// Text content (for text messages)
    #[serde(default)]
    pub text: Option<WhatsAppTextContent>,
}

/// `WhatsApp` text message content
#[derive(Debug, Default, Deserialize)]
pub struct WhatsAppTextContent {
    /// Message body
    #[serde(default)]
    pub body: Option<String>,
}

/// Decode a field, treating a shape mismatch as absent
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Decode a list element by element, dropping elements that do not match
fn lenient_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if decoded.len() < total {
        tracing::debug!(
            skipped = total - decoded.len(),
            "dropped webhook elements with unexpected shape"
        );
    }
    Ok(decoded)
}

impl WhatsAppWebhook {
    /// Decode a payload leniently
    ///
    /// A payload that is not a JSON object yields an empty event.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "webhook payload is not an object");
            Self::default()
        })
    }

    /// Text messages in document order (entries, then changes, then messages)
    ///
    /// Messages without a non-empty text body, such as media without a
    /// caption, are skipped.
    #[must_use]
    pub fn text_messages(&self) -> Vec<InboundText> {
        self.entry
            .iter()
            .flat_map(|entry| &entry.changes)
            .filter_map(|change| change.value.as_ref())
            .flat_map(|value| &value.messages)
            .filter_map(|msg| {
                let body = msg.text.as_ref()?.body.as_ref()?;
                if body.is_empty() {
                    return None;
                }
                Some(InboundText {
                    from: msg.from.clone(),
                    id: msg.id.clone(),
                    body: body.clone(),
                })
            })
            .collect()
    }
}
