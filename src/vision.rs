//! Vision API client for describing images by URL
//!
//! Image messages are turned into text before they reach the assistant, so the
//! assistant only ever sees a description of the picture.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4-vision-preview";

/// Image described when a caller supplies an empty reference
pub const DEFAULT_IMAGE_URL: &str =
    "https://thepartysource.com/image/cache/catalog/inventory/ORANGE-500x500.jpg";

const PROMPT: &str = "What’s in this image?";

const MAX_TOKENS: u32 = 300;

/// Something that can describe an image
#[async_trait]
pub trait VisionDescriber: Send + Sync {
    /// Describe the image at `image_url`
    ///
    /// An empty `image_url` describes the describer's default image.
    async fn describe(&self, image_url: &str) -> Result<String>;
}

/// Chat completions request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// `OpenAI` vision client
pub struct VisionClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    default_image_url: String,
}

impl VisionClient {
    /// Create a new vision client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("API key required for vision".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            default_image_url: DEFAULT_IMAGE_URL.to_string(),
        })
    }

    /// Create with a specific model
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Image to describe when the caller gives none
    #[must_use]
    pub fn with_default_image_url(mut self, url: String) -> Self {
        self.default_image_url = url;
        self
    }
}

#[async_trait]
impl VisionDescriber for VisionClient {
    async fn describe(&self, image_url: &str) -> Result<String> {
        let image_url = if image_url.is_empty() {
            self.default_image_url.as_str()
        } else {
            image_url
        };

        let request = ChatCompletionRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text { text: PROMPT },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Vision(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("Parse error: {e}")))?;

        let description = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::Vision("Empty response from vision API".to_string()))?;

        tracing::debug!(image_url, description = %description, "image described");
        Ok(description)
    }
}
