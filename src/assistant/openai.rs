//! `OpenAI` Assistants API client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{Assistant, AssistantApi, Run, Thread, ThreadMessage};
use crate::{Error, Result};

/// Beta header value required by the Assistants endpoints
const ASSISTANTS_BETA: &str = "assistants=v2";

/// How many messages to request when looking for a run's reply
const REPLY_PAGE_SIZE: u32 = 20;

/// Paginated list envelope
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    data: Vec<T>,
}

/// HTTP client for threads, messages and runs
pub struct OpenAiAssistantClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiAssistantClient {
    /// Create a new client
    ///
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self::with_client(Client::new(), base_url, api_key)
    }

    /// Create a client sharing an existing connection pool
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>, api_key: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.api_key.expose_secret())
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    /// Send a request and decode a JSON body, mapping non-2xx to `Error::Assistant`
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| Error::Assistant(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Assistant(format!("API error {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Assistant(format!("parse error: {e}")))
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        let url = self.url(&format!("/assistants/{assistant_id}"));
        self.send(self.client.get(url)).await
    }

    async fn create_thread(&self) -> Result<Thread> {
        let thread: Thread = self
            .send(self.client.post(self.url("/threads")).json(&serde_json::json!({})))
            .await?;
        tracing::debug!(thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    async fn add_user_message(&self, thread_id: &str, content: &str) -> Result<ThreadMessage> {
        let url = self.url(&format!("/threads/{thread_id}/messages"));
        let body = serde_json::json!({
            "role": "user",
            "content": content,
        });
        self.send(self.client.post(url).json(&body)).await
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        let url = self.url(&format!("/threads/{thread_id}/runs"));
        let body = serde_json::json!({ "assistant_id": assistant_id });
        let run: Run = self.send(self.client.post(url).json(&body)).await?;
        tracing::debug!(thread_id, run_id = %run.id, status = %run.status, "run created");
        Ok(run)
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        let url = self.url(&format!("/threads/{thread_id}/runs/{run_id}"));
        self.send(self.client.get(url)).await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        run_id: Option<&str>,
    ) -> Result<Vec<ThreadMessage>> {
        let url = self.url(&format!("/threads/{thread_id}/messages"));
        let limit = REPLY_PAGE_SIZE.to_string();
        let mut request = self
            .client
            .get(url)
            .query(&[("order", "desc"), ("limit", limit.as_str())]);
        if let Some(run_id) = run_id {
            request = request.query(&[("run_id", run_id)]);
        }

        let page: ListResponse<ThreadMessage> = self.send(request).await?;
        Ok(page.data)
    }
}
