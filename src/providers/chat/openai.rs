//! OpenAI-compatible chat completion provider
//!
//! Shares the embedding client's endpoint auto-selection: an `azure.com`
//! host uses the managed deployment path and `api-key` header, anything
//! else the direct `/chat/completions` path with a bearer token.

use super::{ChatMessage, ChatProvider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const MANAGED_API_VERSION: &str = "2024-02-01";

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct OpenAiChatProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiChatProvider {
    pub fn new(endpoint: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn is_managed(&self) -> bool {
        reqwest::Url::parse(&self.endpoint)
            .ok()
            .and_then(|url| url.host_str().map(String::from))
            .map(|host| host == "azure.com" || host.ends_with(".azure.com"))
            .unwrap_or(false)
    }

    fn chat_url(&self) -> String {
        if self.is_managed() {
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint, self.model, MANAGED_API_VERSION
            )
        } else {
            format!("{}/chat/completions", self.endpoint)
        }
    }

    async fn request(&self, messages: &[ChatMessage]) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        let mut request = self.client.post(self.chat_url()).json(&payload);
        request = if self.is_managed() {
            request.header("api-key", &self.api_key)
        } else {
            request.bearer_auth(&self.api_key)
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::chat(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::chat(format!("backend returned {status}: {body}")));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::chat(format!("malformed response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::chat("no choices in response"))
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.request(messages) => result,
        }
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
