//! Chat completion backends

mod openai;

pub use openai::OpenAiChatProvider;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One turn of a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion interface: a history in, one assistant message out
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String>;

    fn provider_name(&self) -> &str;
}

/// Canned-answer chat provider for development and tests; remembers the
/// last conversation it was given
pub struct MockChatProvider {
    answer: String,
    fail: bool,
    last_messages: Mutex<Option<Vec<ChatMessage>>>,
}

impl MockChatProvider {
    pub fn new<S: Into<String>>(answer: S) -> Self {
        Self {
            answer: answer.into(),
            fail: false,
            last_messages: Mutex::new(None),
        }
    }

    /// A provider whose every completion fails
    pub fn failing() -> Self {
        Self {
            answer: String::new(),
            fail: true,
            last_messages: Mutex::new(None),
        }
    }

    pub fn last_messages(&self) -> Option<Vec<ChatMessage>> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        *self.last_messages.lock().unwrap() = Some(messages.to_vec());
        if self.fail {
            return Err(Error::chat("mock chat failure"));
        }
        Ok(self.answer.clone())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_echoes_configured_answer_and_records_history() {
        let provider = MockChatProvider::new("OK");
        let cancel = CancellationToken::new();
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hello")];
        let answer = provider.complete(&messages, &cancel).await.unwrap();
        assert_eq!(answer, "OK");
        assert_eq!(provider.last_messages().unwrap(), messages);
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let provider = MockChatProvider::failing();
        let cancel = CancellationToken::new();
        let result = provider.complete(&[ChatMessage::user("hi")], &cancel).await;
        assert!(matches!(result, Err(Error::Chat { .. })));
    }
}
