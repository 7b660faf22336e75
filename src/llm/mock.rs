//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按调用顺序依次返回预设回复；回复用尽后重复最后一条。可选延迟，用于触发调用方超时。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message};

#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Vec<Result<String, LlmError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.replies.push(Ok(reply.into()));
        self
    }

    pub fn with_error(mut self, error: LlmError) -> Self {
        self.replies.push(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 始终失败的客户端
    pub fn failing() -> Self {
        Self::new().with_error(LlmError::Request("mock backend unavailable".to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        match self.replies.get(n).or_else(|| self.replies.last()) {
            Some(reply) => reply.clone(),
            None => Err(LlmError::EmptyResponse),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_repeat_last() {
        let mock = MockLlmClient::new().with_reply("one").with_reply("two");
        let msgs = [Message::user("hi")];
        assert_eq!(mock.complete(&msgs).await.unwrap(), "one");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "two");
        assert_eq!(mock.complete(&msgs).await.unwrap(), "two");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_mock_is_empty() {
        let mock = MockLlmClient::new();
        assert_eq!(mock.complete(&[]).await, Err(LlmError::EmptyResponse));
    }
}
