//! 结果合成：摘要器优先，失败、超时或空文本时使用模板

pub mod summarizer;
pub mod template;

use std::sync::Arc;
use std::time::Duration;

pub use summarizer::{summarizer_user_prompt, LlmSummarizer, Summarizer};
pub use template::{render, HELP_TEXT, NO_DATA};

use crate::core::StrandError;
use crate::tools::InvocationOutcome;

pub struct ResultSynthesizer {
    summarizer: Option<Arc<dyn Summarizer>>,
    timeout: Duration,
}

impl ResultSynthesizer {
    pub fn new(summarizer: Option<Arc<dyn Summarizer>>, timeout: Duration) -> Self {
        Self { summarizer, timeout }
    }

    pub fn template_only() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    /// 从不失败；没有结果时直接返回帮助文本
    pub async fn synthesize(&self, query: &str, outcomes: &[InvocationOutcome]) -> String {
        if outcomes.is_empty() {
            return HELP_TEXT.to_string();
        }
        match self.summarize(query, outcomes).await {
            Ok(text) => text,
            Err(e) => {
                if self.summarizer.is_some() {
                    tracing::warn!(error = %e, "summarizer unusable, rendering template");
                }
                render(outcomes)
            }
        }
    }

    async fn summarize(&self, query: &str, outcomes: &[InvocationOutcome]) -> Result<String, StrandError> {
        let summarizer = self
            .summarizer
            .as_ref()
            .ok_or_else(|| StrandError::SynthesisFailure("no summarizer configured".to_string()))?;
        let text = tokio::time::timeout(self.timeout, summarizer.summarize(query, outcomes))
            .await
            .map_err(|_| StrandError::SynthesisFailure(format!("summarizer timed out after {}s", self.timeout.as_secs())))?
            .map_err(|e| StrandError::SynthesisFailure(e.to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(StrandError::SynthesisFailure("summarizer returned blank text".to_string()));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::Strand;
    use serde_json::json;

    fn outcomes() -> Vec<InvocationOutcome> {
        vec![InvocationOutcome {
            tool: "get_weather".to_string(),
            strand: Some(Strand::LiveData),
            parameters: json!({"location": "Austin"}),
            result: Some(json!({"location": "Austin", "temperature": 91})),
            error: None,
            reasoning: String::new(),
            duration_ms: 3,
        }]
    }

    fn synth(mock: MockLlmClient, timeout: Duration) -> ResultSynthesizer {
        let s: Arc<dyn Summarizer> = Arc::new(LlmSummarizer::new(Arc::new(mock)));
        ResultSynthesizer::new(Some(s), timeout)
    }

    #[tokio::test]
    async fn test_summarizer_text_used() {
        let s = synth(MockLlmClient::new().with_reply("  It is 91°F in Austin.  "), Duration::from_secs(5));
        assert_eq!(s.synthesize("weather", &outcomes()).await, "It is 91°F in Austin.");
    }

    #[tokio::test]
    async fn test_blank_failure_and_timeout_use_template() {
        let expected = render(&outcomes());
        for s in [
            synth(MockLlmClient::new().with_reply("   "), Duration::from_secs(5)),
            synth(MockLlmClient::failing(), Duration::from_secs(5)),
            synth(
                MockLlmClient::new().with_reply("late").with_delay(Duration::from_secs(2)),
                Duration::from_millis(50),
            ),
            ResultSynthesizer::template_only(),
        ] {
            assert_eq!(s.synthesize("weather", &outcomes()).await, expected);
        }
    }

    #[tokio::test]
    async fn test_no_outcomes_is_help() {
        let s = synth(MockLlmClient::new().with_reply("ignored"), Duration::from_secs(5));
        assert_eq!(s.synthesize("hello", &[]).await, HELP_TEXT);
    }

    #[test]
    fn test_prompt_contains_errors_and_results() {
        let mut all = outcomes();
        all[0].error = Some("boom".to_string());
        let prompt = summarizer_user_prompt("q", &all);
        assert!(prompt.contains("boom"));
        assert!(prompt.contains("Austin"));
    }
}
