//! 摘要器：把查询与全部调用结果交给 LLM 生成自然语言回答

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{LlmClient, LlmError, Message};
use crate::tools::InvocationOutcome;

/// 注入提示词的结果 JSON 总预算（字符），按调用平分
const MAX_RESULTS_CHARS: usize = 12_000;
/// 单个调用至少保留的结果字符数
const MIN_RESULT_CHARS: usize = 400;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, query: &str, outcomes: &[InvocationOutcome]) -> Result<String, LlmError>;
}

pub struct LlmSummarizer {
    llm: Arc<dyn LlmClient>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

const SYSTEM_PROMPT: &str = "You are a conference assistant. Answer the user's request using only the tool results provided. \
Group the answer by capability, keep session titles, days and times exact, mention failed tools briefly, \
and say when data was simulated.";

/// 只截断每个调用的 result；tool / strand / parameters / error 总是完整保留
fn prompt_entry(o: &InvocationOutcome, budget: usize) -> Value {
    let mut entry = json!({
        "tool": o.tool,
        "strand": o.strand,
        "parameters": o.parameters,
        "success": o.is_success(),
    });
    if let Some(err) = &o.error {
        entry["error"] = json!(err);
    }
    if let Some(result) = &o.result {
        let text = result.to_string();
        entry["result"] = if text.chars().count() > budget {
            json!(format!("{}...[truncated]", text.chars().take(budget).collect::<String>()))
        } else {
            result.clone()
        };
    }
    entry
}

pub fn summarizer_user_prompt(query: &str, outcomes: &[InvocationOutcome]) -> String {
    let budget = (MAX_RESULTS_CHARS / outcomes.len().max(1)).max(MIN_RESULT_CHARS);
    let entries: Vec<Value> = outcomes.iter().map(|o| prompt_entry(o, budget)).collect();
    let results = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string());
    format!("User request: {query}\n\nTool results:\n{results}")
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, query: &str, outcomes: &[InvocationOutcome]) -> Result<String, LlmError> {
        let messages = [
            Message::system(SYSTEM_PROMPT),
            Message::user(summarizer_user_prompt(query, outcomes)),
        ];
        self.llm.complete(&messages).await
    }
}
