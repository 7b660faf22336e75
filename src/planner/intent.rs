//! 意图分类器：查询 + 能力目录 → 原始文本，再解析为调用计划项
//!
//! 分类器输出应为 JSON 数组，可被说明文字或 ```json 代码块包裹；
//! 其余任何形态都算规划失败，由 IntentPlanner 退回关键词规则。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::StrandError;
use crate::llm::{LlmClient, LlmError, Message};
use crate::planner::PlannedInvocation;
use crate::tools::invocation_plan_schema_json;

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// catalog 为能力目录 JSON；返回分类器原始输出
    async fn classify(&self, query: &str, catalog: &str) -> Result<String, LlmError>;
}

/// 基于 LlmClient 的分类器
pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmClient>,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

pub fn classifier_system_prompt(catalog: &str) -> String {
    format!(
        "You route conference-assistant requests to tools.\n\
         Pick every tool needed to answer the user's request and bind its parameters.\n\
         Tools may come from several strands; include one entry per tool call.\n\n\
         Available tools:\n{catalog}\n\n\
         Respond with ONLY a JSON array matching this schema:\n{schema}\n\
         Return [] when no tool applies.",
        schema = invocation_plan_schema_json()
    )
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, query: &str, catalog: &str) -> Result<String, LlmError> {
        let messages = [
            Message::system(classifier_system_prompt(catalog)),
            Message::user(query),
        ];
        tracing::debug!(backend = self.llm.name(), "classifying intent");
        self.llm.complete(&messages).await
    }
}

/// 截取 JSON 数组文本：优先 ```json 代码块，其次第一个 '[' 到最后一个 ']'
fn extract_array(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let body = match trimmed.find("```json") {
        Some(start) => {
            let rest = &trimmed[start + 7..];
            rest.find("```").map(|end| &rest[..end]).unwrap_or(rest)
        }
        None => trimmed,
    };
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    (start < end).then(|| &body[start..=end])
}

/// 解析分类器输出；元素必须是带非空 tool 的对象，parameters 若存在必须是对象
pub fn parse_classifier_output(raw: &str) -> Result<Vec<PlannedInvocation>, StrandError> {
    let json = extract_array(raw)
        .ok_or_else(|| StrandError::PlanningFailure("classifier output has no JSON array".to_string()))?;
    let items: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| StrandError::PlanningFailure(format!("classifier output is not valid JSON: {e}")))?;

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let ok_shape = item
                .get("tool")
                .and_then(Value::as_str)
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false)
                && item
                    .get("parameters")
                    .map(|p| p.is_object() || p.is_null())
                    .unwrap_or(true);
            if !ok_shape {
                return Err(StrandError::PlanningFailure(format!(
                    "classifier item {i} has the wrong shape: {item}"
                )));
            }
            let mut call: PlannedInvocation = serde_json::from_value(item)
                .map_err(|e| StrandError::PlanningFailure(format!("classifier item {i}: {e}")))?;
            if call.parameters.is_null() {
                call.parameters = Value::Object(Default::default());
            }
            call.tool = call.tool.trim().to_string();
            Ok(call)
        })
        .collect()
}
