//! 调用计划

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 分类器输出中的一项：要调用的能力及其参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlannedInvocation {
    /// 能力名，如 search_sessions、get_weather
    pub tool: String,
    /// 参数对象，键为参数名
    #[serde(default = "empty_object")]
    pub parameters: Value,
    /// 能力所属分组：conference / documentation / liveData
    #[serde(default)]
    pub strand: Option<String>,
    /// 选择该能力的理由
    #[serde(default)]
    pub reasoning: String,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl PlannedInvocation {
    pub fn new(tool: &str, parameters: Value, strand: &str, reasoning: &str) -> Self {
        Self {
            tool: tool.to_string(),
            parameters,
            strand: Some(strand.to_string()),
            reasoning: reasoning.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanSource {
    Classifier,
    Rules,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationPlan {
    pub invocations: Vec<PlannedInvocation>,
    pub source: PlanSource,
}

impl InvocationPlan {
    pub fn new(invocations: Vec<PlannedInvocation>, source: PlanSource) -> Self {
        Self {
            invocations,
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn truncate(&mut self, max: usize) {
        if self.invocations.len() > max {
            tracing::debug!(from = self.invocations.len(), to = max, "plan truncated");
            self.invocations.truncate(max);
        }
    }
}
