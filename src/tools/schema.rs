//! 调用计划 JSON Schema（schemars 自动生成）
//!
//! 拼入意图分类器的提示词，约束分类器输出 `[{"tool", "parameters", "strand", "reasoning"}]`。

use schemars::schema_for;

use crate::planner::PlannedInvocation;

/// 返回调用计划数组的 JSON Schema 字符串
pub fn invocation_plan_schema_json() -> String {
    let schema = schema_for!(Vec<PlannedInvocation>);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
