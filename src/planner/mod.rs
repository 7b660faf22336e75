//! 意图规划：分类器优先，失败时退回关键词规则
//!
//! plan 从不返回错误：分类器报错、超时、输出格式不对或给出空数组，都记一条 warn 后改用规则。

pub mod intent;
pub mod plan;
pub mod rules;

use std::sync::Arc;
use std::time::Duration;

pub use intent::{classifier_system_prompt, parse_classifier_output, IntentClassifier, LlmIntentClassifier};
pub use plan::{InvocationPlan, PlanSource, PlannedInvocation};
pub use rules::FallbackRules;

use crate::core::StrandError;

pub struct IntentPlanner {
    classifier: Option<Arc<dyn IntentClassifier>>,
    rules: FallbackRules,
    catalog_json: String,
    timeout: Duration,
    max_invocations: usize,
}

impl IntentPlanner {
    /// catalog_json 为能力目录（CapabilityRegistry::to_catalog_json），构造时生成一次
    pub fn new(
        classifier: Option<Arc<dyn IntentClassifier>>,
        catalog_json: String,
        timeout: Duration,
        max_invocations: usize,
    ) -> Self {
        Self {
            classifier,
            rules: FallbackRules::new(),
            catalog_json,
            timeout,
            max_invocations: max_invocations.max(1),
        }
    }

    /// 只用关键词规则
    pub fn rules_only(max_invocations: usize) -> Self {
        Self::new(None, String::new(), Duration::from_secs(1), max_invocations)
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub async fn plan(&self, query: &str) -> InvocationPlan {
        let mut plan = match self.classify(query).await {
            Ok(calls) => InvocationPlan::new(calls, PlanSource::Classifier),
            Err(e) => {
                if self.classifier.is_some() {
                    tracing::warn!(error = %e, "intent classifier unusable, using keyword rules");
                }
                InvocationPlan::new(self.rules.plan(query), PlanSource::Rules)
            }
        };
        plan.truncate(self.max_invocations);
        tracing::debug!(
            source = ?plan.source,
            tools = ?plan.invocations.iter().map(|c| c.tool.as_str()).collect::<Vec<_>>(),
            "plan ready"
        );
        plan
    }

    async fn classify(&self, query: &str) -> Result<Vec<PlannedInvocation>, StrandError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| StrandError::PlanningFailure("no intent classifier configured".to_string()))?;
        let raw = tokio::time::timeout(self.timeout, classifier.classify(query, &self.catalog_json))
            .await
            .map_err(|_| {
                StrandError::PlanningFailure(format!("classifier timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| StrandError::PlanningFailure(e.to_string()))?;
        let calls = parse_classifier_output(&raw)?;
        if calls.is_empty() {
            return Err(StrandError::PlanningFailure("classifier returned an empty plan".to_string()));
        }
        Ok(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use serde_json::json;

    fn planner(mock: MockLlmClient, timeout: Duration, max: usize) -> IntentPlanner {
        let classifier: Arc<dyn IntentClassifier> = Arc::new(LlmIntentClassifier::new(Arc::new(mock)));
        IntentPlanner::new(Some(classifier), "{}".to_string(), timeout, max)
    }

    #[tokio::test]
    async fn test_classifier_plan_is_used() {
        let reply = r#"[{"tool":"get_stock_price","parameters":{"symbol":"MSFT"},"strand":"liveData","reasoning":"quote"}]"#;
        let p = planner(MockLlmClient::new().with_reply(reply), Duration::from_secs(5), 5);
        let plan = p.plan("how is microsoft doing").await;
        assert_eq!(plan.source, PlanSource::Classifier);
        assert_eq!(plan.invocations[0].parameters, json!({"symbol": "MSFT"}));
    }

    #[tokio::test]
    async fn test_malformed_output_falls_back() {
        let p = planner(MockLlmClient::new().with_reply("Sure! Checking the weather."), Duration::from_secs(5), 5);
        let plan = p.plan("weather in Austin").await;
        assert_eq!(plan.source, PlanSource::Rules);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.invocations[0].tool, "get_weather");
        assert_eq!(plan.invocations[0].parameters, json!({"location": "Austin"}));
    }

    #[tokio::test]
    async fn test_error_timeout_and_empty_fall_back() {
        let failing = planner(
            MockLlmClient::new().with_error(LlmError::Request("down".to_string())),
            Duration::from_secs(5),
            5,
        );
        assert_eq!(failing.plan("weather").await.source, PlanSource::Rules);

        let slow = planner(
            MockLlmClient::new().with_reply("[]").with_delay(Duration::from_secs(2)),
            Duration::from_millis(50),
            5,
        );
        assert_eq!(slow.plan("weather").await.source, PlanSource::Rules);

        let empty = planner(MockLlmClient::new().with_reply("[]"), Duration::from_secs(5), 5);
        let plan = empty.plan("Show me AI sessions").await;
        assert_eq!(plan.source, PlanSource::Rules);
        assert_eq!(plan.invocations[0].tool, "search_sessions");
    }

    #[tokio::test]
    async fn test_plan_truncated() {
        let reply = json!([
            {"tool": "a"}, {"tool": "b"}, {"tool": "c"}
        ])
        .to_string();
        let p = planner(MockLlmClient::new().with_reply(reply), Duration::from_secs(5), 2);
        assert_eq!(p.plan("anything").await.len(), 2);
    }

    #[tokio::test]
    async fn test_rules_only_may_be_empty() {
        let plan = IntentPlanner::rules_only(5).plan("hello there").await;
        assert!(plan.is_empty());
        assert_eq!(plan.source, PlanSource::Rules);
    }
}
