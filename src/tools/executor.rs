//! 并发执行器
//!
//! 每个计划项在独立的 tokio 任务中运行，并受单次调用超时约束；失败、超时、panic 都只产生
//! 一条失败结果，不影响其它调用。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::planner::{InvocationPlan, PlannedInvocation};
use crate::tools::{CapabilityError, CapabilityRegistry, Strand};

/// 一次调用的结果：result 与 error 恰有一个
#[derive(Debug, Clone, Serialize)]
pub struct InvocationOutcome {
    pub tool: String,
    pub strand: Option<Strand>,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub reasoning: String,
    pub duration_ms: u64,
}

impl InvocationOutcome {
    fn new(call: &PlannedInvocation, strand: Option<Strand>, outcome: Result<Value, CapabilityError>, duration_ms: u64) -> Self {
        let (result, error) = match outcome {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            tool: call.tool.clone(),
            strand,
            parameters: call.parameters.clone(),
            result,
            error,
            reasoning: call.reasoning.clone(),
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ConcurrentExecutor {
    registry: Arc<CapabilityRegistry>,
    timeout: Duration,
}

impl ConcurrentExecutor {
    pub fn new(registry: Arc<CapabilityRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 测试中需要亚秒级超时
    pub fn with_timeout(registry: Arc<CapabilityRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// 并发执行全部计划项，等待全部结束；结果数量与计划项数量相同
    pub async fn execute(&self, plan: &InvocationPlan) -> Vec<InvocationOutcome> {
        let tasks = plan.invocations.iter().map(|call| self.execute_one(call));
        join_all(tasks).await
    }

    async fn execute_one(&self, call: &PlannedInvocation) -> InvocationOutcome {
        let start = Instant::now();
        let planned_strand = call.strand.as_deref().and_then(Strand::parse);

        let capability = match self.registry.resolve(&call.tool, &call.parameters) {
            Ok(c) => c,
            Err(e) => {
                audit(call, planned_strand, "rejected", start);
                return InvocationOutcome::new(call, planned_strand, Err(e), elapsed_ms(start));
            }
        };
        let strand = Some(capability.strand());
        let params = call.parameters.clone();
        let limit = self.timeout;
        let handle = tokio::spawn(async move { timeout(limit, capability.invoke(params)).await });

        let (label, result) = match handle.await {
            Ok(Ok(Ok(v))) => ("ok", Ok(v)),
            Ok(Ok(Err(e))) => ("error", Err(e)),
            Ok(Err(_)) => (
                "timeout",
                Err(CapabilityError::Timeout(call.tool.clone(), self.timeout.as_secs().max(1))),
            ),
            Err(join_err) => {
                tracing::warn!(tool = %call.tool, error = %join_err, "capability task aborted");
                ("panic", Err(CapabilityError::Panicked(call.tool.clone())))
            }
        };
        audit(call, strand, label, start);
        InvocationOutcome::new(call, strand, result, elapsed_ms(start))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn audit(call: &PlannedInvocation, strand: Option<Strand>, outcome: &str, start: Instant) {
    let audit = serde_json::json!({
        "event": "capability_audit",
        "tool": call.tool,
        "strand": strand.map(|s| s.key()),
        "ok": outcome == "ok",
        "outcome": outcome,
        "duration_ms": elapsed_ms(start),
        "args_preview": args_preview(&call.parameters),
    });
    tracing::info!(audit = %audit.to_string(), "capability");
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlanSource;
    use crate::tools::registry::tests::{stub, StubCapability};
    use crate::tools::{Capability, ParamSpec};
    use async_trait::async_trait;
    use serde_json::json;

    struct PanickingCapability;

    #[async_trait]
    impl Capability for PanickingCapability {
        fn name(&self) -> &str {
            "boom"
        }
        fn strand(&self) -> Strand {
            Strand::LiveData
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn parameters(&self) -> &[ParamSpec] {
            &[]
        }
        async fn invoke(&self, _params: Value) -> Result<Value, CapabilityError> {
            panic!("provider exploded")
        }
    }

    fn call(tool: &str) -> PlannedInvocation {
        PlannedInvocation::new(tool, json!({"query": "q"}), "conference", "test")
    }

    fn executor(timeout: Duration) -> ConcurrentExecutor {
        let mut r = CapabilityRegistry::new();
        r.register(stub("one", Strand::Conference));
        r.register(StubCapability {
            name: "two",
            strand: Strand::Documentation,
            fail: true,
            delay_ms: 0,
        });
        r.register(stub("three", Strand::LiveData));
        r.register(StubCapability {
            name: "slow",
            strand: Strand::LiveData,
            fail: false,
            delay_ms: 2_000,
        });
        r.register(PanickingCapability);
        ConcurrentExecutor::with_timeout(Arc::new(r), timeout)
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let plan = InvocationPlan::new(vec![call("one"), call("two"), call("three")], PlanSource::Rules);
        let outcomes = executor(Duration::from_secs(5)).execute(&plan).await;

        assert_eq!(outcomes.len(), 3);
        let by_name = |n: &str| outcomes.iter().find(|o| o.tool == n).unwrap();
        assert!(by_name("one").is_success());
        assert!(by_name("three").is_success());
        assert_eq!(by_name("two").error.as_deref(), Some("Provider error: stub failure"));
        assert_eq!(by_name("two").strand, Some(Strand::Documentation));
    }

    #[tokio::test]
    async fn test_timeout_and_panic_become_failures() {
        let plan = InvocationPlan::new(vec![call("slow"), call("boom"), call("one")], PlanSource::Rules);
        let outcomes = executor(Duration::from_millis(100)).execute(&plan).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].error.as_deref().unwrap().contains("timed out"));
        assert!(outcomes[1].error.as_deref().unwrap().contains("panicked"));
        assert!(outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_unknown_tool_and_missing_params() {
        let mut bad = call("one");
        bad.parameters = json!({});
        let plan = InvocationPlan::new(vec![call("teleport"), bad], PlanSource::Classifier);
        let outcomes = executor(Duration::from_secs(1)).execute(&plan).await;

        assert_eq!(outcomes[0].error.as_deref(), Some("Unknown tool: teleport"));
        assert_eq!(outcomes[0].strand, Some(Strand::Conference));
        assert!(outcomes[1].error.as_deref().unwrap().contains("missing required parameter 'query'"));
    }

    #[tokio::test]
    async fn test_empty_plan() {
        let plan = InvocationPlan::new(vec![], PlanSource::Rules);
        assert!(executor(Duration::from_secs(1)).execute(&plan).await.is_empty());
    }
}
