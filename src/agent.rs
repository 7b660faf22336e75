//! Agent 运行时
//!
//! handle 对单条查询执行：目录可用性检查 → 意图规划 → 并发调用 → 结果合成，
//! 返回带调用明细的 AgentResponse。CLI 与 HTTP 入口都只调用这里。

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::{CatalogError, EventRepository};
use crate::core::StrandError;
use crate::planner::{IntentPlanner, PlanSource};
use crate::synth::ResultSynthesizer;
use crate::tools::{CapabilityRegistry, ConcurrentExecutor, InvocationOutcome, Strand};

pub const CATALOG_UNAVAILABLE: &str =
    "I'm sorry, the session catalog is unavailable right now, so I can't answer that. Please try again in a moment.";

/// 单次调用的对外摘要
#[derive(Debug, Clone, Serialize)]
pub struct InvocationSummary {
    pub tool: String,
    pub strand: Option<Strand>,
    pub server: Option<&'static str>,
    pub parameters: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl From<&InvocationOutcome> for InvocationSummary {
    fn from(o: &InvocationOutcome) -> Self {
        Self {
            tool: o.tool.clone(),
            strand: o.strand,
            server: o.strand.map(|s| s.server()),
            parameters: o.parameters.clone(),
            success: o.is_success(),
            error: o.error.clone(),
            duration_ms: o.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    pub answer: String,
    pub invocations: Vec<InvocationSummary>,
    pub strands_activated: Vec<Strand>,
    /// 目录不可用时请求在规划前结束，此时为 None
    pub plan_source: Option<PlanSource>,
    pub request_id: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 完整调用结果（仅 --json / 调试输出使用）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<InvocationOutcome>,
}

impl AgentResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct Agent {
    name: String,
    repo: Arc<dyn EventRepository>,
    registry: Arc<CapabilityRegistry>,
    planner: IntentPlanner,
    executor: ConcurrentExecutor,
    synthesizer: ResultSynthesizer,
}

impl Agent {
    pub fn new(
        name: String,
        repo: Arc<dyn EventRepository>,
        registry: Arc<CapabilityRegistry>,
        planner: IntentPlanner,
        executor: ConcurrentExecutor,
        synthesizer: ResultSynthesizer,
    ) -> Self {
        Self {
            name,
            repo,
            registry,
            planner,
            executor,
            synthesizer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// 处理一条查询；从不返回错误，灾难性失败体现在 response.error
    pub async fn handle(&self, query: &str) -> AgentResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();
        tracing::info!(request_id = %request_id, query = %query, "request received");

        if let Err(e) = self.repo.count() {
            let e = StrandError::from(e);
            tracing::error!(request_id = %request_id, error = %e, "session catalog unreachable");
            return AgentResponse {
                answer: CATALOG_UNAVAILABLE.to_string(),
                invocations: Vec::new(),
                strands_activated: Vec::new(),
                plan_source: None,
                request_id,
                timestamp,
                error: Some(e.to_string()),
                outcomes: Vec::new(),
            };
        }

        let plan = self.planner.plan(query).await;
        let outcomes = self.executor.execute(&plan).await;
        let answer = self.synthesizer.synthesize(query, &outcomes).await;

        let strands_activated: Vec<Strand> = outcomes
            .iter()
            .filter_map(|o| o.strand)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            request_id = %request_id,
            source = ?plan.source,
            invocations = outcomes.len(),
            failed,
            "request done"
        );

        AgentResponse {
            answer,
            invocations: outcomes.iter().map(InvocationSummary::from).collect(),
            strands_activated,
            plan_source: Some(plan.source),
            request_id,
            timestamp,
            error: None,
            outcomes,
        }
    }

    /// 目录概况（/api/database/info）
    pub fn try_catalog_info(&self) -> Result<Value, CatalogError> {
        Ok(json!({
            "total_sessions": self.repo.count()?,
            "types": self.repo.distinct_types()?,
            "venues": self.repo.distinct_venues()?,
            "levels": self.repo.distinct_levels()?,
            "days": self.repo.distinct_days()?,
        }))
    }

    pub fn catalog_info(&self) -> Value {
        self.try_catalog_info()
            .unwrap_or_else(|e| json!({"error": e.to_string()}))
    }

    /// 规划模式：有分类器为 "classifier"，否则 "rules"
    pub fn planner_mode(&self) -> &'static str {
        if self.planner.has_classifier() {
            "classifier"
        } else {
            "rules"
        }
    }

    /// 健康状态（/api/health）；目录不可达时 status 为 "degraded"
    pub fn health(&self) -> Value {
        let count = self.repo.count();
        if let Err(e) = &count {
            tracing::warn!(error = %e, "health check: catalog unreachable");
        }
        json!({
            "status": if count.is_ok() { "healthy" } else { "degraded" },
            "servers": Strand::ALL.iter().map(|s| s.server()).collect::<Vec<_>>(),
            "database": if count.is_ok() { "connected" } else { "error" },
            "sessionsCount": count.unwrap_or(0),
            "llmAgent": self.planner_mode(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}
