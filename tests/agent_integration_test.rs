//! Agent 端到端集成测试：目录文件 → 规划 → 并发调用 → 合成

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use strand::catalog::InMemoryRepository;
use strand::llm::MockLlmClient;
use strand::planner::PlanSource;
use strand::synth::HELP_TEXT;
use strand::tools::{Capability, CapabilityError, ParamKind, ParamSpec, Strand};
use strand::{AgentBuilder, AppConfig};

const CATALOG: &str = r#"{"sessions": [
  {"id": "ml", "title": "Intro to Machine Learning", "type": "Breakout session", "level": "200 - Intermediate",
   "dayTime": "Monday 10:00 AM - 11:00 AM", "venue": "Venetian", "tags": "developer, ai"},
  {"id": "key", "title": "Opening keynote", "type": "Keynote", "dayTime": "Monday 8:00 AM - 9:30 AM", "venue": "Venetian"},
  {"id": "agents", "title": "Building agents with Bedrock", "type": "Workshop", "dayTime": "Tuesday 10:00 AM - 12:00 PM",
   "venue": "MGM", "tags": ["ai", "agents"]},
  {"id": "pm", "title": "Product strategy for AI", "type": "Session", "dayTime": "Tuesday 10:00 AM - 11:00 AM",
   "venue": "Wynn", "tags": "product manager"},
  {"id": "net", "title": "Networking basics", "type": "Session", "day": "Wednesday", "tags": "networking"}
]}"#;

fn offline_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.tools.live.enabled = false;
    cfg
}

fn catalog_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(CATALOG.as_bytes()).unwrap();
    file
}

/// 不启动子进程的文档能力
struct FakeDocs;

const FAKE_DOCS_PARAMS: &[ParamSpec] = &[ParamSpec::required("query", ParamKind::String, "question")];

#[async_trait]
impl Capability for FakeDocs {
    fn name(&self) -> &str {
        "search_aws_docs"
    }

    fn strand(&self) -> Strand {
        Strand::Documentation
    }

    fn description(&self) -> &str {
        "fake docs"
    }

    fn parameters(&self) -> &[ParamSpec] {
        FAKE_DOCS_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        Ok(json!({
            "query": p["query"],
            "service": "all",
            "results": [{"title": "Amazon Bedrock Agents", "url": "https://docs.aws.amazon.com/bedrock/", "summary": "Agents guide", "relevance": 1.0}],
            "source": "AWS Documentation Server"
        }))
    }
}

#[tokio::test]
async fn test_recommendation_from_json_catalog() {
    let file = catalog_file();
    let agent = AgentBuilder::new(offline_config())
        .with_catalog_path(file.path())
        .without_llm()
        .build()
        .unwrap();

    let info = agent.catalog_info();
    assert_eq!(info["total_sessions"], 5);

    let resp = agent.handle("Recommend sessions for a developer interested in AI").await;
    assert!(!resp.is_error());
    assert_eq!(resp.plan_source, Some(PlanSource::Rules));
    assert_eq!(resp.invocations.len(), 1);
    assert_eq!(resp.invocations[0].tool, "recommend_sessions");
    assert!(resp.invocations[0].success);
    assert_eq!(resp.strands_activated, vec![Strand::Conference]);

    let result = resp.outcomes[0].result.as_ref().unwrap();
    let first = &result["recommendations"][0];
    assert_eq!(first["id"], "ml");
    assert!(first["relevanceScore"].as_f64().unwrap() >= 19.0);
    assert!(resp.answer.contains("**Conference Planning:**"));
    assert!(resp.answer.contains("Intro to Machine Learning"));
}

#[tokio::test]
async fn test_malformed_classifier_output_uses_rules() {
    let llm = Arc::new(
        MockLlmClient::new()
            .with_reply("Sure, let me look up the weather for you!")
            .with_reply("It is sunny in Austin."),
    );
    let agent = AgentBuilder::new(offline_config())
        .with_repository(Arc::new(InMemoryRepository::empty()))
        .with_llm(llm.clone())
        .build()
        .unwrap();

    let resp = agent.handle("weather in Austin").await;
    assert_eq!(resp.plan_source, Some(PlanSource::Rules));
    assert_eq!(resp.invocations.len(), 1);
    assert_eq!(resp.invocations[0].tool, "get_weather");
    assert_eq!(resp.invocations[0].parameters, json!({"location": "Austin"}));
    assert_eq!(resp.invocations[0].server, Some(Strand::LiveData.server()));
    assert_eq!(resp.answer, "It is sunny in Austin.");
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_classifier_plan_spans_strands() {
    let plan = json!([
        {"tool": "search_aws_docs", "parameters": {"query": "Bedrock agents"}, "strand": "documentation", "reasoning": "docs"},
        {"tool": "get_weather", "parameters": {"location": "Las Vegas"}, "strand": "liveData", "reasoning": "weather"},
        {"tool": "get_session_details", "parameters": {"session_id": "nope"}, "strand": "conference", "reasoning": "details"}
    ])
    .to_string();
    let llm = Arc::new(
        MockLlmClient::new()
            .with_reply(format!("```json\n{plan}\n```"))
            .with_reply("   "),
    );
    let file = catalog_file();
    let agent = AgentBuilder::new(offline_config())
        .with_catalog_path(file.path())
        .with_llm(llm)
        .with_capability(Arc::new(FakeDocs))
        .build()
        .unwrap();

    let resp = agent
        .handle("How do I build Bedrock agents, what's the weather in Las Vegas, and tell me about session nope")
        .await;
    assert_eq!(resp.plan_source, Some(PlanSource::Classifier));
    let tools: Vec<&str> = resp.invocations.iter().map(|i| i.tool.as_str()).collect();
    assert_eq!(tools, vec!["search_aws_docs", "get_weather", "get_session_details"]);
    assert!(resp.invocations[0].success);
    assert!(resp.invocations[1].success);
    assert!(!resp.invocations[2].success);
    assert_eq!(
        resp.strands_activated,
        vec![Strand::Conference, Strand::Documentation, Strand::LiveData]
    );

    // 摘要器返回空白，回退到模板
    assert!(resp.answer.contains("**AWS Documentation:**"));
    assert!(resp.answer.contains("**Live Data Services:**"));
    assert!(resp.answer.contains("Error:"));
    assert!(resp.answer.contains("_(simulated data)_"));
}

#[tokio::test]
async fn test_unmatched_query_returns_help() {
    let agent = AgentBuilder::new(offline_config())
        .with_repository(Arc::new(InMemoryRepository::empty()))
        .without_llm()
        .build()
        .unwrap();
    let resp = agent.handle("hello there").await;
    assert!(resp.invocations.is_empty());
    assert!(resp.strands_activated.is_empty());
    assert_eq!(resp.answer, HELP_TEXT);
    assert!(!resp.is_error());
}

#[tokio::test]
async fn test_empty_catalog_is_reported() {
    let agent = AgentBuilder::new(offline_config())
        .with_repository(Arc::new(InMemoryRepository::empty()))
        .without_llm()
        .build()
        .unwrap();
    let resp = agent.handle("Show me AI sessions").await;
    assert_eq!(resp.invocations.len(), 1);
    assert!(!resp.invocations[0].success);
    assert!(resp.answer.contains("catalog appears to be empty"));
}

#[tokio::test]
async fn test_response_serializes_for_http() {
    let agent = AgentBuilder::new(offline_config())
        .with_repository(Arc::new(InMemoryRepository::empty()))
        .without_llm()
        .build()
        .unwrap();
    let resp = agent.handle("What's the AMZN stock price?").await;
    let v = serde_json::to_value(&resp).unwrap();
    assert_eq!(v["invocations"][0]["tool"], "get_stock_price");
    assert_eq!(v["invocations"][0]["strand"], "liveData");
    assert_eq!(v["plan_source"], "rules");
    assert!(v["request_id"].as_str().is_some_and(|s| !s.is_empty()));
}
