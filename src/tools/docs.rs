//! 文档分组：通过 stdio JSON-RPC 调用外部文档服务进程
//!
//! 每次调用启动一个子进程：initialize（id 1）→ notifications/initialized → tools/call（id 2），
//! 消息按行分隔。子进程带 kill_on_drop，超时或出错时也显式 kill。

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::config::DocsSection;
use crate::tools::params;
use crate::tools::{Capability, CapabilityError, ParamKind, ParamSpec, Strand};

const PROTOCOL_VERSION: &str = "2024-11-05";
const REMOTE_TOOL: &str = "search_documentation";

/// 一次性的 stdio JSON-RPC 客户端
#[derive(Debug, Clone)]
pub struct McpStdioClient {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl McpStdioClient {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &DocsSection) -> Self {
        Self::new(cfg.command.clone(), cfg.args.clone(), Duration::from_secs(cfg.timeout_secs))
    }

    /// 调用远端工具，返回 JSON-RPC result
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, CapabilityError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CapabilityError::Provider(format!("documentation server spawn failed: {e}")))?;

        let outcome = tokio::time::timeout(self.timeout, exchange(&mut child, tool, arguments)).await;
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "documentation server already exited");
        }
        match outcome {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout(
                "documentation server".to_string(),
                self.timeout.as_secs().max(1),
            )),
        }
    }
}

async fn exchange(child: &mut Child, tool: &str, arguments: Value) -> Result<Value, CapabilityError> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| CapabilityError::Provider("documentation server stdin unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CapabilityError::Provider("documentation server stdout unavailable".to_string()))?;
    let mut lines = BufReader::new(stdout).lines();

    send(
        &mut stdin,
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "strand", "version": env!("CARGO_PKG_VERSION")},
            },
        }),
    )
    .await?;
    read_response(&mut lines, 1).await?;

    send(&mut stdin, &json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).await?;
    send(
        &mut stdin,
        &json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": tool, "arguments": arguments},
        }),
    )
    .await?;
    read_response(&mut lines, 2).await
}

async fn send(stdin: &mut ChildStdin, message: &Value) -> Result<(), CapabilityError> {
    let mut line = message.to_string();
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| CapabilityError::Provider(format!("documentation server write failed: {e}")))?;
    stdin
        .flush()
        .await
        .map_err(|e| CapabilityError::Provider(format!("documentation server write failed: {e}")))
}

/// 读到 id 匹配的响应为止；日志行与通知跳过
async fn read_response(
    lines: &mut tokio::io::Lines<BufReader<ChildStdout>>,
    id: u64,
) -> Result<Value, CapabilityError> {
    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| CapabilityError::Provider(format!("documentation server read failed: {e}")))?
            .ok_or_else(|| CapabilityError::Provider("documentation server closed the connection".to_string()))?;
        let Ok(msg) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        if msg.get("id").and_then(Value::as_u64) != Some(id) {
            continue;
        }
        if let Some(err) = msg.get("error") {
            let text = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(CapabilityError::Provider(text));
        }
        return Ok(msg.get("result").cloned().unwrap_or(Value::Null));
    }
}

/// 远端结果 → `{title, url, summary, service, relevance}` 列表
pub fn map_results(result: &Value, service: Option<&str>, max: usize) -> Vec<Value> {
    let items = result
        .pointer("/structuredContent/result")
        .and_then(Value::as_array)
        .cloned()
        .or_else(|| {
            result
                .pointer("/content/0/text")
                .and_then(Value::as_str)
                .and_then(|t| serde_json::from_str::<Value>(t).ok())
                .and_then(|v| v.as_array().cloned())
        })
        .unwrap_or_default();

    items
        .iter()
        .take(max)
        .map(|item| {
            let relevance = item
                .get("rank_order")
                .and_then(Value::as_f64)
                .map(|rank| (11.0 - rank) / 10.0)
                .unwrap_or(0.9);
            json!({
                "title": text_or(item, "title", "AWS Documentation"),
                "url": text_or(item, "url", "#"),
                "summary": text_or(item, "context", "AWS service documentation"),
                "service": service.unwrap_or("aws"),
                "relevance": relevance,
            })
        })
        .collect()
}

fn text_or(item: &Value, key: &str, default: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}

fn simulated_results(query: &str, service: Option<&str>) -> Vec<Value> {
    let service = service.unwrap_or("aws");
    let slug = service.to_lowercase().replace(' ', "-");
    vec![
        json!({
            "title": format!("{} overview", capitalize(service)),
            "url": format!("https://docs.aws.amazon.com/{slug}/"),
            "summary": format!("Getting started with {service} for: {query}"),
            "service": service,
            "relevance": 0.9,
        }),
        json!({
            "title": format!("{} developer guide", capitalize(service)),
            "url": format!("https://docs.aws.amazon.com/{slug}/latest/userguide/"),
            "summary": format!("Concepts, APIs and examples related to {query}"),
            "service": service,
            "relevance": 0.8,
        }),
    ]
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub struct SearchAwsDocs {
    client: McpStdioClient,
    max_results: usize,
    simulate_on_failure: bool,
}

impl SearchAwsDocs {
    pub fn new(client: McpStdioClient, max_results: usize, simulate_on_failure: bool) -> Self {
        Self {
            client,
            max_results,
            simulate_on_failure,
        }
    }

    pub fn from_config(cfg: &DocsSection) -> Self {
        Self::new(McpStdioClient::from_config(cfg), cfg.max_results, cfg.simulate_on_failure)
    }
}

const DOCS_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("query", ParamKind::String, "what to look up"),
    ParamSpec::optional("service", ParamKind::String, "AWS service name, e.g. bedrock"),
];

#[async_trait]
impl Capability for SearchAwsDocs {
    fn name(&self) -> &str {
        "search_aws_docs"
    }

    fn strand(&self) -> Strand {
        Strand::Documentation
    }

    fn description(&self) -> &str {
        "Search AWS documentation for services, APIs and guides"
    }

    fn parameters(&self) -> &[ParamSpec] {
        DOCS_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        let query = params::string(&p, "query").unwrap_or_default();
        let service = params::string(&p, "service");
        let arguments = json!({
            "search_phrase": query,
            "service": service,
            "max_results": self.max_results,
        });

        match self.client.call_tool(REMOTE_TOOL, arguments).await {
            Ok(result) => Ok(json!({
                "query": query,
                "service": service.as_deref().unwrap_or("all"),
                "results": map_results(&result, service.as_deref(), self.max_results),
                "source": "AWS Documentation Server",
            })),
            Err(e) if self.simulate_on_failure => {
                tracing::warn!(error = %e, "documentation lookup failed, using simulated results");
                Ok(json!({
                    "query": query,
                    "service": service.as_deref().unwrap_or("all"),
                    "results": simulated_results(&query, service.as_deref()),
                    "source": "Simulated Data",
                    "simulated": true,
                }))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_results_ranks_and_defaults() {
        let result = json!({
            "structuredContent": {"result": [
                {"rank_order": 1, "url": "https://docs/a", "title": "Bedrock agents", "context": "How agents work"},
                {"title": ""},
            ]}
        });
        let mapped = map_results(&result, Some("bedrock"), 5);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0]["relevance"], 1.0);
        assert_eq!(mapped[0]["service"], "bedrock");
        assert_eq!(mapped[1]["title"], "AWS Documentation");
        assert_eq!(mapped[1]["url"], "#");
        assert_eq!(mapped[1]["relevance"], 0.9);
    }

    #[test]
    fn test_map_results_reads_text_content() {
        let result = json!({"content": [{"type": "text", "text": "[{\"title\": \"Lambda\", \"rank_order\": 2}]"}]});
        let mapped = map_results(&result, None, 5);
        assert_eq!(mapped[0]["title"], "Lambda");
        assert_eq!(mapped[0]["service"], "aws");
    }

    #[cfg(unix)]
    fn fake_server(script: &str, timeout: Duration) -> McpStdioClient {
        McpStdioClient::new("sh", vec!["-c".to_string(), script.to_string()], timeout)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdio_exchange() {
        let script = r#"read init; echo 'server starting'; echo '{"jsonrpc":"2.0","id":1,"result":{}}'; read note; read call; echo '{"jsonrpc":"2.0","id":2,"result":{"structuredContent":{"result":[{"title":"Bedrock guide","url":"https://docs/b","rank_order":1}]}}}'"#;
        let tool = SearchAwsDocs::new(fake_server(script, Duration::from_secs(5)), 5, false);
        let out = tool.invoke(json!({"query": "bedrock agents"})).await.unwrap();
        assert_eq!(out["service"], "all");
        assert_eq!(out["results"][0]["title"], "Bedrock guide");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rpc_error_is_provider_failure() {
        let script = r#"read init; echo '{"jsonrpc":"2.0","id":1,"error":{"code":-1,"message":"boom"}}'"#;
        let tool = SearchAwsDocs::new(fake_server(script, Duration::from_secs(5)), 5, false);
        let err = tool.invoke(json!({"query": "x"})).await.unwrap_err();
        assert_eq!(err.to_string(), "Provider error: boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_then_simulated() {
        let hung = fake_server("sleep 30", Duration::from_millis(200));
        let err = SearchAwsDocs::new(hung.clone(), 5, false)
            .invoke(json!({"query": "lambda"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Timeout(_, _)));

        let out = SearchAwsDocs::new(hung, 5, true)
            .invoke(json!({"query": "lambda", "service": "lambda"}))
            .await
            .unwrap();
        assert_eq!(out["simulated"], true);
        assert_eq!(out["source"], "Simulated Data");
        assert_eq!(out["results"][0]["service"], "lambda");
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let client = McpStdioClient::new("strand-no-such-binary", vec![], Duration::from_secs(1));
        assert!(matches!(
            client.call_tool(REMOTE_TOOL, json!({})).await,
            Err(CapabilityError::Provider(_))
        ));
    }
}
