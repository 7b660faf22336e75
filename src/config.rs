//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `STRAND__*` 覆盖（双下划线表示嵌套，如 `STRAND__LLM__PROVIDER=openai`）。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub catalog: CatalogSection,
    pub llm: LlmSection,
    pub planner: PlannerSection,
    pub agenda: AgendaSection,
    pub scoring: ScoringSection,
    pub tools: ToolsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
}

fn default_app_name() -> String {
    "strand".to_string()
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

/// [catalog] 段：JSON / CSV / SQLite 目录文件；未设置时目录为空
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CatalogSection {
    pub path: Option<PathBuf>,
    /// SQLite 目录为空时导入的 JSON / CSV 文件
    pub seed: Option<PathBuf>,
}

/// [llm] 段：后端选择与超时；没有可用 API Key 时分类器和摘要器都走兜底
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 是否使用 LLM（false 时规划与合成只走规则 / 模板）
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 后端：deepseek / openai
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

/// [llm.timeouts] 段（秒）
#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
    /// 意图分类的整体超时，超时后走关键词规则
    #[serde(default = "default_classifier_timeout")]
    pub classifier: u64,
    #[serde(default = "default_summarizer_timeout")]
    pub summarizer: u64,
}

fn default_request_timeout() -> u64 {
    60
}

fn default_classifier_timeout() -> u64 {
    15
}

fn default_summarizer_timeout() -> u64 {
    30
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
            classifier: default_classifier_timeout(),
            summarizer: default_summarizer_timeout(),
        }
    }
}

/// [planner] 段
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    /// 单次请求最多调用几个能力
    #[serde(default = "default_max_invocations")]
    pub max_invocations: usize,
}

fn default_max_invocations() -> usize {
    5
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_invocations: default_max_invocations(),
        }
    }
}

/// [agenda] 段：日程与推荐的默认参数
#[derive(Debug, Clone, Deserialize)]
pub struct AgendaSection {
    #[serde(default = "default_max_sessions_per_day")]
    pub max_sessions_per_day: usize,
    #[serde(default = "default_true")]
    pub avoid_conflicts: bool,
    #[serde(default = "default_recommend_limit")]
    pub recommend_limit: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_max_sessions_per_day() -> usize {
    4
}

fn default_recommend_limit() -> usize {
    10
}

fn default_search_limit() -> usize {
    20
}

impl Default for AgendaSection {
    fn default() -> Self {
        Self {
            max_sessions_per_day: default_max_sessions_per_day(),
            avoid_conflicts: true,
            recommend_limit: default_recommend_limit(),
            search_limit: default_search_limit(),
        }
    }
}

/// [scoring] 段：在内置同义词表上追加
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScoringSection {
    #[serde(default)]
    pub role_synonyms: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub topic_synonyms: HashMap<String, Vec<String>>,
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次能力调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub docs: DocsSection,
    #[serde(default)]
    pub live: LiveSection,
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            docs: DocsSection::default(),
            live: LiveSection::default(),
        }
    }
}

/// [tools.docs] 段：文档服务子进程
#[derive(Debug, Clone, Deserialize)]
pub struct DocsSection {
    #[serde(default = "default_docs_command")]
    pub command: String,
    #[serde(default = "default_docs_args")]
    pub args: Vec<String>,
    #[serde(default = "default_docs_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_docs_max_results")]
    pub max_results: usize,
    /// 子进程失败或超时时返回本地示例结果（标记 simulated），否则记为失败
    #[serde(default)]
    pub simulate_on_failure: bool,
}

fn default_docs_command() -> String {
    "uvx".to_string()
}

fn default_docs_args() -> Vec<String> {
    vec!["awslabs.aws-documentation-mcp-server@latest".to_string()]
}

fn default_docs_timeout_secs() -> u64 {
    10
}

fn default_docs_max_results() -> usize {
    5
}

impl Default for DocsSection {
    fn default() -> Self {
        Self {
            command: default_docs_command(),
            args: default_docs_args(),
            timeout_secs: default_docs_timeout_secs(),
            max_results: default_docs_max_results(),
            simulate_on_failure: false,
        }
    }
}

/// [tools.live] 段：天气 / 股票 / 航班的 HTTP 数据源
#[derive(Debug, Clone, Deserialize)]
pub struct LiveSection {
    /// false 时跳过 HTTP，直接使用本地模拟数据
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_live_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_weather_url")]
    pub weather_url: String,
    #[serde(default = "default_stock_url")]
    pub stock_url: String,
    /// 航班查询端点；未配置时只有模拟数据
    pub flights_url: Option<String>,
    #[serde(default = "default_destination")]
    pub destination: String,
}

fn default_live_timeout_secs() -> u64 {
    5
}

fn default_weather_url() -> String {
    "https://wttr.in".to_string()
}

fn default_stock_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
}

fn default_destination() -> String {
    "LAS".to_string()
}

impl Default for LiveSection {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_live_timeout_secs(),
            weather_url: default_weather_url(),
            stock_url: default_stock_url(),
            flights_url: None,
            destination: default_destination(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 STRAND__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（可覆盖前面的键）；文件不存在时报错
/// 3. 最后叠加环境变量 STRAND__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("STRAND")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
