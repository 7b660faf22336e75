//! 按配置与环境变量选择 LLM 后端
//!
//! - `DEEPSEEK_API_KEY` 存在，或 provider = deepseek 且只有 `OPENAI_API_KEY`：走 DeepSeek 兼容端点
//! - `OPENAI_API_KEY` 存在且 provider 不是 deepseek：走 OpenAI（可配 base_url）
//! - 都没有：返回 None，意图规划与结果合成直接使用规则 / 模板

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{LlmClient, OpenAiClient};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

pub fn create_llm_from_config(cfg: &LlmSection) -> Option<Arc<dyn LlmClient>> {
    if !cfg.enabled {
        tracing::info!("LLM disabled by config, using rules and templates");
        return None;
    }
    let provider = cfg.provider.to_lowercase();
    let deepseek_key = std::env::var("DEEPSEEK_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();
    let timeout = cfg.timeouts.request;

    match (deepseek_key, openai_key) {
        (Some(key), _) => Some(deepseek(cfg, &key, timeout)),
        (None, Some(key)) if provider == "deepseek" => Some(deepseek(cfg, &key, timeout)),
        (None, Some(key)) => {
            let model = if cfg.model.starts_with("deepseek") {
                OPENAI_DEFAULT_MODEL
            } else {
                cfg.model.as_str()
            };
            tracing::info!(model, "Using OpenAI LLM");
            Some(Arc::new(OpenAiClient::new(cfg.base_url.as_deref(), model, &key, timeout)))
        }
        (None, None) => {
            tracing::warn!("No API key set, intent planning and synthesis use fallbacks");
            None
        }
    }
}

fn deepseek(cfg: &LlmSection, key: &str, timeout: u64) -> Arc<dyn LlmClient> {
    let model = if cfg.model.trim().is_empty() {
        DEEPSEEK_CHAT
    } else {
        cfg.model.as_str()
    };
    let base = cfg.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
    tracing::info!(model, "Using DeepSeek LLM");
    Arc::new(OpenAiClient::new(Some(base), model, key, timeout))
}
