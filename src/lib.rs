//! Strand - 会议助手引擎：查询 → 调用计划 → 并发能力调用 → 个性化日程
//!
//! 模块划分：
//! - **agent**: Agent::handle 单次请求入口
//! - **agenda**: 冲突感知的个性化日程编排
//! - **catalog**: 会话记录、目录加载、内存 / SQLite 目录
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类与 AgentBuilder
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **planner**: 意图分类与关键词兜底规则
//! - **scoring**: 相关度评分与同义词表
//! - **synth**: 结果合成（摘要器 / 模板）
//! - **tools**: 能力注册表、会议 / 文档 / 实时数据能力、并发执行器

pub mod agenda;
pub mod agent;
pub mod catalog;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod planner;
pub mod scoring;
pub mod synth;
pub mod tools;

pub use agent::{Agent, AgentResponse, InvocationSummary};
pub use config::{load_config, AppConfig};
pub use core::{AgentBuilder, StrandError};
