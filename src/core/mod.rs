//! 核心层：错误分类与 Agent 构建

pub mod builder;
pub mod error;

pub use builder::AgentBuilder;
pub use error::StrandError;
