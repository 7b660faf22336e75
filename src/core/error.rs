//! 请求级错误分类
//!
//! 失败尽量在最小范围内被吸收：规划失败走兜底规则、单次调用失败记为一条失败结果、
//! 摘要失败走模板渲染；只有目录不可用这类灾难性错误才会到达 Agent::handle。

use thiserror::Error;

use crate::catalog::CatalogError;

/// 引擎内部错误（规划、编排、合成、目录）
#[derive(Error, Debug)]
pub enum StrandError {
    /// 意图分类器不可用或输出无法解析，调用方应退回关键词规则
    #[error("Planning failure: {0}")]
    PlanningFailure(String),

    /// 目录中没有任何会话（区别于「没有匹配结果」）
    #[error("No sessions found in catalog: the catalog appears to be empty")]
    EmptyCatalog,

    /// 摘要器不可用或返回空文本，调用方应退回模板渲染
    #[error("Synthesis failure: {0}")]
    SynthesisFailure(String),

    /// 目录不可达；Agent::handle 据此返回致歉回答
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}
