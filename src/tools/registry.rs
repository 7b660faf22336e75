//! 能力注册表
//!
//! 所有能力实现 Capability trait（name / strand / parameters / invoke），由 CapabilityRegistry 按名注册与查找。
//! 注册只发生在启动阶段；之后注册表放进 Arc 只读共享。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::catalog::CatalogError;

/// 能力分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "conference")]
    Conference,
    #[serde(rename = "documentation")]
    Documentation,
    #[serde(rename = "liveData")]
    LiveData,
}

impl Strand {
    pub const ALL: [Strand; 3] = [Strand::Conference, Strand::Documentation, Strand::LiveData];

    pub fn key(&self) -> &'static str {
        match self {
            Strand::Conference => "conference",
            Strand::Documentation => "documentation",
            Strand::LiveData => "liveData",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Strand::Conference => "Conference Planning",
            Strand::Documentation => "AWS Documentation",
            Strand::LiveData => "Live Data Services",
        }
    }

    /// 该分组所代表的外部服务
    pub fn server(&self) -> &'static str {
        match self {
            Strand::Conference => "reinvent-schedule-server",
            Strand::Documentation => "aws-documentation-server",
            Strand::LiveData => "live-data-server",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Strand::Conference => "search, recommend and schedule conference sessions",
            Strand::Documentation => "official AWS documentation for services, APIs and best practices",
            Strand::LiveData => "real-time weather, stock and travel information",
        }
    }

    /// 宽松解析（大小写、下划线不敏感）
    pub fn parse(s: &str) -> Option<Strand> {
        let norm: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match norm.as_str() {
            "conference" => Some(Strand::Conference),
            "documentation" | "docs" => Some(Strand::Documentation),
            "livedata" => Some(Strand::LiveData),
            _ => None,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Array,
    Number,
    Boolean,
}

impl ParamKind {
    fn json_type(&self) -> Value {
        match self {
            ParamKind::String => json!({"type": "string"}),
            ParamKind::Array => json!({"type": "array", "items": {"type": "string"}}),
            ParamKind::Number => json!({"type": "number"}),
            ParamKind::Boolean => json!({"type": "boolean"}),
        }
    }

    /// 值是否可被接受；数组参数也接受逗号分隔的字符串
    fn accepts(&self, v: &Value) -> bool {
        match self {
            ParamKind::String => v.is_string() || v.is_number(),
            ParamKind::Array => v.is_array() || v.is_string(),
            ParamKind::Number => {
                v.is_number() || v.as_str().map(|s| s.trim().parse::<f64>().is_ok()).unwrap_or(false)
            }
            ParamKind::Boolean => {
                v.is_boolean() || matches!(v.as_str(), Some("true") | Some("false"))
            }
        }
    }
}

/// 参数描述
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// 单次能力调用失败；执行器把它转成一条失败结果
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Unknown tool: {0}")]
    UnknownCapability(String),

    #[error("Invalid parameters for {tool}: {reason}")]
    InvalidParameters { tool: String, reason: String },

    #[error("{0} timed out after {1}s")]
    Timeout(String, u64),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("No sessions found in catalog: the catalog appears to be empty")]
    EmptyCatalog,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0} panicked")]
    Panicked(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl CapabilityError {
    pub fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        CapabilityError::InvalidParameters {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// 能力 trait：名称、分组、描述、参数、异步调用（参数与结果均为 JSON）
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    fn strand(&self) -> Strand;

    fn description(&self) -> &str;

    fn parameters(&self) -> &[ParamSpec];

    /// 参数 JSON Schema（注入意图分类器的提示词）
    fn parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in self.parameters() {
            let mut schema = p.kind.json_type();
            if let Some(obj) = schema.as_object_mut() {
                obj.insert("description".to_string(), json!(p.description));
            }
            properties.insert(p.name.to_string(), schema);
            if p.required {
                required.push(p.name);
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    async fn invoke(&self, params: Value) -> Result<Value, CapabilityError>;
}

/// 注册表中一个能力的对外描述
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub strand: Strand,
    pub description: String,
    pub parameters: Value,
}

#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: impl Capability + 'static) {
        self.register_arc(Arc::new(capability));
    }

    pub fn register_arc(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if self.capabilities.insert(name.clone(), capability).is_some() {
            tracing::warn!(capability = %name, "capability registered twice, keeping the last one");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities
            .values()
            .map(|c| CapabilityDescriptor {
                name: c.name().to_string(),
                strand: c.strand(),
                description: c.description().to_string(),
                parameters: c.parameters_schema(),
            })
            .collect()
    }

    /// 某分组下的能力名
    pub fn names_in(&self, strand: Strand) -> Vec<String> {
        self.capabilities
            .values()
            .filter(|c| c.strand() == strand)
            .map(|c| c.name().to_string())
            .collect()
    }

    /// 能力目录 JSON（分组 + 能力 + 参数 schema）
    pub fn to_catalog_json(&self) -> String {
        let strands: Vec<Value> = Strand::ALL
            .iter()
            .map(|s| {
                json!({
                    "strand": s.key(),
                    "name": s.display_name(),
                    "server": s.server(),
                    "description": s.description(),
                    "tools": self.names_in(*s),
                })
            })
            .collect();
        let catalog = json!({
            "strands": strands,
            "tools": self.descriptors(),
        });
        serde_json::to_string_pretty(&catalog).unwrap_or_else(|_| "{}".to_string())
    }

    /// 查找能力并校验参数：对象形状、必填项、类型
    pub fn resolve(&self, name: &str, params: &Value) -> Result<Arc<dyn Capability>, CapabilityError> {
        let capability = self
            .get(name)
            .ok_or_else(|| CapabilityError::UnknownCapability(name.to_string()))?;
        let empty = serde_json::Map::new();
        let obj = match params {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(CapabilityError::invalid(name, "parameters must be a JSON object")),
        };
        for spec in capability.parameters() {
            match obj.get(spec.name).filter(|v| !v.is_null()) {
                None if spec.required => {
                    return Err(CapabilityError::invalid(
                        name,
                        format!("missing required parameter '{}'", spec.name),
                    ))
                }
                Some(v) if !spec.kind.accepts(v) => {
                    return Err(CapabilityError::invalid(
                        name,
                        format!("parameter '{}' should be {:?}", spec.name, spec.kind),
                    ))
                }
                _ => {}
            }
        }
        Ok(capability)
    }
}
