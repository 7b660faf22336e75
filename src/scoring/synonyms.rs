//! 角色 / 主题同义词表
//!
//! 内置表是静态数据；配置 [scoring] 中的 role_synonyms / topic_synonyms 只追加，不覆盖。

use std::collections::HashMap;

const ROLE_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "product manager",
        &["product", "pm", "product management", "business executive", "business", "strategy"],
    ),
    (
        "developer",
        &["dev", "engineer", "software engineer", "developer / engineer", "programmer", "coder", "development"],
    ),
    (
        "architect",
        &["solution architect", "technical architect", "solution / systems architect", "architecture"],
    ),
    (
        "data scientist",
        &["data", "analytics", "ml engineer", "ai engineer", "data science"],
    ),
    (
        "devops",
        &["sre", "platform engineer", "devops engineer", "infrastructure", "operations"],
    ),
    (
        "security",
        &["cybersecurity", "infosec", "security engineer", "compliance"],
    ),
    (
        "executive",
        &["cto", "ceo", "vp", "director", "leadership", "manager", "management"],
    ),
    (
        "it manager",
        &["it professional / technical manager", "technical manager"],
    ),
];

const TOPIC_SYNONYMS: &[(&str, &[&str])] = &[
    (
        "agents",
        &[
            "agent", "ai agent", "intelligent agent", "autonomous", "bedrock agents", "chatbot",
            "bot", "assistant", "conversational", "lex", "alexa", "bedrock", "anthropic", "claude",
        ],
    ),
    (
        "ai",
        &[
            "artificial intelligence", "machine learning", "ml", "generative ai", "genai",
            "neural", "deep learning", "llm", "foundation model", "sagemaker", "comprehend",
            "textract",
        ],
    ),
    (
        "leadership",
        &["management", "strategy", "executive", "team lead", "business", "transformation", "innovation", "culture"],
    ),
    (
        "security",
        &["cybersecurity", "infosec", "compliance", "governance", "identity", "access", "iam", "cognito"],
    ),
    (
        "data",
        &["analytics", "database", "data science", "big data", "warehouse", "lake", "redshift", "athena", "glue"],
    ),
    (
        "cloud",
        &["aws", "infrastructure", "migration", "serverless", "compute", "storage", "ec2", "s3", "lambda"],
    ),
];

/// 词 → 同义词列表（键与值均为小写）
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: HashMap<String, Vec<String>>,
}

impl SynonymTable {
    fn from_static(table: &[(&str, &[&str])]) -> Self {
        let entries = table
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect();
        Self { entries }
    }

    pub fn roles() -> Self {
        Self::from_static(ROLE_SYNONYMS)
    }

    pub fn topics() -> Self {
        Self::from_static(TOPIC_SYNONYMS)
    }

    /// 追加额外同义词；已有的词不重复加入
    pub fn with_overrides(mut self, extra: &HashMap<String, Vec<String>>) -> Self {
        for (key, values) in extra {
            let slot = self.entries.entry(key.trim().to_lowercase()).or_default();
            for v in values {
                let v = v.trim().to_lowercase();
                if !v.is_empty() && !slot.contains(&v) {
                    slot.push(v);
                }
            }
        }
        self
    }

    pub fn lookup(&self, term: &str) -> &[String] {
        self.entries
            .get(term.trim().to_lowercase().as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 评分用到的两张表，进程内共享只读
#[derive(Debug, Clone)]
pub struct Synonyms {
    pub roles: SynonymTable,
    pub topics: SynonymTable,
}

impl Default for Synonyms {
    fn default() -> Self {
        Self {
            roles: SynonymTable::roles(),
            topics: SynonymTable::topics(),
        }
    }
}

impl Synonyms {
    pub fn with_overrides(
        role_extra: &HashMap<String, Vec<String>>,
        topic_extra: &HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            roles: SynonymTable::roles().with_overrides(role_extra),
            topics: SynonymTable::topics().with_overrides(topic_extra),
        }
    }
}
