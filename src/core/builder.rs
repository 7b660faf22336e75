//! Agent 构建器：统一的初始化逻辑
//!
//! CLI 与 HTTP 入口共用：同一份配置得到同一套能力注册表、规划器与合成器。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::agent::Agent;
use crate::catalog::{open_repository, EventRepository};
use crate::config::AppConfig;
use crate::llm::{create_llm_from_config, LlmClient};
use crate::planner::{IntentClassifier, IntentPlanner, LlmIntentClassifier};
use crate::scoring::{RelevanceScorer, Synonyms};
use crate::synth::{LlmSummarizer, ResultSynthesizer, Summarizer};
use crate::tools::{
    register_conference, register_live, Capability, CapabilityRegistry, ConcurrentExecutor, ConferenceContext,
    SearchAwsDocs,
};

/// LLM 来源：按配置创建、显式注入或禁用
enum LlmChoice {
    FromConfig,
    Given(Arc<dyn LlmClient>),
    Disabled,
}

pub struct AgentBuilder {
    config: AppConfig,
    repo: Option<Arc<dyn EventRepository>>,
    catalog_path: Option<PathBuf>,
    llm: LlmChoice,
    extra: Vec<Arc<dyn Capability>>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            repo: None,
            catalog_path: None,
            llm: LlmChoice::FromConfig,
            extra: Vec::new(),
        }
    }

    /// 直接使用已有目录（测试、嵌入场景）
    pub fn with_repository(mut self, repo: Arc<dyn EventRepository>) -> Self {
        self.repo = Some(repo);
        self
    }

    /// 覆盖配置中的 catalog.path
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// 分类器与摘要器共用的 LLM
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = LlmChoice::Given(llm);
        self
    }

    /// 只用关键词规则与模板
    pub fn without_llm(mut self) -> Self {
        self.llm = LlmChoice::Disabled;
        self
    }

    /// 追加或替换能力（同名覆盖内置能力）
    pub fn with_capability(mut self, capability: Arc<dyn Capability>) -> Self {
        self.extra.push(capability);
        self
    }

    fn synonyms(&self) -> Synonyms {
        let scoring = &self.config.scoring;
        Synonyms::with_overrides(&scoring.role_synonyms, &scoring.topic_synonyms)
    }

    /// 三个分组的能力 + 追加能力
    pub fn build_registry(&self, repo: Arc<dyn EventRepository>) -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        let scorer = RelevanceScorer::new(Arc::new(self.synonyms()));
        let ctx = Arc::new(ConferenceContext::new(repo, scorer, self.config.agenda.clone()));
        register_conference(&mut registry, ctx);
        registry.register(SearchAwsDocs::from_config(&self.config.tools.docs));
        register_live(&mut registry, &self.config.tools.live);
        for capability in &self.extra {
            registry.register_arc(capability.clone());
        }
        registry
    }

    fn resolve_llm(&self) -> Option<Arc<dyn LlmClient>> {
        match &self.llm {
            LlmChoice::FromConfig => create_llm_from_config(&self.config.llm),
            LlmChoice::Given(llm) => Some(llm.clone()),
            LlmChoice::Disabled => None,
        }
    }

    pub fn build(self) -> anyhow::Result<Agent> {
        let repo = match &self.repo {
            Some(repo) => repo.clone(),
            None => {
                let path = self.catalog_path.clone().or_else(|| self.config.catalog.path.clone());
                let seed = self.config.catalog.seed.as_deref();
                open_repository(path.as_deref(), seed).context("Failed to open session catalog")?
            }
        };
        let registry = Arc::new(self.build_registry(repo.clone()));
        let llm = self.resolve_llm();
        let timeouts = &self.config.llm.timeouts;

        let classifier = llm
            .clone()
            .map(|l| Arc::new(LlmIntentClassifier::new(l)) as Arc<dyn IntentClassifier>);
        let planner = IntentPlanner::new(
            classifier,
            registry.to_catalog_json(),
            Duration::from_secs(timeouts.classifier),
            self.config.planner.max_invocations,
        );
        let summarizer = llm.map(|l| Arc::new(LlmSummarizer::new(l)) as Arc<dyn Summarizer>);
        let synthesizer = ResultSynthesizer::new(summarizer, Duration::from_secs(timeouts.summarizer));
        let executor = ConcurrentExecutor::new(registry.clone(), self.config.tools.tool_timeout_secs);

        tracing::info!(
            capabilities = registry.len(),
            llm = planner_mode(&planner),
            "agent ready"
        );
        Ok(Agent::new(self.config.app.name.clone(), repo, registry, planner, executor, synthesizer))
    }
}

fn planner_mode(planner: &IntentPlanner) -> &'static str {
    if planner.has_classifier() {
        "classifier"
    } else {
        "rules"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryRepository;
    use crate::tools::Strand;

    #[test]
    fn test_registry_has_all_strands() {
        let builder = AgentBuilder::new(AppConfig::default());
        let registry = builder.build_registry(Arc::new(InMemoryRepository::empty()));
        assert_eq!(registry.names_in(Strand::Conference).len(), 6);
        assert_eq!(registry.names_in(Strand::Documentation), vec!["search_aws_docs"]);
        assert_eq!(registry.names_in(Strand::LiveData).len(), 3);
    }

    #[test]
    fn test_extra_capability_replaces_builtin() {
        use crate::tools::registry::tests::stub;
        let builder = AgentBuilder::new(AppConfig::default())
            .with_capability(Arc::new(stub("search_aws_docs", Strand::Documentation)));
        let registry = builder.build_registry(Arc::new(InMemoryRepository::empty()));
        let docs = registry.get("search_aws_docs").unwrap();
        assert_eq!(docs.description(), "stub");
        assert_eq!(registry.len(), 10);
    }
}
