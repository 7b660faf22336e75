//! 相关度评分
//!
//! score 是纯函数：只读 Event 与偏好，不做归一化，允许并列。
//! 匹配一律是小写子串匹配，tags / services 使用逗号拼接后的文本。

use std::sync::Arc;

use serde::Serialize;

use crate::catalog::Event;
use crate::scoring::{ScoringProfile, Synonyms};

/// 用户偏好（构造时统一小写、去空白）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preferences {
    pub interests: Vec<String>,
    pub role: String,
    pub level: String,
}

impl Preferences {
    pub fn new<S: AsRef<str>>(interests: &[S], role: &str, level: &str) -> Self {
        let mut cleaned: Vec<String> = Vec::with_capacity(interests.len());
        for i in interests {
            let i = i.as_ref().trim().to_lowercase();
            if !i.is_empty() && !cleaned.contains(&i) {
                cleaned.push(i);
            }
        }
        Self {
            interests: cleaned,
            role: role.trim().to_lowercase(),
            level: level.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEvent {
    #[serde(flatten)]
    pub event: Event,
    #[serde(rename = "relevanceScore")]
    pub score: f64,
}

/// 事件字段的小写视图，避免每个词重复 to_lowercase
struct Haystack {
    title: String,
    description: String,
    tags: String,
    services: String,
    kind: String,
}

impl Haystack {
    fn of(event: &Event) -> Self {
        Self {
            title: event.title.to_lowercase(),
            description: event.description.to_lowercase(),
            tags: event.tags_text().to_lowercase(),
            services: event.services_text().to_lowercase(),
            kind: event.kind.to_lowercase(),
        }
    }
}

/// 类型加分：keynote / workshop(hands-on) / breakout 各自独立累加
pub fn type_bonus(event: &Event, profile: &ScoringProfile) -> f64 {
    let kind = event.kind.to_lowercase();
    let mut bonus = 0.0;
    if kind.contains("keynote") {
        bonus += profile.keynote_bonus;
    }
    if kind.contains("workshop") || kind.contains("hands-on") {
        bonus += profile.workshop_bonus;
    }
    if kind.contains("breakout") {
        bonus += profile.breakout_bonus;
    }
    bonus
}

/// 兜底分：只在「必须返回结果」的场景给零分会话使用
pub fn fallback_score(event: &Event) -> f64 {
    let kind = event.kind.to_lowercase();
    if kind.contains("keynote") {
        0.8
    } else if kind.contains("workshop") {
        0.6
    } else if event.level.trim().starts_with("200") {
        0.4
    } else {
        0.1
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    synonyms: Arc<Synonyms>,
}

impl RelevanceScorer {
    pub fn new(synonyms: Arc<Synonyms>) -> Self {
        Self { synonyms }
    }

    pub fn synonyms(&self) -> &Synonyms {
        &self.synonyms
    }

    pub fn score(&self, event: &Event, prefs: &Preferences, profile: &ScoringProfile) -> f64 {
        let h = Haystack::of(event);
        let mut score = 0.0;

        if !prefs.role.is_empty() {
            let role = prefs.role.as_str();
            if h.tags.contains(role) {
                score += profile.role_in_tags;
            }
            if h.title.contains(role) {
                score += profile.role_in_title;
            }
            if h.description.contains(role) {
                score += profile.role_in_description;
            }
            for syn in self.synonyms.roles.lookup(role) {
                if h.tags.contains(syn.as_str())
                    || h.title.contains(syn.as_str())
                    || h.description.contains(syn.as_str())
                {
                    score += profile.role_synonym;
                }
            }
        }

        for interest in &prefs.interests {
            let term = interest.as_str();
            if h.title.contains(term) {
                score += profile.interest_in_title;
            }
            if h.tags.contains(term) {
                score += profile.interest_in_tags;
            }
            if h.services.contains(term) {
                score += profile.interest_in_services;
            }
            if h.description.contains(term) {
                score += profile.interest_in_description;
            }
            if h.kind.contains(term) {
                score += profile.interest_in_type;
            }
            for syn in self.synonyms.topics.lookup(term) {
                let s = syn.as_str();
                if h.title.contains(s) || h.tags.contains(s) || h.description.contains(s) || h.services.contains(s) {
                    score += profile.interest_synonym;
                }
            }
        }

        if !prefs.level.is_empty() && event.level.trim().to_lowercase() == prefs.level {
            score += profile.level_match;
        }

        score + type_bonus(event, profile)
    }

    /// 对全部会话评分并按分数降序（稳定排序）
    pub fn score_all(&self, events: &[Event], prefs: &Preferences, profile: &ScoringProfile) -> Vec<ScoredEvent> {
        let mut scored: Vec<ScoredEvent> = events
            .iter()
            .map(|e| ScoredEvent {
                score: self.score(e, prefs, profile),
                event: e.clone(),
            })
            .collect();
        sort_desc(&mut scored);
        scored
    }

    /// 推荐：正分不足 limit 时，零分会话改用兜底分补足，保证非空目录总有结果
    pub fn recommend(&self, events: &[Event], prefs: &Preferences, limit: usize) -> Vec<ScoredEvent> {
        let mut scored = self.score_all(events, prefs, &ScoringProfile::RECOMMEND);
        let positives = scored.iter().filter(|s| s.score > 0.0).count();
        if positives < limit {
            for s in scored.iter_mut().filter(|s| s.score <= 0.0) {
                s.score = fallback_score(&s.event);
            }
            sort_desc(&mut scored);
        }
        scored.truncate(limit);
        scored
    }

    /// 兴趣词在标题 / 标签 / 服务中直接出现的那些
    pub fn matched_interests(event: &Event, prefs: &Preferences) -> Vec<String> {
        let h = Haystack::of(event);
        prefs
            .interests
            .iter()
            .filter(|i| h.title.contains(i.as_str()) || h.tags.contains(i.as_str()) || h.services.contains(i.as_str()))
            .cloned()
            .collect()
    }

    pub fn role_match(event: &Event, prefs: &Preferences) -> bool {
        !prefs.role.is_empty() && event.tags_text().to_lowercase().contains(&prefs.role)
    }
}

pub(crate) fn sort_desc(scored: &mut [ScoredEvent]) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
}
