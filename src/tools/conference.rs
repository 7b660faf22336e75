//! 会议分组的能力：搜索、详情、推荐、个性化日程、按天查询、目录维度
//!
//! 所有能力共享一个 ConferenceContext（只读目录 + 评分器 + 默认参数）。
//! 目录为空时一律返回 EmptyCatalog，与「没有匹配」区分开。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agenda::{AgendaBuilder, AgendaOptions};
use crate::catalog::{Day, Event, EventRepository, SearchFilter};
use crate::config::AgendaSection;
use crate::scoring::{Preferences, RelevanceScorer, ScoredEvent};
use crate::tools::params;
use crate::tools::{Capability, CapabilityError, CapabilityRegistry, ParamKind, ParamSpec, Strand};

pub struct ConferenceContext {
    pub repo: Arc<dyn EventRepository>,
    pub scorer: RelevanceScorer,
    pub agenda: AgendaBuilder,
    pub defaults: AgendaSection,
}

impl ConferenceContext {
    pub fn new(repo: Arc<dyn EventRepository>, scorer: RelevanceScorer, defaults: AgendaSection) -> Self {
        Self {
            repo,
            agenda: AgendaBuilder::new(scorer.clone()),
            scorer,
            defaults,
        }
    }

    fn ensure_catalog(&self) -> Result<(), CapabilityError> {
        if self.repo.count()? == 0 {
            return Err(CapabilityError::EmptyCatalog);
        }
        Ok(())
    }

    fn all_events(&self) -> Result<Vec<Event>, CapabilityError> {
        let events = self.repo.all()?;
        if events.is_empty() {
            return Err(CapabilityError::EmptyCatalog);
        }
        Ok(events)
    }
}

/// 注册全部会议能力
pub fn register_conference(registry: &mut CapabilityRegistry, ctx: Arc<ConferenceContext>) {
    registry.register(SearchSessions(ctx.clone()));
    registry.register(SessionDetails(ctx.clone()));
    registry.register(RecommendSessions(ctx.clone()));
    registry.register(PersonalizedSchedule(ctx.clone()));
    registry.register(ScheduleByDay(ctx.clone()));
    registry.register(CatalogFacets(ctx));
}

/// 会话的输出形态
pub fn session_json(e: &Event) -> Value {
    json!({
        "id": e.id,
        "title": e.title,
        "description": e.description,
        "speakers": e.speakers,
        "venue": e.venue,
        "day": e.day,
        "time": e.time,
        "dayTime": e.day_time(),
        "type": e.kind,
        "level": e.level,
        "tags": e.tags,
        "services": e.services,
        "url": e.url,
    })
}

fn scored_json(s: &ScoredEvent, prefs: &Preferences) -> Value {
    let mut v = session_json(&s.event);
    if let Some(obj) = v.as_object_mut() {
        obj.insert("relevanceScore".to_string(), json!(s.score));
        obj.insert(
            "matchedInterests".to_string(),
            json!(RelevanceScorer::matched_interests(&s.event, prefs)),
        );
        obj.insert("roleMatch".to_string(), json!(RelevanceScorer::role_match(&s.event, prefs)));
    }
    v
}

fn parse_day(tool: &str, raw: &str) -> Result<Day, CapabilityError> {
    raw.parse::<Day>().map_err(|e| CapabilityError::invalid(tool, e))
}

pub struct SearchSessions(pub Arc<ConferenceContext>);

const SEARCH_PARAMS: &[ParamSpec] = &[
    ParamSpec::optional("query", ParamKind::String, "keywords, topic or speaker; empty lists everything"),
    ParamSpec::optional("type", ParamKind::String, "session type, e.g. Workshop, Keynote"),
    ParamSpec::optional("level", ParamKind::String, "experience level, e.g. 200 - Intermediate"),
    ParamSpec::optional("day", ParamKind::String, "conference day, e.g. Monday"),
    ParamSpec::optional("venue", ParamKind::String, "venue name"),
    ParamSpec::optional("limit", ParamKind::Number, "maximum sessions returned"),
];

#[async_trait]
impl Capability for SearchSessions {
    fn name(&self) -> &str {
        "search_sessions"
    }

    fn strand(&self) -> Strand {
        Strand::Conference
    }

    fn description(&self) -> &str {
        "Search conference sessions by keywords, topics or speakers"
    }

    fn parameters(&self) -> &[ParamSpec] {
        SEARCH_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        self.0.ensure_catalog()?;
        let day = params::string(&p, "day")
            .map(|d| parse_day(self.name(), &d))
            .transpose()?;
        let filter = SearchFilter {
            text: params::string(&p, "query"),
            kind: params::string_any(&p, &["type", "track"]),
            level: params::string(&p, "level"),
            day,
            venue: params::string(&p, "venue"),
        };
        let limit = params::usize_or(&p, "limit", self.0.defaults.search_limit);
        let hits = self.0.repo.search(&filter)?;
        Ok(json!({
            "query": filter.text.unwrap_or_default(),
            "found": hits.len(),
            "sessions": hits.iter().take(limit).map(session_json).collect::<Vec<_>>(),
        }))
    }
}

pub struct SessionDetails(pub Arc<ConferenceContext>);

const DETAILS_PARAMS: &[ParamSpec] =
    &[ParamSpec::required("session_id", ParamKind::String, "session id")];

#[async_trait]
impl Capability for SessionDetails {
    fn name(&self) -> &str {
        "get_session_details"
    }

    fn strand(&self) -> Strand {
        Strand::Conference
    }

    fn description(&self) -> &str {
        "Get detailed information about a specific session"
    }

    fn parameters(&self) -> &[ParamSpec] {
        DETAILS_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        self.0.ensure_catalog()?;
        let id = params::string_any(&p, &["session_id", "sessionId"])
            .ok_or_else(|| CapabilityError::invalid(self.name(), "missing session id"))?;
        let event = self
            .0
            .repo
            .get_by_id(&id)?
            .ok_or_else(|| CapabilityError::NotFound(format!("session {id}")))?;
        Ok(session_json(&event))
    }
}

pub struct RecommendSessions(pub Arc<ConferenceContext>);

const RECOMMEND_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("interests", ParamKind::Array, "topics of interest, e.g. [\"AI\", \"agents\"]"),
    ParamSpec::optional("role", ParamKind::String, "professional role, e.g. developer"),
    ParamSpec::optional("experience_level", ParamKind::String, "only sessions at this level"),
    ParamSpec::optional("limit", ParamKind::Number, "maximum recommendations (default 10)"),
];

#[async_trait]
impl Capability for RecommendSessions {
    fn name(&self) -> &str {
        "recommend_sessions"
    }

    fn strand(&self) -> Strand {
        Strand::Conference
    }

    fn description(&self) -> &str {
        "Get personalized session recommendations based on interests and role"
    }

    fn parameters(&self) -> &[ParamSpec] {
        RECOMMEND_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        let mut events = self.0.all_events()?;
        let interests = params::string_list(&p, "interests");
        let role = params::string(&p, "role").unwrap_or_default();
        let level = params::string(&p, "experience_level").unwrap_or_default();
        let limit = params::usize_or(&p, "limit", self.0.defaults.recommend_limit).max(1);

        if !level.is_empty() {
            let at_level: Vec<Event> = events
                .iter()
                .filter(|e| e.level.eq_ignore_ascii_case(&level))
                .cloned()
                .collect();
            if at_level.is_empty() {
                tracing::warn!(level = %level, "no sessions at requested level, ignoring level filter");
            } else {
                events = at_level;
            }
        }

        let prefs = Preferences::new(&interests, &role, &level);
        let ranked = self.0.scorer.recommend(&events, &prefs, limit);
        Ok(json!({
            "total_found": ranked.len(),
            "recommendations": ranked.iter().map(|s| scored_json(s, &prefs)).collect::<Vec<_>>(),
        }))
    }
}

pub struct PersonalizedSchedule(pub Arc<ConferenceContext>);

const SCHEDULE_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("role", ParamKind::String, "professional role, e.g. product manager"),
    ParamSpec::required("learning_topics", ParamKind::Array, "topics to learn about"),
    ParamSpec::optional("experience_level", ParamKind::String, "experience level"),
    ParamSpec::optional("max_sessions_per_day", ParamKind::Number, "sessions per day (default 4)"),
    ParamSpec::optional("avoid_conflicts", ParamKind::Boolean, "skip overlapping time slots (default true)"),
];

#[async_trait]
impl Capability for PersonalizedSchedule {
    fn name(&self) -> &str {
        "create_personalized_schedule"
    }

    fn strand(&self) -> Strand {
        Strand::Conference
    }

    fn description(&self) -> &str {
        "Create a personalized, conflict-free conference schedule based on role and learning topics"
    }

    fn parameters(&self) -> &[ParamSpec] {
        SCHEDULE_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        let events = self.0.all_events()?;
        let role = params::string(&p, "role").unwrap_or_else(|| "attendee".to_string());
        let topics = params::string_list(&p, "learning_topics");
        let level = params::string(&p, "experience_level").unwrap_or_default();
        let options = AgendaOptions {
            max_per_day: params::usize_or(&p, "max_sessions_per_day", self.0.defaults.max_sessions_per_day),
            avoid_conflicts: params::bool_or(&p, "avoid_conflicts", self.0.defaults.avoid_conflicts),
        };
        let prefs = Preferences::new(&topics, &role, &level);
        let agenda = self
            .0
            .agenda
            .build(&events, &prefs, &options)
            .map_err(|_| CapabilityError::EmptyCatalog)?;

        let schedule: serde_json::Map<String, Value> = agenda
            .schedule
            .iter()
            .map(|(day, list)| {
                (
                    day.to_string(),
                    Value::Array(list.iter().map(|s| scored_json(s, &prefs)).collect()),
                )
            })
            .collect();

        Ok(json!({
            "personalized_schedule": {
                "role": role,
                "learning_topics": topics,
                "experience_level": if level.is_empty() { "All levels".to_string() } else { level },
                "total_sessions": agenda.total_sessions,
                "candidate_count": agenda.candidate_count,
                "average_relevance_score": agenda.average_relevance_score,
                "schedule": schedule,
                "summary": {
                    "message": format!(
                        "Personalized schedule created for {} focusing on {}",
                        role,
                        if topics.is_empty() { "general topics".to_string() } else { topics.join(", ") }
                    ),
                    "sessions_per_day": agenda.sessions_per_day,
                },
            }
        }))
    }
}

pub struct ScheduleByDay(pub Arc<ConferenceContext>);

const BY_DAY_PARAMS: &[ParamSpec] =
    &[ParamSpec::required("day", ParamKind::String, "conference day, e.g. Tuesday")];

#[async_trait]
impl Capability for ScheduleByDay {
    fn name(&self) -> &str {
        "get_schedule_by_day"
    }

    fn strand(&self) -> Strand {
        Strand::Conference
    }

    fn description(&self) -> &str {
        "List all sessions on a given conference day, ordered by time"
    }

    fn parameters(&self) -> &[ParamSpec] {
        BY_DAY_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        self.0.ensure_catalog()?;
        let raw = params::string(&p, "day").unwrap_or_default();
        let day = parse_day(self.name(), &raw)?;
        let sessions = self.0.repo.search(&SearchFilter {
            day: Some(day),
            ..Default::default()
        })?;
        Ok(json!({
            "day": day,
            "count": sessions.len(),
            "sessions": sessions.iter().map(session_json).collect::<Vec<_>>(),
        }))
    }
}

pub struct CatalogFacets(pub Arc<ConferenceContext>);

#[async_trait]
impl Capability for CatalogFacets {
    fn name(&self) -> &str {
        "get_catalog_facets"
    }

    fn strand(&self) -> Strand {
        Strand::Conference
    }

    fn description(&self) -> &str {
        "List available session types, venues, levels and conference days"
    }

    fn parameters(&self) -> &[ParamSpec] {
        &[]
    }

    async fn invoke(&self, _p: Value) -> Result<Value, CapabilityError> {
        let repo = &self.0.repo;
        let total = repo.count()?;
        if total == 0 {
            return Err(CapabilityError::EmptyCatalog);
        }
        Ok(json!({
            "total_sessions": total,
            "types": repo.distinct_types()?,
            "venues": repo.distinct_venues()?,
            "levels": repo.distinct_levels()?,
            "days": repo.distinct_days()?,
        }))
    }
}
