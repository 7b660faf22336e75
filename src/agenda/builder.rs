//! 个性化日程编排
//!
//! 贪心装箱：按分数从高到低逐日放入会话，同一天内已占用的非占位时间段直接跳过，
//! 每天放满 max_per_day 即停止。相同输入总是得到相同日程（稳定排序）。

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::catalog::{Day, Event};
use crate::core::StrandError;
use crate::scoring::scorer::sort_desc;
use crate::scoring::{fallback_score, Preferences, RelevanceScorer, ScoredEvent, ScoringProfile};

/// 候选池大小 = CANDIDATE_FACTOR × max_per_day（正分会话不足时）
pub const CANDIDATE_FACTOR: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub day: Day,
    pub count: usize,
    pub top_session: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agenda {
    pub schedule: BTreeMap<Day, Vec<ScoredEvent>>,
    pub candidate_count: usize,
    pub total_sessions: usize,
    /// 两位小数
    pub average_relevance_score: f64,
    pub sessions_per_day: Vec<DaySummary>,
}

impl Agenda {
    pub fn is_empty(&self) -> bool {
        self.total_sessions == 0
    }
}

#[derive(Debug, Clone)]
pub struct AgendaOptions {
    pub max_per_day: usize,
    pub avoid_conflicts: bool,
}

impl Default for AgendaOptions {
    fn default() -> Self {
        Self {
            max_per_day: 4,
            avoid_conflicts: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgendaBuilder {
    scorer: RelevanceScorer,
}

impl AgendaBuilder {
    pub fn new(scorer: RelevanceScorer) -> Self {
        Self { scorer }
    }

    /// 候选池：全部正分会话；不足 3×max_per_day 时用兜底分补足零分会话
    pub fn candidates(&self, events: &[Event], prefs: &Preferences, max_per_day: usize) -> Vec<ScoredEvent> {
        let threshold = CANDIDATE_FACTOR.saturating_mul(max_per_day.max(1));
        let (mut pool, mut zero): (Vec<ScoredEvent>, Vec<ScoredEvent>) = self
            .scorer
            .score_all(events, prefs, &ScoringProfile::SCHEDULE)
            .into_iter()
            .partition(|s| s.score > 0.0);

        if pool.len() < threshold {
            for s in zero.iter_mut() {
                s.score = fallback_score(&s.event);
            }
            sort_desc(&mut zero);
            let missing = threshold - pool.len();
            pool.extend(zero.into_iter().take(missing));
        }
        sort_desc(&mut pool);
        pool
    }

    pub fn build(
        &self,
        events: &[Event],
        prefs: &Preferences,
        options: &AgendaOptions,
    ) -> Result<Agenda, StrandError> {
        if events.is_empty() {
            return Err(StrandError::EmptyCatalog);
        }
        let max_per_day = options.max_per_day.max(1);
        let pool = self.candidates(events, prefs, max_per_day);
        let candidate_count = pool.len();

        let mut schedule: BTreeMap<Day, Vec<ScoredEvent>> = BTreeMap::new();
        let mut used: BTreeMap<Day, HashSet<String>> = BTreeMap::new();

        for mut candidate in pool {
            let day = candidate.event.day;
            let placed = schedule.entry(day).or_default();
            if placed.len() >= max_per_day {
                continue;
            }
            let slots = used.entry(day).or_default();
            let timed = !candidate.event.has_placeholder_time();
            if options.avoid_conflicts && timed && slots.contains(&candidate.event.time) {
                continue;
            }
            if timed {
                slots.insert(candidate.event.time.clone());
            }
            candidate.score = round2(candidate.score);
            placed.push(candidate);
        }
        schedule.retain(|_, v| !v.is_empty());

        let total_sessions: usize = schedule.values().map(Vec::len).sum();
        let score_sum: f64 = schedule.values().flatten().map(|s| s.score).sum();
        let average_relevance_score = if total_sessions > 0 {
            round2(score_sum / total_sessions as f64)
        } else {
            0.0
        };
        let sessions_per_day = schedule
            .iter()
            .map(|(day, list)| DaySummary {
                day: *day,
                count: list.len(),
                top_session: list
                    .first()
                    .map(|s| s.event.title.clone())
                    .unwrap_or_else(|| "No sessions".to_string()),
            })
            .collect();

        tracing::debug!(
            candidates = candidate_count,
            total = total_sessions,
            days = schedule.len(),
            "agenda built"
        );

        Ok(Agenda {
            schedule,
            candidate_count,
            total_sessions,
            average_relevance_score,
            sessions_per_day,
        })
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
