//! 会话目录访问接口
//!
//! EventRepository 对本引擎是只读的；InMemoryRepository 在构造后不再修改，
//! 多个请求可以无锁并发读取。

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;

use crate::catalog::{Day, Event};

/// 目录访问错误（文件、SQLite、解析）
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog parse error: {0}")]
    Parse(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Duplicate session id: {0}")]
    DuplicateId(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// 搜索条件：None 表示不过滤
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub text: Option<String>,
    pub kind: Option<String>,
    pub level: Option<String>,
    pub day: Option<Day>,
    pub venue: Option<String>,
}

impl SearchFilter {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// 文本在 title / description / speakers / tags / services / type 任一字段中出现（不区分大小写）；
    /// type、level 精确匹配；venue 子串匹配
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let hit = [
                event.title.as_str(),
                event.description.as_str(),
                event.speakers.as_str(),
                event.kind.as_str(),
            ]
            .iter()
            .any(|f| f.to_lowercase().contains(&needle))
                || event.tags_text().to_lowercase().contains(&needle)
                || event.services_text().to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.trim().is_empty()) {
            if !event.kind.eq_ignore_ascii_case(kind.trim()) {
                return false;
            }
        }
        if let Some(level) = self.level.as_deref().filter(|l| !l.trim().is_empty()) {
            if !event.level.eq_ignore_ascii_case(level.trim()) {
                return false;
            }
        }
        if let Some(day) = self.day {
            if event.day != day {
                return false;
            }
        }
        if let Some(venue) = self.venue.as_deref().filter(|v| !v.trim().is_empty()) {
            if !event.venue.to_lowercase().contains(&venue.trim().to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// 只读会话目录
pub trait EventRepository: Send + Sync {
    fn search(&self, filter: &SearchFilter) -> Result<Vec<Event>, CatalogError>;

    fn get_by_id(&self, id: &str) -> Result<Option<Event>, CatalogError>;

    /// 全部会话，按 (day, time) 排序
    fn all(&self) -> Result<Vec<Event>, CatalogError>;

    fn count(&self) -> Result<usize, CatalogError> {
        Ok(self.all()?.len())
    }

    fn distinct_types(&self) -> Result<Vec<String>, CatalogError> {
        Ok(distinct(self.all()?.iter().map(|e| e.kind.clone())))
    }

    fn distinct_venues(&self) -> Result<Vec<String>, CatalogError> {
        Ok(distinct(self.all()?.iter().map(|e| e.venue.clone())))
    }

    fn distinct_levels(&self) -> Result<Vec<String>, CatalogError> {
        Ok(distinct(self.all()?.iter().map(|e| e.level.clone())))
    }

    fn distinct_days(&self) -> Result<Vec<Day>, CatalogError> {
        let days: BTreeSet<Day> = self.all()?.iter().map(|e| e.day).collect();
        Ok(days.into_iter().collect())
    }
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}

/// 内存目录：构造时校验 id 唯一并按 (day, time) 排序
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    events: Vec<Event>,
}

impl InMemoryRepository {
    pub fn new(mut events: Vec<Event>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(events.len());
        for e in &events {
            if !seen.insert(e.id.as_str()) {
                return Err(CatalogError::DuplicateId(e.id.clone()));
            }
        }
        events.sort_by(|a, b| a.day.cmp(&b.day).then_with(|| a.time.cmp(&b.time)));
        Ok(Self { events })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventRepository for InMemoryRepository {
    fn search(&self, filter: &SearchFilter) -> Result<Vec<Event>, CatalogError> {
        Ok(self
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Event>, CatalogError> {
        Ok(self.events.iter().find(|e| e.id == id).cloned())
    }

    fn all(&self) -> Result<Vec<Event>, CatalogError> {
        Ok(self.events.clone())
    }

    fn count(&self) -> Result<usize, CatalogError> {
        Ok(self.events.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::RawEvent;

    /// 测试用会话构造：id、标题、类型、日期、时间、标签
    pub(crate) fn event(id: &str, title: &str, kind: &str, day: Day, time: &str, tags: &[&str]) -> Event {
        let mut e = RawEvent {
            id: Some(id.to_string()),
            title: Some(title.to_string()),
            kind: Some(kind.to_string()),
            time: Some(time.to_string()),
            ..Default::default()
        }
        .normalize(id);
        e.day = day;
        e.tags = tags.iter().map(|t| t.to_string()).collect();
        e
    }

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new(vec![
            event("b", "Serverless patterns", "Breakout session", Day::Tuesday, "10:00", &["lambda"]),
            event("a", "Agents on Bedrock", "Workshop", Day::Monday, "09:00", &["ai", "agents"]),
            event("c", "Keynote", "Keynote", Day::Monday, "08:00", &[]),
        ])
        .unwrap()
    }

    #[test]
    fn test_all_sorted_by_day_then_time() {
        let ids: Vec<String> = repo().all().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_search_text_and_filters() {
        let r = repo();
        assert_eq!(r.search(&SearchFilter::text("AGENTS")).unwrap().len(), 1);
        assert_eq!(r.search(&SearchFilter::default()).unwrap().len(), 3);

        let filter = SearchFilter {
            day: Some(Day::Monday),
            kind: Some("workshop".to_string()),
            ..Default::default()
        };
        let hits = r.search(&filter).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let dup = vec![
            event("x", "One", "Session", Day::Monday, "TBD", &[]),
            event("x", "Two", "Session", Day::Monday, "TBD", &[]),
        ];
        assert!(matches!(
            InMemoryRepository::new(dup),
            Err(CatalogError::DuplicateId(id)) if id == "x"
        ));
    }

    #[test]
    fn test_distinct_facets() {
        let r = repo();
        assert_eq!(r.distinct_days().unwrap(), vec![Day::Monday, Day::Tuesday]);
        assert_eq!(r.distinct_types().unwrap().len(), 3);
        assert_eq!(r.get_by_id("b").unwrap().map(|e| e.title), Some("Serverless patterns".to_string()));
        assert!(r.get_by_id("zzz").unwrap().is_none());
    }
}
