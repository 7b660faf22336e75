//! 目录文件加载
//!
//! JSON 文件可以是记录数组，也可以是 `{"sessions": [...]}`；.csv 按表头读取；
//! 扩展名为 .db / .sqlite 时直接打开 SQLite，库为空且配置了 seed 文件时先导入。

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::catalog::{
    CatalogError, Event, EventRepository, InMemoryRepository, Labels, RawEvent, SqliteRepository,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<RawEvent>),
    Wrapped { sessions: Vec<RawEvent> },
}

/// 解析 JSON 文本为归一化后的会话；缺 id 的记录以 `row-N` 命名
pub fn parse_events(json: &str) -> Result<Vec<Event>, CatalogError> {
    let file: CatalogFile =
        serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
    let raw = match file {
        CatalogFile::List(v) => v,
        CatalogFile::Wrapped { sessions } => sessions,
    };
    Ok(normalize_all(raw))
}

fn normalize_all(raw: Vec<RawEvent>) -> Vec<Event> {
    raw.into_iter()
        .enumerate()
        .map(|(i, r)| r.normalize(&format!("row-{}", i + 1)))
        .collect()
}

/// CSV 中的一行；列可缺省，空单元格视为缺省
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    level: Option<String>,
    title: Option<String>,
    description: Option<String>,
    speakers: Option<String>,
    venue: Option<String>,
    day: Option<String>,
    time: Option<String>,
    day_time: Option<String>,
    services: Option<String>,
    tags: Option<String>,
    url: Option<String>,
}

impl From<CsvRow> for RawEvent {
    fn from(r: CsvRow) -> Self {
        RawEvent {
            id: r.id,
            title: r.title,
            description: r.description,
            speakers: r.speakers,
            venue: r.venue,
            day: r.day,
            time: r.time,
            day_time: r.day_time,
            kind: r.kind,
            level: r.level,
            tags: r.tags.map(Labels::Text),
            services: r.services.map(Labels::Text),
            url: r.url,
        }
    }
}

/// 解析带表头的 CSV（列名同 JSON 字段：id, type, level, title, dayTime, tags …）
pub fn parse_csv_events(text: &str) -> Result<Vec<Event>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut raw = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.map_err(|e| CatalogError::Parse(format!("csv row {}: {e}", i + 1)))?;
        raw.push(RawEvent::from(row));
    }
    Ok(normalize_all(raw))
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

fn is_sqlite(path: &Path) -> bool {
    has_extension(path, &["db", "sqlite", "sqlite3"])
}

/// 读取 JSON 或 CSV 目录文件
pub fn load_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read catalog {}", path.display()))?;
    let events = if has_extension(path, &["csv"]) {
        parse_csv_events(&text)
    } else {
        parse_events(&text)
    }
    .with_context(|| format!("parse catalog {}", path.display()))?;
    tracing::info!(path = %path.display(), count = events.len(), "catalog loaded");
    Ok(events)
}

/// 按扩展名打开目录；None 时返回空目录（请求时报告 EmptyCatalog）
///
/// SQLite 目录为空且给了 seed（JSON / CSV）时，先把 seed 导入库中。
pub fn open_repository(path: Option<&Path>, seed: Option<&Path>) -> anyhow::Result<Arc<dyn EventRepository>> {
    let Some(path) = path else {
        tracing::warn!("no catalog configured, starting with an empty catalog");
        return Ok(Arc::new(InMemoryRepository::empty()));
    };
    if is_sqlite(path) {
        let repo = SqliteRepository::open(path)
            .with_context(|| format!("open sqlite catalog {}", path.display()))?;
        if let Some(seed) = seed {
            if repo.count()? == 0 {
                let events = load_events(seed)?;
                repo.import(&events)
                    .with_context(|| format!("import {} into {}", seed.display(), path.display()))?;
            }
        }
        return Ok(Arc::new(repo));
    }
    let repo = InMemoryRepository::new(load_events(path)?)?;
    Ok(Arc::new(repo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Day;
    use std::io::Write;

    #[test]
    fn test_parse_list_and_wrapped() {
        let list = r#"[{"id": "s1", "title": "A", "dayTime": "Monday 9:00 AM", "tags": "ai, agents"}]"#;
        let events = parse_events(list).unwrap();
        assert_eq!(events[0].day, Day::Monday);
        assert_eq!(events[0].tags.len(), 2);

        let wrapped = r#"{"sessions": [{"title": "B"}, {"title": "C", "tags": ["x"]}]}"#;
        let events = parse_events(wrapped).unwrap();
        assert_eq!(events[0].id, "row-1");
        assert_eq!(events[1].id, "row-2");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_events("{oops"), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn test_open_repository_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"id": "k", "title": "Keynote", "type": "Keynote", "day": "Tuesday"}}]"#).unwrap();
        let repo = open_repository(Some(file.path()), None).unwrap();
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.distinct_days().unwrap(), vec![Day::Tuesday]);
    }

    #[test]
    fn test_open_repository_none_is_empty() {
        let repo = open_repository(None, None).unwrap();
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_ids_fail_to_load() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"id": "d"}}, {{"id": "d"}}]"#).unwrap();
        assert!(open_repository(Some(file.path()), None).is_err());
    }

    #[test]
    fn test_parse_csv_with_day_time_and_blank_cells() {
        let csv = "id,type,level,title,description,speakers,venue,dayTime,services,tags,url\n\
AIM201,Breakout session,200 - Intermediate,\"Agents, end to end\",,Jane Doe,Venetian,Monday 10:00 AM - 11:00 AM,Amazon Bedrock,\"ai, agents\",\n\
KEY001,Keynote,,Opening keynote,,,,Tuesday,,,\n";
        let events = parse_csv_events(csv).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "AIM201");
        assert_eq!(events[0].title, "Agents, end to end");
        assert_eq!(events[0].day, Day::Monday);
        assert_eq!(events[0].time, "10:00 AM - 11:00 AM");
        assert_eq!(events[0].tags, vec!["ai".to_string(), "agents".to_string()]);
        assert_eq!(events[0].services, vec!["Amazon Bedrock".to_string()]);
        assert_eq!(events[1].day, Day::Tuesday);
        assert!(events[1].has_placeholder_time());
    }

    #[test]
    fn test_open_repository_from_csv_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "id,title,type,dayTime,tags\ns1,Serverless,Workshop,Wednesday 9:00 AM,lambda\n").unwrap();
        let repo = open_repository(Some(file.path()), None).unwrap();
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.distinct_days().unwrap(), vec![Day::Wednesday]);
    }

    #[test]
    fn test_empty_sqlite_is_seeded_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("catalog.db");
        let seed = dir.path().join("seed.csv");
        std::fs::write(&seed, "id,title,dayTime\na,First,Monday 9:00 AM\nb,Second,Tuesday 9:00 AM\n").unwrap();

        let repo = open_repository(Some(&db), Some(&seed)).unwrap();
        assert_eq!(repo.count().unwrap(), 2);
        drop(repo);

        std::fs::write(&seed, "id,title\nc,Third\n").unwrap();
        let repo = open_repository(Some(&db), Some(&seed)).unwrap();
        assert_eq!(repo.count().unwrap(), 2);
        assert!(repo.get_by_id("c").unwrap().is_none());
    }
}
