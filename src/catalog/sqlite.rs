//! SQLite 会话目录
//!
//! 单表 sessions，tags / services 以逗号拼接存储；day_order 列保证与内存目录相同的排序。
//! 旧版库（没有 day_order、文本列可为 NULL）在打开时补列并回填。
//! 连接放在 Mutex 中串行访问，对外仍是只读的 EventRepository。

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, Row};

use crate::catalog::{CatalogError, Day, Event, EventRepository, Labels, RawEvent, SearchFilter};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    level TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    speakers TEXT NOT NULL,
    venue TEXT NOT NULL,
    day TEXT NOT NULL,
    day_order INTEGER NOT NULL,
    time TEXT NOT NULL,
    services TEXT NOT NULL,
    tags TEXT NOT NULL,
    url TEXT NOT NULL
)";

const COLUMNS: &str = "id, type, level, title, description, speakers, venue, day, time, services, tags, url";

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// 打开（或创建）数据库文件并确保表存在
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(SCHEMA)?;
        migrate_day_order(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Unavailable("sqlite connection poisoned".to_string()))
    }

    /// 导入会话（INSERT OR REPLACE，单事务）；返回写入条数
    pub fn import(&self, events: &[Event]) -> Result<usize, CatalogError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO sessions
                 (id, type, level, title, description, speakers, venue, day, day_order, time, services, tags, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for e in events {
                stmt.execute(params![
                    e.id,
                    e.kind,
                    e.level,
                    e.title,
                    e.description,
                    e.speakers,
                    e.venue,
                    e.day.as_str(),
                    e.day as i64,
                    e.time,
                    e.services_text(),
                    e.tags_text(),
                    e.url,
                ])?;
            }
        }
        tx.commit()?;
        tracing::info!(count = events.len(), "sqlite catalog import");
        Ok(events.len())
    }

    fn query(&self, sql: &str, args: Vec<String>) -> Result<Vec<Event>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), row_to_event)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// 旧版表没有 day_order：补列，并按 day 文本回填
fn migrate_day_order(conn: &Connection) -> Result<(), CatalogError> {
    let has_column = {
        let mut stmt = conn.prepare("PRAGMA table_info(sessions)")?;
        let names = stmt.query_map([], |r| r.get::<_, String>(1))?;
        let mut found = false;
        for name in names {
            if name? == "day_order" {
                found = true;
            }
        }
        found
    };
    if has_column {
        return Ok(());
    }

    conn.execute_batch(&format!(
        "ALTER TABLE sessions ADD COLUMN day_order INTEGER NOT NULL DEFAULT {}",
        Day::Tbd as i64
    ))?;
    let days: Vec<(String, Option<String>)> = {
        let mut stmt = conn.prepare("SELECT id, day FROM sessions")?;
        let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
        rows.collect::<Result<_, _>>()?
    };
    let mut update = conn.prepare("UPDATE sessions SET day_order = ?1 WHERE id = ?2")?;
    for (id, day) in &days {
        let day = day.as_deref().map(Day::parse_lenient).unwrap_or(Day::Tbd);
        update.execute(params![day as i64, id])?;
    }
    tracing::info!(rows = days.len(), "sqlite catalog migrated: added day_order");
    Ok(())
}

/// LIKE 子串模式：转义 % _ \，与内存目录的子串匹配一致
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// 行 → Event；NULL 列按目录文件的缺省规则补齐
fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    let id: String = row.get(0)?;
    let raw = RawEvent {
        id: Some(id.clone()),
        kind: row.get(1)?,
        level: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        speakers: row.get(5)?,
        venue: row.get(6)?,
        day: row.get(7)?,
        time: row.get(8)?,
        services: row.get::<_, Option<String>>(9)?.map(Labels::Text),
        tags: row.get::<_, Option<String>>(10)?.map(Labels::Text),
        url: row.get(11)?,
        day_time: None,
    };
    Ok(raw.normalize(&id))
}

impl EventRepository for SqliteRepository {
    fn search(&self, filter: &SearchFilter) -> Result<Vec<Event>, CatalogError> {
        let mut sql = format!("SELECT {COLUMNS} FROM sessions WHERE 1=1");
        let mut args: Vec<String> = Vec::new();

        if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            sql.push_str(
                " AND (title LIKE ? ESCAPE '\\' OR description LIKE ? ESCAPE '\\' OR speakers LIKE ? ESCAPE '\\' \
                 OR tags LIKE ? ESCAPE '\\' OR services LIKE ? ESCAPE '\\' OR type LIKE ? ESCAPE '\\')",
            );
            let term = like_pattern(text);
            args.extend(std::iter::repeat(term).take(6));
        }
        if let Some(kind) = filter.kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            sql.push_str(" AND type = ? COLLATE NOCASE");
            args.push(kind.to_string());
        }
        if let Some(level) = filter.level.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            sql.push_str(" AND level = ? COLLATE NOCASE");
            args.push(level.to_string());
        }
        if let Some(day) = filter.day {
            sql.push_str(" AND day_order = ?");
            args.push((day as i64).to_string());
        }
        if let Some(venue) = filter.venue.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            sql.push_str(" AND venue LIKE ? ESCAPE '\\'");
            args.push(like_pattern(venue));
        }
        sql.push_str(" ORDER BY day_order, time");
        self.query(&sql, args)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Event>, CatalogError> {
        let sql = format!("SELECT {COLUMNS} FROM sessions WHERE id = ?");
        Ok(self.query(&sql, vec![id.to_string()])?.into_iter().next())
    }

    fn all(&self) -> Result<Vec<Event>, CatalogError> {
        let sql = format!("SELECT {COLUMNS} FROM sessions ORDER BY day_order, time");
        self.query(&sql, Vec::new())
    }

    fn count(&self) -> Result<usize, CatalogError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?;
        Ok(n.max(0) as usize)
    }

    fn distinct_types(&self) -> Result<Vec<String>, CatalogError> {
        self.distinct_column("type")
    }

    fn distinct_venues(&self) -> Result<Vec<String>, CatalogError> {
        self.distinct_column("venue")
    }

    fn distinct_levels(&self) -> Result<Vec<String>, CatalogError> {
        self.distinct_column("level")
    }
}

impl SqliteRepository {
    fn distinct_column(&self, column: &'static str) -> Result<Vec<String>, CatalogError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM sessions ORDER BY {column}"
        ))?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::repository::tests::event;
    use crate::catalog::InMemoryRepository;

    fn sample() -> Vec<Event> {
        vec![
            event("b", "Serverless patterns", "Breakout session", Day::Tuesday, "10:00", &["lambda"]),
            event("a", "Agents on Bedrock", "Workshop", Day::Monday, "09:00", &["ai", "agents"]),
            event("c", "Opening keynote", "Keynote", Day::Monday, "08:00", &[]),
        ]
    }

    #[test]
    fn test_sqlite_round_trip_and_order() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        assert_eq!(repo.import(&sample()).unwrap(), 3);
        assert_eq!(repo.count().unwrap(), 3);

        let ids: Vec<String> = repo.all().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let a = repo.get_by_id("a").unwrap().unwrap();
        assert_eq!(a.tags, vec!["ai".to_string(), "agents".to_string()]);
        assert_eq!(a.day, Day::Monday);
    }

    #[test]
    fn test_sqlite_search_agrees_with_memory() {
        let sqlite = SqliteRepository::open_in_memory().unwrap();
        sqlite.import(&sample()).unwrap();
        let memory = InMemoryRepository::new(sample()).unwrap();

        let filters = [
            SearchFilter::text("agents"),
            SearchFilter::text("KEYNOTE"),
            SearchFilter {
                day: Some(Day::Monday),
                ..Default::default()
            },
            SearchFilter {
                kind: Some("workshop".to_string()),
                ..Default::default()
            },
        ];
        for f in &filters {
            let a: Vec<String> = sqlite.search(f).unwrap().into_iter().map(|e| e.id).collect();
            let b: Vec<String> = memory.search(f).unwrap().into_iter().map(|e| e.id).collect();
            assert_eq!(a, b, "filter {:?}", f);
        }
    }

    #[test]
    fn test_sqlite_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let repo = SqliteRepository::open(&path).unwrap();
            repo.import(&sample()).unwrap();
        }
        let reopened = SqliteRepository::open(&path).unwrap();
        assert_eq!(reopened.distinct_days().unwrap(), vec![Day::Monday, Day::Tuesday]);
        assert_eq!(reopened.distinct_levels().unwrap(), vec!["All levels".to_string()]);
    }

    #[test]
    fn test_legacy_table_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE sessions (
                    id TEXT PRIMARY KEY, type TEXT NOT NULL, level TEXT NOT NULL, title TEXT NOT NULL,
                    description TEXT, speakers TEXT, venue TEXT, day TEXT, time TEXT, dayTime TEXT,
                    services TEXT, tags TEXT, url TEXT
                );
                INSERT INTO sessions (id, type, level, title, day, time, dayTime, tags)
                    VALUES ('w1', 'Workshop', '300', 'Agents lab', 'Wednesday', '2:00 PM', 'Wednesday 2:00 PM', 'ai, agents');
                INSERT INTO sessions (id, type, level, title, day, time, tags)
                    VALUES ('m1', 'Keynote', '100', 'Opening', 'Monday', '8:00 AM', NULL);",
            )
            .unwrap();
        }

        let repo = SqliteRepository::open(&path).unwrap();
        let all = repo.all().unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "w1"]);
        assert_eq!(all[1].tags, vec!["ai".to_string(), "agents".to_string()]);
        assert!(all[0].tags.is_empty());
        assert_eq!(all[0].venue, crate::catalog::event::DEFAULT_VENUE);

        let wednesday = repo
            .search(&SearchFilter {
                day: Some(Day::Wednesday),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(wednesday.len(), 1);
        assert_eq!(repo.search(&SearchFilter::text("agents")).unwrap().len(), 1);
    }

    #[test]
    fn test_like_wildcards_are_literal() {
        let mut pct = event("p", "Save 100% on compute", "Session", Day::Monday, "09:00", &[]);
        pct.venue = "Hall_A".to_string();
        let sqlite = SqliteRepository::open_in_memory().unwrap();
        sqlite.import(&[pct.clone(), event("q", "Compute basics", "Session", Day::Monday, "10:00", &[])]).unwrap();
        let memory = InMemoryRepository::new(vec![pct, event("q", "Compute basics", "Session", Day::Monday, "10:00", &[])]).unwrap();

        let filters = [
            SearchFilter::text("%"),
            SearchFilter::text("100%"),
            SearchFilter::text("_"),
            SearchFilter {
                venue: Some("l_a".to_string()),
                ..Default::default()
            },
        ];
        for f in &filters {
            let a: Vec<String> = sqlite.search(f).unwrap().into_iter().map(|e| e.id).collect();
            let b: Vec<String> = memory.search(f).unwrap().into_iter().map(|e| e.id).collect();
            assert_eq!(a, b, "filter {:?}", f);
        }
    }
}
