//! 会话记录
//!
//! Event 是不可变的会话记录；所有缺失字段在构造时即被替换为显式占位值，
//! 评分与编排阶段不需要再判断「字段是否存在」。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 时间 / 日期未定时的占位值
pub const PLACEHOLDER: &str = "TBD";

pub const DEFAULT_TITLE: &str = "Untitled Session";
pub const DEFAULT_DESCRIPTION: &str = "Session description available";
pub const DEFAULT_SPEAKERS: &str = "Speakers TBD";
pub const DEFAULT_VENUE: &str = "Venue TBD";
pub const DEFAULT_TYPE: &str = "Session";
pub const DEFAULT_LEVEL: &str = "All levels";

/// 会议日（未知值一律归为 Tbd）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    #[serde(rename = "TBD")]
    Tbd,
}

impl Day {
    pub const WEEK: [Day; 7] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Tbd => PLACEHOLDER,
        }
    }

    /// 宽松解析：大小写不敏感，接受三字母缩写，其余一律视为 Tbd
    pub fn parse_lenient(raw: &str) -> Day {
        raw.parse().unwrap_or(Day::Tbd)
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.is_empty() {
            return Err("empty day".to_string());
        }
        Day::WEEK
            .iter()
            .copied()
            .find(|d| {
                let name = d.as_str().to_lowercase();
                name == lower || (lower.len() >= 3 && name.starts_with(&lower))
            })
            .or_else(|| (lower == "tbd" || lower == "day tbd").then_some(Day::Tbd))
            .ok_or_else(|| format!("unknown day: {s}"))
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 会话记录（字段均已归一化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub speakers: String,
    pub venue: String,
    pub day: Day,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub tags: Vec<String>,
    pub services: Vec<String>,
    pub url: String,
}

impl Event {
    /// 时间是否为占位值（占位时间永远不参与冲突判断）
    pub fn has_placeholder_time(&self) -> bool {
        is_placeholder_time(&self.time)
    }

    /// 标签以逗号拼接后的文本，评分时做子串匹配
    pub fn tags_text(&self) -> String {
        self.tags.join(", ")
    }

    pub fn services_text(&self) -> String {
        self.services.join(", ")
    }

    /// 「Monday 11:30 - 12:30」形式的展示文本
    pub fn day_time(&self) -> String {
        match (self.day, self.has_placeholder_time()) {
            (Day::Tbd, true) => "Schedule TBD".to_string(),
            (day, true) => format!("{day} (time TBD)"),
            (day, false) => format!("{day} {}", self.time),
        }
    }
}

pub fn is_placeholder_time(time: &str) -> bool {
    let t = time.trim();
    t.is_empty() || t.eq_ignore_ascii_case(PLACEHOLDER) || t.eq_ignore_ascii_case("time tbd")
}

/// 目录文件中的原始记录：所有字段可缺省，tags / services 既可是数组也可是逗号分隔字符串
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub speakers: Option<String>,
    pub venue: Option<String>,
    pub day: Option<String>,
    pub time: Option<String>,
    pub day_time: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub level: Option<String>,
    pub tags: Option<Labels>,
    pub services: Option<Labels>,
    pub url: Option<String>,
}

/// 标签字段的两种输入形态
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Labels {
    List(Vec<String>),
    Text(String),
}

impl Labels {
    /// 拆分、去空白、去重（保留首次出现的顺序）
    fn into_set(self) -> Vec<String> {
        let items: Vec<String> = match self {
            Labels::List(v) => v,
            Labels::Text(s) => s.split(',').map(str::to_string).collect(),
        };
        let mut out: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let item = item.trim().to_string();
            if !item.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(&item)) {
                out.push(item);
            }
        }
        out
    }
}

/// 拆分 dayTime：首个空格前为日期，之后为时间；单个词视为日期、时间未定
pub fn split_day_time(day_time: &str) -> (Day, String) {
    let trimmed = day_time.trim();
    match trimmed.split_once(' ') {
        Some((day, time)) if !time.trim().is_empty() => {
            (Day::parse_lenient(day), time.trim().to_string())
        }
        _ => (Day::parse_lenient(trimmed), PLACEHOLDER.to_string()),
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl RawEvent {
    /// 归一化为 Event；没有 id 时使用 fallback_id（通常为行号）
    pub fn normalize(self, fallback_id: &str) -> Event {
        let (dt_day, dt_time) = non_blank(self.day_time)
            .map(|dt| split_day_time(&dt))
            .unwrap_or((Day::Tbd, PLACEHOLDER.to_string()));

        let day = non_blank(self.day)
            .map(|d| Day::parse_lenient(&d))
            .unwrap_or(dt_day);
        let time = non_blank(self.time)
            .filter(|t| !is_placeholder_time(t))
            .unwrap_or(dt_time);
        let time = if is_placeholder_time(&time) {
            PLACEHOLDER.to_string()
        } else {
            time
        };

        Event {
            id: non_blank(self.id).unwrap_or_else(|| fallback_id.to_string()),
            title: non_blank(self.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: non_blank(self.description)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            speakers: non_blank(self.speakers).unwrap_or_else(|| DEFAULT_SPEAKERS.to_string()),
            venue: non_blank(self.venue).unwrap_or_else(|| DEFAULT_VENUE.to_string()),
            day,
            time,
            kind: non_blank(self.kind).unwrap_or_else(|| DEFAULT_TYPE.to_string()),
            level: non_blank(self.level).unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
            tags: self.tags.map(Labels::into_set).unwrap_or_default(),
            services: self.services.map(Labels::into_set).unwrap_or_default(),
            url: non_blank(self.url).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_day_time() {
        let (day, time) = split_day_time("Monday 11:30 AM - 12:30 PM");
        assert_eq!(day, Day::Monday);
        assert_eq!(time, "11:30 AM - 12:30 PM");

        let (day, time) = split_day_time("Wednesday");
        assert_eq!(day, Day::Wednesday);
        assert_eq!(time, PLACEHOLDER);
    }

    #[test]
    fn test_normalize_fills_placeholders() {
        let raw = RawEvent {
            title: Some("  ".to_string()),
            time: Some("Time TBD".to_string()),
            tags: Some(Labels::Text("AI, developer, ai , ".to_string())),
            ..Default::default()
        };
        let event = raw.normalize("row-7");
        assert_eq!(event.id, "row-7");
        assert_eq!(event.title, DEFAULT_TITLE);
        assert_eq!(event.day, Day::Tbd);
        assert_eq!(event.time, PLACEHOLDER);
        assert_eq!(event.kind, DEFAULT_TYPE);
        assert_eq!(event.tags, vec!["AI".to_string(), "developer".to_string()]);
        assert!(event.services.is_empty());
    }

    #[test]
    fn test_explicit_day_wins_over_day_time() {
        let raw = RawEvent {
            day: Some("tue".to_string()),
            day_time: Some("Monday 9:00 AM".to_string()),
            ..Default::default()
        };
        let event = raw.normalize("x");
        assert_eq!(event.day, Day::Tuesday);
        assert_eq!(event.time, "9:00 AM");
    }

    #[test]
    fn test_day_parse_lenient() {
        assert_eq!(Day::parse_lenient("THURSDAY"), Day::Thursday);
        assert_eq!(Day::parse_lenient("someday"), Day::Tbd);
        assert_eq!(Day::parse_lenient(""), Day::Tbd);
    }
}
