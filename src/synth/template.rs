//! 确定性模板渲染：摘要器不可用时的回答
//!
//! 每个出现过的分组一节（未知分组归入 Other），按能力渲染结果；
//! 成功但为空的结果输出固定的 "no data" 行，失败输出 `Error: <message>`。

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::Value;

use crate::tools::{InvocationOutcome, Strand};

pub const NO_DATA: &str = "No data found for this request.";

pub const HELP_TEXT: &str = "I couldn't match your request to any of my tools. Here are some things you can ask:\n\n\
**Conference Planning:**\n\
- \"Show me AI sessions\"\n\
- \"Recommend sessions for a developer interested in agents\"\n\
- \"Create a personalized schedule for a product manager interested in AI\"\n\n\
**AWS Documentation:**\n\
- \"How do I use Bedrock?\"\n\
- \"Lambda documentation on cold starts\"\n\n\
**Live Data Services:**\n\
- \"Weather in Las Vegas\"\n\
- \"AMZN stock price\"\n\
- \"Flights from NYC\"";

const LIST_LIMIT: usize = 10;

/// 分节键：已知分组按 Strand 顺序，Other 最后
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Known(Strand),
    Other,
}

impl Section {
    fn title(&self) -> &'static str {
        match self {
            Section::Known(s) => s.display_name(),
            Section::Other => "Other",
        }
    }
}

/// 渲染全部结果；无结果时返回帮助文本
pub fn render(outcomes: &[InvocationOutcome]) -> String {
    if outcomes.is_empty() {
        return HELP_TEXT.to_string();
    }
    let mut sections: BTreeMap<Section, Vec<&InvocationOutcome>> = BTreeMap::new();
    for o in outcomes {
        let key = o.strand.map(Section::Known).unwrap_or(Section::Other);
        sections.entry(key).or_default().push(o);
    }

    let mut out = String::from("Here is what I found:\n");
    for (section, items) in sections {
        let _ = write!(out, "\n**{}:**\n", section.title());
        for o in items {
            out.push_str(&render_outcome(o));
        }
    }
    out.trim_end().to_string()
}

fn render_outcome(o: &InvocationOutcome) -> String {
    if let Some(err) = &o.error {
        return format!("Error: {err}\n");
    }
    let result = o.result.as_ref().unwrap_or(&Value::Null);
    if is_empty_result(&o.tool, result) {
        return format!("{NO_DATA}\n");
    }
    let body = match o.tool.as_str() {
        "search_sessions" => sessions(result, "sessions", &format!("Found {} sessions", num(result, "found"))),
        "get_schedule_by_day" => sessions(result, "sessions", &format!("Sessions on {}", text(result, "day"))),
        "get_session_details" => session_details(result),
        "recommend_sessions" => recommendations(result),
        "create_personalized_schedule" => schedule(result),
        "get_catalog_facets" => facets(result),
        "search_aws_docs" => docs(result),
        "get_weather" => weather(result),
        "get_stock_price" => stock(result),
        "search_flights" => flights(result),
        _ => generic(result),
    };
    if result.get("simulated").and_then(Value::as_bool) == Some(true) {
        format!("{body}_(simulated data)_\n")
    } else {
        body
    }
}

/// 成功但无内容
fn is_empty_result(tool: &str, v: &Value) -> bool {
    let list_empty = |key: &str| v.get(key).and_then(Value::as_array).map(Vec::is_empty).unwrap_or(false);
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) if o.is_empty() => true,
        _ => match tool {
            "search_sessions" | "get_schedule_by_day" => list_empty("sessions"),
            "recommend_sessions" => list_empty("recommendations"),
            "search_aws_docs" => list_empty("results"),
            "search_flights" => list_empty("flights"),
            "create_personalized_schedule" => {
                v.pointer("/personalized_schedule/total_sessions").and_then(Value::as_u64) == Some(0)
            }
            _ => false,
        },
    }
}

fn text(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn num(v: &Value, key: &str) -> String {
    v.get(key).map(|n| n.to_string()).unwrap_or_else(|| "0".to_string())
}

fn session_line(s: &Value) -> String {
    let mut line = format!(
        "- **{}** ({} {}, {}) [{}]",
        text(s, "title"),
        text(s, "day"),
        text(s, "time"),
        text(s, "venue"),
        text(s, "type")
    );
    if let Some(score) = s.get("relevanceScore").and_then(Value::as_f64) {
        let _ = write!(line, " score {score:.2}");
    }
    line.push('\n');
    line
}

fn sessions(v: &Value, key: &str, heading: &str) -> String {
    let list = v.get(key).and_then(Value::as_array).cloned().unwrap_or_default();
    let mut out = format!("{heading}:\n");
    for s in list.iter().take(LIST_LIMIT) {
        out.push_str(&session_line(s));
    }
    if list.len() > LIST_LIMIT {
        let _ = writeln!(out, "...and {} more", list.len() - LIST_LIMIT);
    }
    out
}

fn session_details(s: &Value) -> String {
    format!(
        "**{}**\nSpeakers: {}\nWhen: {} {}\nWhere: {}\nType: {} | Level: {}\n{}\n",
        text(s, "title"),
        text(s, "speakers"),
        text(s, "day"),
        text(s, "time"),
        text(s, "venue"),
        text(s, "type"),
        text(s, "level"),
        text(s, "description")
    )
}

fn recommendations(v: &Value) -> String {
    sessions(v, "recommendations", &format!("Top {} recommendations", num(v, "total_found")))
}

fn schedule(v: &Value) -> String {
    let s = v.get("personalized_schedule").unwrap_or(&Value::Null);
    let mut out = format!(
        "{} ({} sessions, average relevance {})\n",
        s.pointer("/summary/message").and_then(Value::as_str).unwrap_or("Personalized schedule"),
        num(s, "total_sessions"),
        num(s, "average_relevance_score")
    );
    if let Some(days) = s.get("schedule").and_then(Value::as_object) {
        for (day, list) in days {
            let _ = writeln!(out, "{day}:");
            for session in list.as_array().into_iter().flatten() {
                out.push_str(&session_line(session));
            }
        }
    }
    out
}

fn join_list(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

fn facets(v: &Value) -> String {
    format!(
        "{} sessions in the catalog\nDays: {}\nTypes: {}\nLevels: {}\nVenues: {}\n",
        num(v, "total_sessions"),
        join_list(v, "days"),
        join_list(v, "types"),
        join_list(v, "levels"),
        join_list(v, "venues")
    )
}

fn docs(v: &Value) -> String {
    let mut out = String::new();
    for doc in v.get("results").and_then(Value::as_array).into_iter().flatten() {
        let _ = writeln!(out, "- **{}**: {} ({})", text(doc, "title"), text(doc, "summary"), text(doc, "url"));
    }
    out
}

fn weather(v: &Value) -> String {
    let mut out = format!(
        "{}: {}°F, {}, humidity {}%, wind {} mph\n",
        text(v, "location"),
        text(v, "temperature"),
        text(v, "condition"),
        text(v, "humidity"),
        text(v, "windSpeed")
    );
    for day in v.get("forecast").and_then(Value::as_array).into_iter().flatten() {
        let _ = writeln!(
            out,
            "- {}: {}°/{}° {}",
            text(day, "day"),
            text(day, "high"),
            text(day, "low"),
            text(day, "condition")
        );
    }
    out
}

fn stock(v: &Value) -> String {
    format!(
        "{}: ${} ({} / {}%), market cap {}, market {}\n",
        text(v, "symbol"),
        text(v, "price"),
        text(v, "change"),
        text(v, "changePercent"),
        text(v, "marketCap"),
        text(v, "marketStatus")
    )
}

fn flights(v: &Value) -> String {
    let mut out = format!("Flights {} → {} on {}:\n", text(v, "origin"), text(v, "destination"), text(v, "date"));
    for f in v.get("flights").and_then(Value::as_array).into_iter().flatten() {
        let _ = writeln!(
            out,
            "- {} {}: {} → {} ({}, {}) ${}",
            text(f, "airline"),
            text(f, "flightNumber"),
            text(f, "departure"),
            text(f, "arrival"),
            text(f, "duration"),
            text(f, "stops"),
            text(f, "price")
        );
    }
    out
}

fn generic(v: &Value) -> String {
    let s = serde_json::to_string_pretty(v).unwrap_or_default();
    if s.chars().count() > 800 {
        format!("{}...\n", s.chars().take(800).collect::<String>())
    } else {
        format!("{s}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(tool: &str, strand: Option<Strand>, result: Result<Value, &str>) -> InvocationOutcome {
        let (result, error) = match result {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e.to_string())),
        };
        InvocationOutcome {
            tool: tool.to_string(),
            strand,
            parameters: json!({}),
            result,
            error,
            reasoning: String::new(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_section_per_strand_and_other() {
        let text = render(&[
            outcome("get_weather", Some(Strand::LiveData), Ok(json!({"location": "Austin", "temperature": 90, "simulated": true}))),
            outcome("search_sessions", Some(Strand::Conference), Ok(json!({"found": 1, "sessions": [{"title": "Agents 101"}]}))),
            outcome("teleport", None, Err("Unknown tool: teleport")),
        ]);
        let conf = text.find("**Conference Planning:**").unwrap();
        let live = text.find("**Live Data Services:**").unwrap();
        let other = text.find("**Other:**").unwrap();
        assert!(conf < live && live < other);
        assert!(text.contains("Agents 101"));
        assert!(text.contains("Austin: 90°F"));
        assert!(text.contains("_(simulated data)_"));
        assert!(text.contains("Error: Unknown tool: teleport"));
        assert!(!text.contains("AWS Documentation"));
    }

    #[test]
    fn test_empty_success_is_no_data() {
        let text = render(&[outcome(
            "search_sessions",
            Some(Strand::Conference),
            Ok(json!({"found": 0, "sessions": []})),
        )]);
        assert!(text.contains(NO_DATA));
    }

    #[test]
    fn test_help_text_without_outcomes() {
        let text = render(&[]);
        assert_eq!(text, HELP_TEXT);
        assert!(text.contains("Weather in Las Vegas"));
    }
}
