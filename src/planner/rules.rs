//! 关键词兜底规则
//!
//! 分类器不可用时使用。全部按词边界匹配（"ai" 不会命中 "available"），结果确定。

use regex::Regex;
use serde_json::json;

use crate::planner::PlannedInvocation;

const DOC_TERMS: &[&str] = &["bedrock", "aws", "lambda", "documentation", "docs"];
const CONFERENCE_TERMS: &[&str] = &["session", "sessions", "reinvent", "re:invent", "conference", "agenda"];
const SCHEDULE_TERMS: &[&str] = &["schedule", "create", "personalized", "personalised", "plan my"];
const RECOMMEND_TERMS: &[&str] = &["recommend", "recommendation", "recommendations", "suggest", "suggestions"];
const WEATHER_TERMS: &[&str] = &["weather", "forecast"];
const STOCK_TERMS: &[&str] = &["stock", "stocks", "share price", "ticker"];
const FLIGHT_TERMS: &[&str] = &["flight", "flights"];

/// 常见全大写缩写，不当作股票代码
const NOT_TICKERS: &[&str] = &[
    "I", "A", "AI", "ML", "API", "AWS", "CEO", "CTO", "CFO", "US", "USA", "IT", "PM", "QA", "FAQ", "ETF", "IPO",
    "USD", "EU", "UK", "GPU", "CPU", "LLM", "SQL",
];

/// 短语 → 规范角色，按顺序匹配
const ROLE_TABLE: &[(&[&str], &str)] = &[
    (&["product manager", "product managers", "pm"], "product manager"),
    (&["developer", "developers", "engineer", "engineers", "programmer"], "developer"),
    (&["architect", "architects", "solutions architect"], "architect"),
    (&["data scientist", "data scientists", "ml engineer"], "data scientist"),
    (&["devops", "sre"], "devops"),
    (&["security engineer", "security"], "security"),
    (&["executive", "executives", "cto", "ceo", "manager", "leader"], "executive"),
];

/// 短语 → 规范主题，全部命中的都收集
const TOPIC_TABLE: &[(&[&str], &str)] = &[
    (&["agent", "agents", "agentic"], "agents"),
    (&["ai", "artificial intelligence", "genai", "generative ai"], "ai"),
    (&["machine learning", "ml"], "machine learning"),
    (&["bedrock"], "bedrock"),
    (&["lambda"], "lambda"),
    (&["security"], "security"),
    (&["data", "analytics"], "data"),
    (&["leadership"], "leadership"),
    (&["serverless"], "serverless"),
    (&["cloud"], "cloud"),
];

pub const DEFAULT_ROLE: &str = "attendee";
pub const DEFAULT_TOPIC: &str = "AI";
pub const DEFAULT_LOCATION: &str = "Las Vegas";
pub const DEFAULT_SYMBOL: &str = "AMZN";
pub const DEFAULT_ORIGIN: &str = "NYC";

/// 词边界匹配器；编译失败时永不命中
struct Terms(Option<Regex>);

impl Terms {
    fn new(terms: &[&str]) -> Self {
        let alternation = terms
            .iter()
            .map(|t| regex::escape(t).replace(' ', r"\s+"))
            .collect::<Vec<_>>()
            .join("|");
        Self(compile(&format!(r"(?i)(?:^|\W)(?:{alternation})(?:$|\W)")))
    }

    fn hit(&self, text: &str) -> bool {
        self.0.as_ref().map(|r| r.is_match(text)).unwrap_or(false)
    }
}

fn compile(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| tracing::error!(pattern, error = %e, "invalid rule pattern"))
        .ok()
}

pub struct FallbackRules {
    docs: Terms,
    conference: Terms,
    schedule: Terms,
    recommend: Terms,
    weather: Terms,
    stock: Terms,
    flight: Terms,
    roles: Vec<(Terms, &'static str)>,
    topics: Vec<(Terms, &'static str)>,
    weather_place: Option<Regex>,
    capitalized: Option<Regex>,
    ticker: Option<Regex>,
    origin: Option<Regex>,
}

impl Default for FallbackRules {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackRules {
    pub fn new() -> Self {
        Self {
            docs: Terms::new(DOC_TERMS),
            conference: Terms::new(CONFERENCE_TERMS),
            schedule: Terms::new(SCHEDULE_TERMS),
            recommend: Terms::new(RECOMMEND_TERMS),
            weather: Terms::new(WEATHER_TERMS),
            stock: Terms::new(STOCK_TERMS),
            flight: Terms::new(FLIGHT_TERMS),
            roles: ROLE_TABLE.iter().map(|(p, r)| (Terms::new(p), *r)).collect(),
            topics: TOPIC_TABLE.iter().map(|(p, t)| (Terms::new(p), *t)).collect(),
            weather_place: compile(r"(?i)\b(?:weather|forecast)\s+(?:in|for|at)\s+([^?!.,;]+)"),
            capitalized: compile(r"^\s*([A-Z][\w'-]*(?:\s+[A-Z][\w'-]*)*)"),
            ticker: compile(r"\b([A-Z]{1,5})\b"),
            origin: compile(r"(?i)\bfrom\s+([A-Za-z]+)"),
        }
    }

    /// 第一个命中的规范角色
    pub fn role(&self, query: &str) -> Option<&'static str> {
        self.roles.iter().find(|(t, _)| t.hit(query)).map(|(_, r)| *r)
    }

    /// 全部命中的规范主题（表顺序）
    pub fn topics(&self, query: &str) -> Vec<&'static str> {
        self.topics
            .iter()
            .filter(|(t, _)| t.hit(query))
            .map(|(_, topic)| *topic)
            .collect()
    }

    fn topics_or_default(&self, query: &str) -> Vec<String> {
        let topics = self.topics(query);
        if topics.is_empty() {
            vec![DEFAULT_TOPIC.to_string()]
        } else {
            topics.into_iter().map(str::to_string).collect()
        }
    }

    /// "weather in/for X"：X 中首个大写短语，否则 X 原文，否则默认城市
    pub fn location(&self, query: &str) -> String {
        let Some(tail) = self
            .weather_place
            .as_ref()
            .and_then(|r| r.captures(query))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|t| !t.is_empty())
        else {
            return DEFAULT_LOCATION.to_string();
        };
        self.capitalized
            .as_ref()
            .and_then(|r| r.captures(tail))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| {
                let words: Vec<&str> = tail
                    .split_whitespace()
                    .take_while(|w| !matches!(w.to_lowercase().as_str(), "today" | "tomorrow" | "now" | "this" | "next"))
                    .collect();
                if words.is_empty() {
                    DEFAULT_LOCATION.to_string()
                } else {
                    words.join(" ")
                }
            })
    }

    /// 首个 1-5 位全大写词（排除常见缩写）
    pub fn symbol(&self, query: &str) -> String {
        self.ticker
            .as_ref()
            .and_then(|r| {
                r.captures_iter(query)
                    .filter_map(|c| c.get(1).map(|m| m.as_str()))
                    .find(|s| !NOT_TICKERS.contains(s))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string())
    }

    /// "from X" 中的 X，大写
    pub fn origin(&self, query: &str) -> String {
        self.origin
            .as_ref()
            .and_then(|r| r.captures(query))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string())
    }

    /// 按关键词生成调用计划；可能为空
    pub fn plan(&self, query: &str) -> Vec<PlannedInvocation> {
        let mut calls = Vec::new();

        if self.docs.hit(query) {
            calls.push(PlannedInvocation::new(
                "search_aws_docs",
                json!({"query": query.trim()}),
                "documentation",
                "AWS/technical query detected",
            ));
        }

        if self.conference.hit(query) {
            let role = self.role(query);
            if self.schedule.hit(query) && role.is_some() {
                calls.push(PlannedInvocation::new(
                    "create_personalized_schedule",
                    json!({
                        "role": role.unwrap_or(DEFAULT_ROLE),
                        "learning_topics": self.topics_or_default(query),
                    }),
                    "conference",
                    "Personalized schedule request detected",
                ));
            } else if self.recommend.hit(query) {
                calls.push(PlannedInvocation::new(
                    "recommend_sessions",
                    json!({
                        "interests": self.topics_or_default(query),
                        "role": role.unwrap_or(DEFAULT_ROLE),
                    }),
                    "conference",
                    "Session recommendation request detected",
                ));
            } else {
                let topic = self.topics(query).first().copied().unwrap_or_default();
                calls.push(PlannedInvocation::new(
                    "search_sessions",
                    json!({"query": topic}),
                    "conference",
                    "Conference query detected",
                ));
            }
        }

        if self.weather.hit(query) {
            calls.push(PlannedInvocation::new(
                "get_weather",
                json!({"location": self.location(query)}),
                "liveData",
                "Weather query detected",
            ));
        }

        if self.stock.hit(query) {
            calls.push(PlannedInvocation::new(
                "get_stock_price",
                json!({"symbol": self.symbol(query)}),
                "liveData",
                "Stock query detected",
            ));
        }

        if self.flight.hit(query) {
            calls.push(PlannedInvocation::new(
                "search_flights",
                json!({"origin": self.origin(query)}),
                "liveData",
                "Flight query detected",
            ));
        }

        calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(query: &str) -> Vec<String> {
        FallbackRules::new().plan(query).into_iter().map(|c| c.tool).collect()
    }

    #[test]
    fn test_word_boundaries() {
        let rules = FallbackRules::new();
        assert!(rules.topics("sessions available today").is_empty());
        assert_eq!(rules.topics("AI and ML sessions"), vec!["ai", "machine learning"]);
        assert_eq!(rules.role("tips for a PM"), Some("product manager"));
        assert_eq!(rules.role("an impmortal"), None);
        assert!(tools("awesome lambdas").is_empty());
    }

    #[test]
    fn test_recommend_for_developer() {
        let calls = FallbackRules::new().plan("Recommend sessions for a developer interested in AI");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool, "recommend_sessions");
        assert_eq!(calls[0].parameters, json!({"interests": ["ai"], "role": "developer"}));
    }

    #[test]
    fn test_schedule_needs_role() {
        let calls = FallbackRules::new().plan("Create a personalized re:Invent schedule for a product manager interested in agents");
        assert_eq!(calls[0].tool, "create_personalized_schedule");
        assert_eq!(calls[0].parameters["role"], "product manager");
        assert_eq!(calls[0].parameters["learning_topics"], json!(["agents"]));

        assert_eq!(tools("create my conference schedule"), vec!["search_sessions"]);
    }

    #[test]
    fn test_search_query_is_first_topic() {
        let calls = FallbackRules::new().plan("Show me security sessions");
        assert_eq!(calls[0].parameters, json!({"query": "security"}));
        let calls = FallbackRules::new().plan("what sessions are there?");
        assert_eq!(calls[0].parameters, json!({"query": ""}));
    }

    #[test]
    fn test_weather_location() {
        let rules = FallbackRules::new();
        assert_eq!(rules.location("weather in Austin"), "Austin");
        assert_eq!(rules.location("What's the weather in Las Vegas today?"), "Las Vegas");
        assert_eq!(rules.location("weather for denver tomorrow"), "denver");
        assert_eq!(rules.location("how is the weather"), DEFAULT_LOCATION);
    }

    #[test]
    fn test_multi_strand_plan() {
        assert_eq!(
            tools("How do I use Bedrock agents, and what's the weather in Las Vegas? Also NVDA stock and flights from sfo"),
            vec!["search_aws_docs", "get_weather", "get_stock_price", "search_flights"]
        );
        let rules = FallbackRules::new();
        assert_eq!(rules.symbol("How is NVDA stock doing"), "NVDA");
        assert_eq!(rules.symbol("I want a stock quote"), DEFAULT_SYMBOL);
        assert_eq!(rules.origin("flights from sfo"), "SFO");
        assert_eq!(rules.origin("any flights?"), DEFAULT_ORIGIN);
    }

    #[test]
    fn test_acronyms_are_not_tickers() {
        let rules = FallbackRules::new();
        assert_eq!(rules.symbol("AI stock news"), DEFAULT_SYMBOL);
        assert_eq!(rules.symbol("AWS CEO comments on MSFT stock"), "MSFT");
        let plan = rules.plan("How are AI stocks doing?");
        let stock = plan.iter().find(|p| p.tool == "get_stock_price").unwrap();
        assert_eq!(stock.parameters, json!({"symbol": DEFAULT_SYMBOL}));
    }
}
