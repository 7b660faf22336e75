//! 实时数据分组：天气、股票、航班
//!
//! 每个能力先调用 HTTP 数据源，失败后才使用本地确定性模拟器；
//! 模拟结果带 `"simulated": true` 与 `"source": "Simulated Data"`。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::LiveSection;
use crate::tools::params;
use crate::tools::{Capability, CapabilityError, CapabilityRegistry, ParamKind, ParamSpec, Strand};

pub const SIMULATED_SOURCE: &str = "Simulated Data";
const DEFAULT_LOCATION: &str = "Las Vegas";

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn weather(&self, location: &str) -> Result<Value, CapabilityError>;
}

#[async_trait]
pub trait StockProvider: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Value, CapabilityError>;
}

#[async_trait]
pub trait FlightProvider: Send + Sync {
    async fn search(&self, origin: &str, destination: &str, date: &str) -> Result<Value, CapabilityError>;
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("curl/7.68.0")
        .build()
        .unwrap_or_default()
}

async fn get_json(req: reqwest::RequestBuilder) -> Result<Value, CapabilityError> {
    let resp = req
        .send()
        .await
        .map_err(|e| CapabilityError::Provider(format!("request failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(CapabilityError::Provider(format!("HTTP {}", resp.status())));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| CapabilityError::Provider(format!("malformed response: {e}")))
}

/// FNV-1a，模拟器的确定性种子
fn seed(text: &str) -> u64 {
    text.to_lowercase().bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------- 天气 ----------

/// wttr.in：`GET {base}/{location}?format=j1`
pub struct HttpWeather {
    client: Client,
    base_url: String,
}

impl HttpWeather {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn first_value(v: &Value, pointer: &str) -> Option<String> {
    v.pointer(pointer).and_then(Value::as_str).map(str::to_string)
}

fn number(v: &Value, pointer: &str) -> Value {
    match v.pointer(pointer) {
        Some(Value::String(s)) => s.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(s)),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

/// wttr.in j1 格式 → 统一天气结构
pub fn parse_wttr(location: &str, body: &Value) -> Result<Value, CapabilityError> {
    let current = body
        .pointer("/current_condition/0")
        .ok_or_else(|| CapabilityError::Provider("weather response has no current condition".to_string()))?;
    let area = match (
        first_value(body, "/nearest_area/0/areaName/0/value"),
        first_value(body, "/nearest_area/0/country/0/value"),
    ) {
        (Some(a), Some(c)) => format!("{a}, {c}"),
        (Some(a), None) => a,
        _ => location.to_string(),
    };
    let labels = ["Today", "Tomorrow", "Day 3"];
    let forecast: Vec<Value> = body
        .get("weather")
        .and_then(Value::as_array)
        .map(|days| {
            days.iter()
                .take(3)
                .zip(labels)
                .map(|(d, label)| {
                    json!({
                        "day": label,
                        "high": number(d, "/maxtempF"),
                        "low": number(d, "/mintempF"),
                        "condition": first_value(d, "/hourly/0/weatherDesc/0/value").unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(json!({
        "location": area,
        "temperature": number(current, "/temp_F"),
        "condition": first_value(current, "/weatherDesc/0/value").unwrap_or_default(),
        "humidity": number(current, "/humidity"),
        "windSpeed": number(current, "/windspeedMiles"),
        "forecast": forecast,
        "source": "wttr.in (Live)",
    }))
}

/// 地点作为单个路径段拼接（空格转 +，其余保留字符转义）
fn location_url(base: &str, location: &str) -> Result<reqwest::Url, CapabilityError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| CapabilityError::Provider(format!("invalid weather url {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| CapabilityError::Provider(format!("invalid weather url {base}")))?
        .pop_if_empty()
        .push(&location.trim().replace(' ', "+"));
    Ok(url)
}

#[async_trait]
impl WeatherProvider for HttpWeather {
    async fn weather(&self, location: &str) -> Result<Value, CapabilityError> {
        let url = location_url(&self.base_url, location)?;
        let body = get_json(self.client.get(url).query(&[("format", "j1")])).await?;
        parse_wttr(location, &body)
    }
}

struct WeatherProfile {
    base: i64,
    variance: i64,
    conditions: &'static [&'static str],
    humidity: i64,
    wind: i64,
}

static WEATHER_PROFILES: &[(&str, WeatherProfile)] = &[
    (
        "las vegas",
        WeatherProfile {
            base: 45,
            variance: 10,
            conditions: &["Partly Cloudy", "Cloudy", "Sunny", "Light Snow", "Overcast"],
            humidity: 72,
            wind: 15,
        },
    ),
    (
        "orlando",
        WeatherProfile {
            base: 78,
            variance: 8,
            conditions: &["Sunny", "Partly Cloudy", "Light Rain", "Thunderstorms", "Clear"],
            humidity: 65,
            wind: 8,
        },
    ),
    (
        "san francisco",
        WeatherProfile {
            base: 65,
            variance: 6,
            conditions: &["Foggy", "Partly Cloudy", "Sunny", "Overcast", "Drizzle"],
            humidity: 80,
            wind: 12,
        },
    ),
];

/// 模拟天气：已知城市使用各自的气候档案，其余城市使用拉斯维加斯档案
pub fn simulated_weather(location: &str) -> Value {
    let lower = location.to_lowercase();
    let profile = WEATHER_PROFILES
        .iter()
        .find(|(city, _)| lower.contains(city))
        .map(|(_, p)| p)
        .unwrap_or(&WEATHER_PROFILES[0].1);
    let h = seed(location);
    let span = (profile.variance * 2 + 1) as u64;
    let temp_at = |i: u64| profile.base - profile.variance + ((h >> (i * 8)) % span) as i64;
    let condition_at = |i: u64| profile.conditions[((h >> (i * 5)) % profile.conditions.len() as u64) as usize];

    let forecast: Vec<Value> = ["Today", "Tomorrow", "Day 3"]
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let t = temp_at(i as u64 + 1);
            json!({
                "day": label,
                "high": t + 5,
                "low": t - 8,
                "condition": condition_at(i as u64 + 1),
            })
        })
        .collect();

    json!({
        "location": location,
        "temperature": temp_at(0),
        "condition": condition_at(0),
        "humidity": profile.humidity,
        "windSpeed": profile.wind,
        "forecast": forecast,
        "source": SIMULATED_SOURCE,
        "simulated": true,
    })
}

// ---------- 股票 ----------

/// Yahoo Finance chart API：`GET {base}/{SYMBOL}`
pub struct HttpStock {
    client: Client,
    base_url: String,
}

impl HttpStock {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

pub fn format_market_cap(cap: f64) -> String {
    if cap >= 1e12 {
        format!("${:.2}T", cap / 1e12)
    } else if cap >= 1e9 {
        format!("${:.2}B", cap / 1e9)
    } else if cap >= 1e6 {
        format!("${:.2}M", cap / 1e6)
    } else {
        format!("${cap:.0}")
    }
}

/// chart.result[0].meta → 统一报价结构
pub fn parse_chart(symbol: &str, body: &Value) -> Result<Value, CapabilityError> {
    let meta = body
        .pointer("/chart/result/0/meta")
        .ok_or_else(|| CapabilityError::Provider(format!("no quote for {symbol}")))?;
    let price = meta
        .get("regularMarketPrice")
        .and_then(Value::as_f64)
        .ok_or_else(|| CapabilityError::Provider(format!("no price for {symbol}")))?;
    let previous = meta
        .get("previousClose")
        .or_else(|| meta.get("chartPreviousClose"))
        .and_then(Value::as_f64)
        .unwrap_or(price);
    let change = price - previous;
    let percent = if previous > 0.0 { change / previous * 100.0 } else { 0.0 };
    let open = meta.get("marketState").and_then(Value::as_str) == Some("REGULAR");

    Ok(json!({
        "symbol": symbol,
        "price": round2(price),
        "change": format!("{change:.2}"),
        "changePercent": format!("{percent:.2}"),
        "volume": meta.get("regularMarketVolume").cloned().unwrap_or(Value::Null),
        "marketCap": meta
            .get("marketCap")
            .and_then(Value::as_f64)
            .map(format_market_cap)
            .unwrap_or_else(|| "N/A".to_string()),
        "marketStatus": if open { "Open" } else { "Closed" },
        "dayHigh": meta.get("regularMarketDayHigh").cloned().unwrap_or(Value::Null),
        "dayLow": meta.get("regularMarketDayLow").cloned().unwrap_or(Value::Null),
        "source": "Yahoo Finance (Live)",
    }))
}

#[async_trait]
impl StockProvider for HttpStock {
    async fn quote(&self, symbol: &str) -> Result<Value, CapabilityError> {
        let url = format!("{}/{}", self.base_url, symbol);
        let body = get_json(self.client.get(url)).await?;
        parse_chart(symbol, &body)
    }
}

/// (代码, 基准价, 波动率, 行业, 市值/十亿美元)
const STOCK_PROFILES: &[(&str, f64, f64, &str, f64)] = &[
    ("AAPL", 175.0, 0.02, "Technology", 2800.0),
    ("GOOGL", 140.0, 0.025, "Technology", 1800.0),
    ("MSFT", 380.0, 0.018, "Technology", 2900.0),
    ("TSLA", 250.0, 0.04, "Automotive", 800.0),
    ("AMZN", 145.0, 0.022, "E-commerce", 1500.0),
    ("NVDA", 450.0, 0.035, "Semiconductors", 1100.0),
    ("META", 320.0, 0.028, "Social Media", 850.0),
];

pub fn simulated_quote(symbol: &str) -> Value {
    let (base, volatility, sector, cap_billions) = STOCK_PROFILES
        .iter()
        .find(|(s, ..)| *s == symbol)
        .map(|(_, b, v, sec, cap)| (*b, *v, *sec, *cap))
        .unwrap_or((100.0, 0.025, "Technology", 500.0));
    let h = seed(symbol);
    // [-1, 1] 之间的两个确定性扰动
    let jitter = |shift: u32| ((h >> shift) % 2001) as f64 / 1000.0 - 1.0;
    let price = round2(base * (1.0 + jitter(0) * volatility));
    let change = round2(price * volatility * jitter(16));
    let previous = price - change;
    let percent = if previous > 0.0 { change / previous * 100.0 } else { 0.0 };

    json!({
        "symbol": symbol,
        "price": price,
        "change": format!("{change:.2}"),
        "changePercent": format!("{percent:.2}"),
        "volume": 1_000_000 + (h >> 24) % 50_000_000,
        "marketCap": format_market_cap(cap_billions * 1e9),
        "marketStatus": "Closed",
        "sector": sector,
        "source": SIMULATED_SOURCE,
        "simulated": true,
    })
}

// ---------- 航班 ----------

/// 可配置的航班查询端点：`GET {url}?origin=&destination=&date=`，返回航班数组或 `{flights: [...]}`
pub struct HttpFlights {
    client: Client,
    url: String,
}

impl HttpFlights {
    pub fn new(url: &str, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl FlightProvider for HttpFlights {
    async fn search(&self, origin: &str, destination: &str, date: &str) -> Result<Value, CapabilityError> {
        let body = get_json(
            self.client
                .get(&self.url)
                .query(&[("origin", origin), ("destination", destination), ("date", date)]),
        )
        .await?;
        let flights = match body {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("flights") {
                Some(Value::Array(items)) => items,
                _ => return Err(CapabilityError::Provider("flight response has no flights".to_string())),
            },
            _ => return Err(CapabilityError::Provider("malformed flight response".to_string())),
        };
        Ok(json!({
            "origin": origin,
            "destination": destination,
            "date": date,
            "flights": flights,
            "source": "Flight Search (Live)",
        }))
    }
}

/// (航空公司, 航班号, 起飞, 到达, 时长, 价格, 经停)
type FlightRow = (&'static str, &'static str, &'static str, &'static str, &'static str, u32, &'static str);

const FLIGHT_ROUTES: &[(&str, &[FlightRow])] = &[
    (
        "NYC",
        &[
            ("United", "UA 1234", "7:30 AM", "9:15 AM", "2h 45m", 285, "Nonstop"),
            ("American", "AA 5678", "1:45 PM", "3:30 PM", "2h 45m", 312, "Nonstop"),
        ],
    ),
    (
        "LAX",
        &[
            ("United", "UA 9876", "6:00 AM", "12:15 PM", "4h 15m", 395, "Nonstop"),
            ("Southwest", "WN 5432", "10:30 AM", "4:45 PM", "4h 15m", 358, "Nonstop"),
        ],
    ),
    (
        "SFO",
        &[
            ("United", "UA 2468", "8:15 AM", "2:30 PM", "4h 15m", 425, "Nonstop"),
            ("American", "AA 1357", "3:20 PM", "9:35 PM", "4h 15m", 389, "Nonstop"),
        ],
    ),
    (
        "ATL",
        &[
            ("Delta", "DL 3691", "9:45 AM", "11:20 AM", "2h 35m", 275, "Nonstop"),
            ("United", "UA 7410", "4:10 PM", "5:45 PM", "2h 35m", 298, "Nonstop"),
        ],
    ),
];

/// 模拟航班：只认识少数出发地，未知出发地返回空列表
pub fn simulated_flights(origin: &str, destination: &str, date: &str) -> Value {
    let flights: Vec<Value> = FLIGHT_ROUTES
        .iter()
        .find(|(o, _)| *o == origin)
        .map(|(_, rows)| {
            rows.iter()
                .map(|(airline, number, dep, arr, duration, price, stops)| {
                    json!({
                        "airline": airline,
                        "flightNumber": number,
                        "departure": dep,
                        "arrival": arr,
                        "duration": duration,
                        "price": price,
                        "stops": stops,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    json!({
        "origin": origin,
        "destination": destination,
        "date": date,
        "flights": flights,
        "source": SIMULATED_SOURCE,
        "simulated": true,
    })
}

// ---------- 能力 ----------

/// 注册全部实时数据能力；enabled = false 时只用模拟器
pub fn register_live(registry: &mut CapabilityRegistry, cfg: &LiveSection) {
    let (weather, stock, flights): (
        Option<Arc<dyn WeatherProvider>>,
        Option<Arc<dyn StockProvider>>,
        Option<Arc<dyn FlightProvider>>,
    ) = if cfg.enabled {
        (
            Some(Arc::new(HttpWeather::new(&cfg.weather_url, cfg.timeout_secs)) as Arc<dyn WeatherProvider>),
            Some(Arc::new(HttpStock::new(&cfg.stock_url, cfg.timeout_secs)) as Arc<dyn StockProvider>),
            cfg.flights_url
                .as_deref()
                .map(|u| Arc::new(HttpFlights::new(u, cfg.timeout_secs)) as Arc<dyn FlightProvider>),
        )
    } else {
        (None, None, None)
    };
    registry.register(GetWeather { provider: weather });
    registry.register(GetStockPrice { provider: stock });
    registry.register(SearchFlights {
        provider: flights,
        destination: cfg.destination.clone(),
    });
}

pub struct GetWeather {
    pub provider: Option<Arc<dyn WeatherProvider>>,
}

const WEATHER_PARAMS: &[ParamSpec] =
    &[ParamSpec::optional("location", ParamKind::String, "city name (default Las Vegas)")];

#[async_trait]
impl Capability for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn strand(&self) -> Strand {
        Strand::LiveData
    }

    fn description(&self) -> &str {
        "Get current weather and a 3-day forecast for a location"
    }

    fn parameters(&self) -> &[ParamSpec] {
        WEATHER_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        let location = params::string_any(&p, &["location", "city"])
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        if let Some(provider) = &self.provider {
            match provider.weather(&location).await {
                Ok(v) => return Ok(v),
                Err(e) => tracing::warn!(location = %location, error = %e, "live weather failed, simulating"),
            }
        }
        Ok(simulated_weather(&location))
    }
}

pub struct GetStockPrice {
    pub provider: Option<Arc<dyn StockProvider>>,
}

const STOCK_PARAMS: &[ParamSpec] =
    &[ParamSpec::required("symbol", ParamKind::String, "ticker symbol, e.g. AMZN")];

#[async_trait]
impl Capability for GetStockPrice {
    fn name(&self) -> &str {
        "get_stock_price"
    }

    fn strand(&self) -> Strand {
        Strand::LiveData
    }

    fn description(&self) -> &str {
        "Get the latest stock quote for a ticker symbol"
    }

    fn parameters(&self) -> &[ParamSpec] {
        STOCK_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        let symbol = params::string(&p, "symbol")
            .map(|s| s.to_uppercase())
            .ok_or_else(|| CapabilityError::invalid(self.name(), "missing symbol"))?;
        if let Some(provider) = &self.provider {
            match provider.quote(&symbol).await {
                Ok(v) => return Ok(v),
                Err(e) => tracing::warn!(symbol = %symbol, error = %e, "live quote failed, simulating"),
            }
        }
        Ok(simulated_quote(&symbol))
    }
}

pub struct SearchFlights {
    pub provider: Option<Arc<dyn FlightProvider>>,
    pub destination: String,
}

const FLIGHT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("origin", ParamKind::String, "departure airport or city code, e.g. NYC"),
    ParamSpec::optional("destination", ParamKind::String, "arrival airport (default LAS)"),
    ParamSpec::optional("date", ParamKind::String, "travel date YYYY-MM-DD"),
];

#[async_trait]
impl Capability for SearchFlights {
    fn name(&self) -> &str {
        "search_flights"
    }

    fn strand(&self) -> Strand {
        Strand::LiveData
    }

    fn description(&self) -> &str {
        "Search flights to the conference city"
    }

    fn parameters(&self) -> &[ParamSpec] {
        FLIGHT_PARAMS
    }

    async fn invoke(&self, p: Value) -> Result<Value, CapabilityError> {
        let origin = params::string(&p, "origin")
            .map(|s| s.to_uppercase())
            .ok_or_else(|| CapabilityError::invalid(self.name(), "missing origin"))?;
        let destination = params::string(&p, "destination")
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| self.destination.clone());
        let date = params::string(&p, "date")
            .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
        if let Some(provider) = &self.provider {
            match provider.search(&origin, &destination, &date).await {
                Ok(v) => return Ok(v),
                Err(e) => tracing::warn!(origin = %origin, error = %e, "live flight search failed, simulating"),
            }
        }
        Ok(simulated_flights(&origin, &destination, &date))
    }
}
