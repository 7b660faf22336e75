//! 能力注册表、三组能力实现与并发执行器

pub mod conference;
pub mod docs;
pub mod executor;
pub mod live;
pub mod params;
pub mod registry;
pub mod schema;

pub use conference::{register_conference, session_json, ConferenceContext};
pub use docs::{McpStdioClient, SearchAwsDocs};
pub use executor::{ConcurrentExecutor, InvocationOutcome};
pub use live::{
    register_live, FlightProvider, GetStockPrice, GetWeather, HttpFlights, HttpStock, HttpWeather,
    SearchFlights, StockProvider, WeatherProvider, SIMULATED_SOURCE,
};
pub use registry::{
    Capability, CapabilityDescriptor, CapabilityError, CapabilityRegistry, ParamKind, ParamSpec, Strand,
};
pub use schema::invocation_plan_schema_json;
