//! Strand HTTP 入口
//!
//! 启动: cargo run --bin strand-web --features web
//! 端口: STRAND_WEB_PORT（默认 8080）

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use strand::{load_config, observability, Agent, AgentBuilder, AgentResponse};

const DEFAULT_PORT: u16 = 8080;

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

async fn api_chat(
    State(agent): State<Arc<Agent>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<AgentResponse>, (StatusCode, String)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }
    Ok(Json(agent.handle(message).await))
}

async fn api_database_info(
    State(agent): State<Arc<Agent>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    agent.try_catalog_info().map(Json).map_err(|e| {
        tracing::error!(error = %e, "database info failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        )
    })
}

async fn api_health(State(agent): State<Arc<Agent>>) -> Json<Value> {
    Json(agent.health())
}

fn router(agent: Arc<Agent>) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/health", get(api_health))
        .route("/api/database/info", get(api_database_info))
        .with_state(agent)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let agent = AgentBuilder::new(cfg).build().context("Failed to create agent")?;
    tracing::info!(agent = agent.name(), capabilities = agent.registry().len(), "web agent ready");

    let port = std::env::var("STRAND_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Strand web: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, router(Arc::new(agent))).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand::catalog::{CatalogError, Day, Event, EventRepository, InMemoryRepository, SearchFilter};
    use strand::AppConfig;

    struct OfflineRepository;

    impl EventRepository for OfflineRepository {
        fn search(&self, _filter: &SearchFilter) -> Result<Vec<Event>, CatalogError> {
            Err(CatalogError::Unavailable("locked".to_string()))
        }
        fn get_by_id(&self, _id: &str) -> Result<Option<Event>, CatalogError> {
            Err(CatalogError::Unavailable("locked".to_string()))
        }
        fn all(&self) -> Result<Vec<Event>, CatalogError> {
            Err(CatalogError::Unavailable("locked".to_string()))
        }
        fn distinct_days(&self) -> Result<Vec<Day>, CatalogError> {
            Err(CatalogError::Unavailable("locked".to_string()))
        }
    }

    fn agent(repo: Arc<dyn EventRepository>) -> Arc<Agent> {
        let agent = AgentBuilder::new(AppConfig::default())
            .with_repository(repo)
            .without_llm()
            .build()
            .unwrap();
        Arc::new(agent)
    }

    #[tokio::test]
    async fn test_database_info_failure_is_500() {
        let err = api_database_info(State(agent(Arc::new(OfflineRepository))))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
        let Json(body) = err.1;
        assert!(body["error"].as_str().unwrap().contains("locked"));
    }

    #[tokio::test]
    async fn test_database_info_ok() {
        let Json(info) = api_database_info(State(agent(Arc::new(InMemoryRepository::empty()))))
            .await
            .unwrap();
        assert_eq!(info["total_sessions"], 0);
    }

    #[tokio::test]
    async fn test_health_is_json() {
        let Json(health) = api_health(State(agent(Arc::new(InMemoryRepository::empty())))).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["database"], "connected");
        assert_eq!(health["sessionsCount"], 0);
        assert_eq!(health["llmAgent"], "rules");
        assert_eq!(health["servers"].as_array().map(Vec::len), Some(3));

        let Json(health) = api_health(State(agent(Arc::new(OfflineRepository)))).await;
        assert_eq!(health["database"], "error");
    }

    #[tokio::test]
    async fn test_blank_chat_message_rejected() {
        let req = ChatRequest { message: "   ".to_string() };
        let err = api_chat(State(agent(Arc::new(InMemoryRepository::empty()))), Json(req))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
