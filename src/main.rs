use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chat::ChatGateway;
use serde_json::{json, Value};
use shuttle_runtime::SecretStore;
use std::sync::Arc;
use tools::weather::WeatherClient;
use tools::Toolbox;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

mod chat;
mod config;
mod database;
mod error;
mod mcp;
mod query;
mod registries;
mod tools;

/// Shared by every route; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub tools: Arc<Toolbox>,
    /// `None` when chat is not configured.
    pub chat: Option<Arc<dyn ChatGateway>>,
}

#[shuttle_runtime::main]
async fn main(#[shuttle_runtime::Secrets] secrets: SecretStore) -> shuttle_axum::ShuttleAxum {
    let config = config::Config::from_secrets(&secrets)
        .map_err(|e| shuttle_runtime::Error::Custom(e.into()))?;

    let source = Arc::new(database::PgRowSource::new(config.database_url.clone()));
    let tools = Arc::new(Toolbox::new(source, WeatherClient::new(config.weather.clone())));

    let chat = match &config.chat {
        Some(chat_config) => {
            let gateway = chat::build_gateway(chat_config, tools.clone());
            if let Err(e) = gateway.connect().await {
                warn!("Chat gateway is not reachable yet: {}", e);
            }
            Some(gateway)
        }
        None => None,
    };

    info!("Serving {} tools", registries::TOOL_REGISTRY.len());
    Ok(router(AppState { tools, chat }).into())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // MCP protocol endpoint
        .route("/mcp", post(mcp::mcp_handler))
        .route("/health", get(health))
        // Chat front-end
        .route("/chat", post(chat::handlers::chat_handler))
        .route("/chat/models", get(chat::handlers::models_handler))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.tools.source().ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "error": e.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeatherConfig;
    use crate::error::ToolError;
    use crate::query::fixture::{row, text, FixtureSource};
    use crate::query::Cell;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    pub(crate) fn fixture_toolbox() -> Arc<Toolbox> {
        let source = FixtureSource::new(vec![row(&[
            ("season_year", Cell::Int(1995)),
            ("team_code", text("ATL")),
            ("league", text("N")),
            ("team_location", text("Atlanta")),
            ("team_name", text("Braves")),
        ])]);
        Arc::new(Toolbox::new(
            Arc::new(source),
            WeatherClient::new(WeatherConfig::default()),
        ))
    }

    fn app(tools: Arc<Toolbox>) -> Router {
        router(AppState { tools, chat: None })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app(fixture_toolbox())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn health_reports_unreachable_store() {
        let source =
            FixtureSource::failing(|| ToolError::UpstreamData("connection refused".into()));
        let tools = Arc::new(Toolbox::new(
            Arc::new(source),
            WeatherClient::new(WeatherConfig::default()),
        ));
        let response = app(tools)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn mcp_round_trip() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "find_mlb_baseball_teams",
                "arguments": {"year": 1995, "league": "national"}
            }
        });
        let response = app(fixture_toolbox())
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], 1);
        let text = json["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"Team Code\": \"ATL\""));
    }

    #[tokio::test]
    async fn chat_without_backend_is_unavailable() {
        let response = app(fixture_toolbox())
            .oneshot(Request::get("/chat/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
