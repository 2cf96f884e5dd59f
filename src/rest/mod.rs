//! REST API for the tempo workflow engine.
//!
//! Provides HTTP endpoints for starting, driving, and inspecting workflow
//! instances, plus the read-only template catalog. The engine is the source
//! of truth; these handlers only translate.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::ApiState;

/// Default port for the REST API server
pub const DEFAULT_PORT: u16 = 7110;

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/status", get(routes::health::status))
        // Template endpoints
        .route("/api/v1/templates", get(routes::templates::list))
        .route("/api/v1/templates/:id", get(routes::templates::get_one))
        // Workflow endpoints
        .route("/api/v1/workflows", post(routes::workflows::start))
        .route("/api/v1/workflows", get(routes::workflows::list))
        .route("/api/v1/workflows/:id", get(routes::workflows::get_one))
        .route("/api/v1/workflows/:id/pause", post(routes::workflows::pause))
        .route(
            "/api/v1/workflows/:id/resume",
            post(routes::workflows::resume),
        )
        .route(
            "/api/v1/workflows/:id/complete-step",
            post(routes::workflows::complete_step),
        )
        .route(
            "/api/v1/workflows/:id/skip-step",
            post(routes::workflows::skip_step),
        )
        .route(
            "/api/v1/workflows/:id/cancel",
            post(routes::workflows::cancel),
        )
        .merge(SwaggerUi::new("/api/docs").url("/api/v1/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server
pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("REST API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::WorkflowEngine;
    use crate::store::Journal;
    use crate::templates::TemplateRegistry;
    use tempfile::TempDir;

    #[test]
    fn test_build_router() {
        let temp = TempDir::new().unwrap();
        let mut registry = TemplateRegistry::new();
        registry.load_builtins();
        let journal = Journal::open(temp.path().join("journal")).unwrap();
        let engine = WorkflowEngine::new(registry, journal);
        let state = ApiState::with_engine(engine, Config::default());
        let _router = build_router(state);
        // Router builds without panicking
    }
}
