//! # Schemock - schema-driven mock REST server
//!
//! Schemock turns a JSON-Schema-like document into plausible sample data and
//! serves it through a small stateful CRUD layer, so the same id keeps
//! returning the same object across requests.
//!
//! ## Features
//!
//! - **Synthesis**: `$ref`, `oneOf`/`anyOf`/`allOf`, formats and property-name heuristics
//! - **Stateful CRUD**: per-resource collections under `/api/<resource>`
//! - **Declarative routes**: `x-schemock-routes` in the schema root
//! - **Scenarios**: injected latency and failures
//! - **Metrics**: Prometheus metrics for monitoring
//! - **Live Reload**: the schema file is watched and routes rebuilt
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schemock::adapters::synthesizer::{GenerateOptions, Synthesizer};
//! use serde_json::json;
//!
//! let synthesizer = Synthesizer::seeded(7);
//! let value = synthesizer
//!     .generate(&json!({"type": "string", "format": "email"}), &GenerateOptions::default())
//!     .unwrap();
//! assert!(value.as_str().unwrap().contains('@'));
//! ```
//!
//! ## Architecture
//!
//! - **Domain**: the schema model, request view and error taxonomy
//! - **Adapters**: resolution, synthesis, caching, state, routing and HTTP handlers
//! - **Config**: layered settings, validation and the schema file watcher

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;

use crate::adapters::health_handler::HealthHandler;
use crate::adapters::http_handler::{self, AppState};
use crate::adapters::metrics_handler::MetricsHandler;
use crate::adapters::routes::RouteTable;
use crate::adapters::scenario::ScenarioPolicy;
use crate::adapters::synthesizer::Synthesizer;
use crate::config::Settings;
use crate::domain::schema::SchemaDocument;
use axum::{
    routing::{delete, get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Wire the engine pieces for one server instance from settings and a parsed
/// schema document
pub fn build_state(settings: &Settings, schema: Value) -> anyhow::Result<AppState> {
    let route_options = settings.route_options();
    let table = RouteTable::from_document(SchemaDocument::parse(schema)?, &route_options)?;

    let synthesizer = Arc::new(Synthesizer::from_settings(&settings.generator));
    let mut scenario = ScenarioPolicy::new(settings.scenario);
    if let Some(seed) = settings.generator.seed {
        scenario = scenario.with_seed(seed);
    }

    AppState::new(
        table,
        synthesizer,
        scenario,
        route_options,
        settings.schema.strict,
    )
}

/// Creates the Axum application router with all endpoints configured.
///
/// Health, metrics and admin routes are bound directly; everything else falls
/// through to the mock dispatcher, which consults the current route table and
/// the scenario policy.
pub fn create_app(state: AppState) -> Router {
    let health_handler = Arc::new(HealthHandler::new(state.routes.clone()));
    let metrics_handler = Arc::new(MetricsHandler::new(
        state.metrics.clone(),
        state.synthesizer.clone(),
    ));

    let router = Router::new()
        // Health check endpoints
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }))
        // Metrics endpoint
        .route("/metrics", get({
            let handler = metrics_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.metrics().await }
            }
        }))
        // Admin surface
        .route(
            "/_admin/state",
            get(http_handler::admin_state).delete(http_handler::admin_reset_all),
        )
        .route("/_admin/state/:resource", delete(http_handler::admin_reset_resource))
        .route("/_admin/routes", get(http_handler::admin_routes))
        .route("/_admin/generate", post(http_handler::admin_generate))
        // Mock routes from the schema
        .fallback(http_handler::dispatch)
        .with_state(state);

    router
        .layer(TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}
