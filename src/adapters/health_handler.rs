use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::adapters::http_handler::SharedRoutes;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub schema: String,
    pub routes: usize,
}

pub struct HealthHandler {
    routes: SharedRoutes,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(routes: SharedRoutes) -> Self {
        Self {
            routes,
            start_time: std::time::Instant::now(),
        }
    }

    /// Basic health check - returns 200 if server is running
    pub async fn health(&self) -> impl IntoResponse {
        let uptime = self.start_time.elapsed().as_secs();
        let routes = self.routes.read().await.routes().len();
        let status = HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            checks: HealthChecks {
                schema: "ok".to_string(),
                routes,
            },
        };

        (StatusCode::OK, Json(status))
    }

    /// Readiness check - the route table has at least one binding
    pub async fn ready(&self) -> impl IntoResponse {
        let routes = self.routes.read().await.routes().len();

        if routes > 0 {
            (StatusCode::OK, Json(serde_json::json!({
                "status": "ready",
                "message": "Server is ready to accept requests",
                "routes": routes
            })))
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({
                "status": "not_ready",
                "message": "Schema declares no routes"
            })))
        }
    }

    /// Liveness check - returns 200 if server is alive
    pub async fn live(&self) -> impl IntoResponse {
        (StatusCode::OK, Json(serde_json::json!({
            "status": "alive",
            "message": "Server is alive"
        })))
    }
}
