//! axum handlers for mock dispatch and the admin surface

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use prometheus::Gauge;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::adapters::crud_handler::{envelope, CrudHandler, HandlerOutput};
use crate::adapters::metrics_handler::MetricsCollector;
use crate::adapters::routes::{RouteOptions, RouteTable};
use crate::adapters::scenario::{failure_body, ScenarioPolicy};
use crate::adapters::state_manager::ResourceStore;
use crate::adapters::synthesizer::{GenerateOptions, Synthesizer};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::schema::SchemaDocument;
use crate::domain::{HttpMethod, RequestView};

/// Route table swapped wholesale on schema reload
pub type SharedRoutes = Arc<RwLock<Arc<RouteTable>>>;

#[derive(Clone)]
pub struct AppState {
    pub routes: SharedRoutes,
    pub store: ResourceStore,
    pub crud: Arc<CrudHandler>,
    pub synthesizer: Arc<Synthesizer>,
    pub scenario: Arc<ScenarioPolicy>,
    pub metrics: Arc<MetricsCollector>,
    pub route_options: RouteOptions,
    pub strict: bool,
}

impl AppState {
    pub fn new(
        table: RouteTable,
        synthesizer: Arc<Synthesizer>,
        scenario: ScenarioPolicy,
        route_options: RouteOptions,
        strict: bool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            routes: Arc::new(RwLock::new(Arc::new(table))),
            store: ResourceStore::new(),
            crud: Arc::new(CrudHandler::new(synthesizer.clone(), strict)),
            synthesizer,
            scenario: Arc::new(scenario),
            metrics: Arc::new(MetricsCollector::new()?),
            route_options,
            strict,
        })
    }

    pub async fn current_routes(&self) -> Arc<RouteTable> {
        self.routes.read().await.clone()
    }

    fn build_table(&self, raw: Value) -> EngineResult<RouteTable> {
        RouteTable::from_document(SchemaDocument::parse(raw)?, &self.route_options)
    }

    fn after_reload(&self, table: &RouteTable) {
        if let Some(cache) = self.synthesizer.cache() {
            cache.clear();
        }
        info!(routes = table.routes().len(), "schema reloaded");
    }

    /// Rebuild the route table from a new document. On error the previous
    /// table stays in place.
    pub async fn reload(&self, raw: Value) -> EngineResult<()> {
        let table = self.build_table(raw)?;
        self.after_reload(&table);
        *self.routes.write().await = Arc::new(table);
        Ok(())
    }

    /// [`AppState::reload`] for callers outside the runtime, such as the file
    /// watcher thread
    pub fn reload_blocking(&self, raw: Value) -> EngineResult<()> {
        let table = self.build_table(raw)?;
        self.after_reload(&table);
        *self.routes.blocking_write() = Arc::new(table);
        Ok(())
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// `{success:false, error, timestamp}` with the error's status
pub fn error_response(err: &EngineError) -> Response {
    error_with_status(err.status_code(), err.to_string())
}

fn error_with_status(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": message,
            "timestamp": timestamp(),
        })),
    )
        .into_response()
}

fn render(output: HandlerOutput) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in &output.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid response header"),
        }
    }
    (output.status, headers, Json(output.body)).into_response()
}

fn parse_body(body: &Bytes) -> EngineResult<Option<Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| EngineError::InvalidInput(format!("request body is not valid JSON: {}", e)))
}

// ============================================================================
// Mock dispatch
// ============================================================================

/// Holds the in-flight gauge up until dropped, including when the request
/// future is cancelled mid-flight
struct InFlight<'a>(&'a Gauge);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Fallback handler serving every route in the current table
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let in_flight = InFlight::enter(&state.metrics.requests_in_flight);

    let (label, response) = dispatch_inner(&state, &method, &uri, query, body).await;

    drop(in_flight);
    state
        .metrics
        .requests_total
        .with_label_values(&[method.as_str(), label.as_str(), response.status().as_str()])
        .inc();
    state
        .metrics
        .request_duration
        .with_label_values(&[method.as_str(), label.as_str()])
        .observe(start.elapsed().as_secs_f64());
    response
}

async fn dispatch_inner(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    query: HashMap<String, String>,
    body: Bytes,
) -> (String, Response) {
    let unmatched = "unmatched".to_string();
    let path = uri.path();

    let table = state.current_routes().await;
    let Some(http_method) = HttpMethod::from_http(method) else {
        let err = EngineError::UnsupportedMethod(method.to_string());
        return (unmatched, error_response(&err));
    };

    let Some((route, params)) = table.find(http_method, path) else {
        let response = if table.path_exists(path) {
            error_with_status(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("{} is not bound for {}", http_method, path),
            )
        } else {
            error_with_status(
                StatusCode::NOT_FOUND,
                format!("No route for {} {}", http_method, path),
            )
        };
        return (unmatched, response);
    };
    let label = route.path.as_str().to_string();

    if let Some(status) = state.scenario.before_handler().await {
        state
            .metrics
            .injected_errors
            .with_label_values(&[status.to_string().as_str()])
            .inc();
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (label, (code, Json(failure_body(status))).into_response());
    }

    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(err) => return (label, error_response(&err)),
    };
    let request = RequestView {
        method: http_method,
        path: path.to_string(),
        params,
        query,
        body,
    };

    let response = match state.crud.respond(&table, route, &request, &state.store).await {
        Ok(output) => render(output),
        Err(err) => {
            warn!(error = %err, path, "mock route failed");
            error_response(&err)
        }
    };
    (label, response)
}

// ============================================================================
// Admin surface
// ============================================================================

pub async fn admin_state(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;
    let total = snapshot.len();
    Json(envelope("Resource state", Value::Object(snapshot), Some(total)))
}

pub async fn admin_reset_all(State(state): State<AppState>) -> impl IntoResponse {
    state.store.reset_all().await;
    info!("all resource state cleared");
    Json(envelope("State cleared", Value::Null, None))
}

pub async fn admin_reset_resource(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> impl IntoResponse {
    let existed = state.store.reset(&resource).await;
    Json(envelope(
        &format!("Resource '{}' cleared", resource),
        json!({ "resource": resource, "existed": existed }),
        None,
    ))
}

pub async fn admin_routes(State(state): State<AppState>) -> impl IntoResponse {
    let table = state.current_routes().await;
    let routes = table.list();
    let total = routes.len();
    Json(envelope("Route table", json!(routes), Some(total)))
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub schema: Value,
    pub strict: Option<bool>,
    pub hint: Option<String>,
}

pub async fn admin_generate(State(state): State<AppState>, body: Bytes) -> Response {
    let request: GenerateRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(&EngineError::InvalidInput(format!(
                "expected {{schema, strict?, hint?}}: {}",
                e
            )))
        }
    };

    let mut options = GenerateOptions::default()
        .strict(request.strict.unwrap_or(state.strict))
        .cached();
    options.hint = request.hint;

    match state.synthesizer.generate(&request.schema, &options) {
        Ok(value) => Json(envelope("Value generated", value, None)).into_response(),
        Err(err) => {
            error!(error = %err, "generate request failed");
            error_response(&err)
        }
    }
}
