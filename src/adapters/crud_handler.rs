use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::adapters::routes::{CrudAction, ResourceDefinition, RouteConfig, RouteResponse, RouteTable};
use crate::adapters::state_manager::{id_key, ResourceStore};
use crate::adapters::synthesizer::{GenerateOptions, Synthesizer};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::RequestView;

/// Number of items a list request seeds into an empty collection
pub const SEED_COUNT: usize = 3;

/// What a handler hands back to the transport
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub status: StatusCode,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}

impl HandlerOutput {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            headers: Vec::new(),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Success envelope used by the conventional CRUD routes
pub fn envelope(message: &str, data: Value, total: Option<usize>) -> Value {
    let mut body = json!({
        "success": true,
        "message": message,
        "timestamp": now(),
        "data": data,
    });
    if let (Some(total), Some(obj)) = (total, body.as_object_mut()) {
        obj.insert("meta".to_string(), json!({ "total": total }));
    }
    body
}

/// Executes matched routes against the resource store
pub struct CrudHandler {
    synthesizer: Arc<Synthesizer>,
    strict: bool,
}

impl CrudHandler {
    pub fn new(synthesizer: Arc<Synthesizer>, strict: bool) -> Self {
        Self { synthesizer, strict }
    }

    pub fn synthesizer(&self) -> &Arc<Synthesizer> {
        &self.synthesizer
    }

    fn options(&self) -> GenerateOptions {
        GenerateOptions::default().strict(self.strict)
    }

    pub async fn respond(
        &self,
        table: &RouteTable,
        route: &RouteConfig,
        request: &RequestView,
        store: &ResourceStore,
    ) -> EngineResult<HandlerOutput> {
        if let Some(delay) = route.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut output = match &route.response {
            RouteResponse::Fixed(value) => HandlerOutput::ok(value.clone()),
            RouteResponse::Schema(node) => {
                HandlerOutput::ok(self.synthesizer.generate_node(node, table.root(), &self.options())?)
            }
            RouteResponse::Crud { resource, action } => {
                let definition = table.resource(resource).ok_or_else(|| {
                    EngineError::InvalidInput(format!("unknown resource '{}'", resource))
                })?;
                self.crud(table, definition, *action, request, store).await?
            }
        };

        if let Some(code) = route.status_code {
            output.status = StatusCode::from_u16(code).unwrap_or(output.status);
        }
        output.headers.extend(route.headers.iter().cloned());
        Ok(output)
    }

    async fn crud(
        &self,
        table: &RouteTable,
        definition: &ResourceDefinition,
        action: CrudAction,
        request: &RequestView,
        store: &ResourceStore,
    ) -> EngineResult<HandlerOutput> {
        let collection = store.collection(&definition.name).await;
        let mut state = collection.lock().await;
        debug!(resource = %definition.name, ?action, "crud request");

        match action {
            CrudAction::List => {
                if state.is_empty() {
                    for item in self.seed(table, definition)? {
                        state.append(item);
                    }
                }
                let items = state.items().to_vec();
                let total = items.len();
                Ok(HandlerOutput::ok(envelope(
                    &format!("Retrieved {} {}", total, definition.name),
                    Value::Array(items),
                    Some(total),
                )))
            }
            CrudAction::Get => {
                let id = path_id(request)?;
                let item = match state.find(id) {
                    Some(existing) => existing.clone(),
                    None => {
                        let item = self.synthesize_item(table, definition, Value::String(id.to_string()))?;
                        state.append(item.clone());
                        item
                    }
                };
                Ok(HandlerOutput::ok(envelope("Item retrieved", item, None)))
            }
            CrudAction::Create => {
                let body = object_body(request)?;
                let id = match body.get("id") {
                    Some(id) if !id.is_null() => id.clone(),
                    _ => Value::String(self.synthesizer.next_id()),
                };
                let mut item = self.synthesize_item(table, definition, id.clone())?;
                merge_into(&mut item, body);
                let stamp = Value::String(now());
                set_field(&mut item, "id", id);
                set_field(&mut item, "createdAt", stamp.clone());
                set_field(&mut item, "updatedAt", stamp);
                state.append(item.clone());

                Ok(HandlerOutput {
                    status: StatusCode::CREATED,
                    ..HandlerOutput::ok(envelope("Item created", item, None))
                })
            }
            CrudAction::Update => {
                let id = path_id(request)?;
                let body = object_body(request)?;
                let stamp = Value::String(now());

                let (mut item, existed) = match state.find(id) {
                    Some(existing) => (existing.clone(), true),
                    None => (
                        self.synthesize_item(table, definition, Value::String(id.to_string()))?,
                        false,
                    ),
                };
                let stored_id = item
                    .get("id")
                    .filter(|current| id_key(current) == id)
                    .cloned()
                    .unwrap_or_else(|| Value::String(id.to_string()));

                merge_into(&mut item, body);
                set_field(&mut item, "id", stored_id);
                if !existed {
                    set_field(&mut item, "createdAt", stamp.clone());
                }
                set_field(&mut item, "updatedAt", stamp);
                state.upsert(item.clone());

                Ok(HandlerOutput::ok(envelope("Item updated", item, None)))
            }
            CrudAction::Delete => {
                let id = path_id(request)?;
                let removed = state.remove(id);
                debug!(resource = %definition.name, id, removed, "delete");
                Ok(HandlerOutput::ok(envelope(
                    "Item deleted",
                    json!({ "id": id }),
                    None,
                )))
            }
        }
    }

    /// Items for an empty collection: the elements of one synthesized array
    /// when the resource schema is an array, otherwise a fixed number of items
    fn seed(&self, table: &RouteTable, definition: &ResourceDefinition) -> EngineResult<Vec<Value>> {
        if let Some(collection) = &definition.collection {
            let generated = self
                .synthesizer
                .generate_node(collection, table.root(), &self.options())?;
            let elements = match generated {
                Value::Array(elements) => elements,
                other => vec![other],
            };
            return Ok(elements
                .into_iter()
                .map(|element| {
                    let id = element
                        .get("id")
                        .filter(|id| !id.is_null())
                        .cloned()
                        .unwrap_or_else(|| Value::String(self.synthesizer.next_id()));
                    into_record(element, id)
                })
                .collect());
        }

        (0..SEED_COUNT)
            .map(|_| {
                let id = Value::String(self.synthesizer.next_id());
                self.synthesize_item(table, definition, id)
            })
            .collect()
    }

    /// A freshly synthesized object carrying `id`
    fn synthesize_item(
        &self,
        table: &RouteTable,
        definition: &ResourceDefinition,
        id: Value,
    ) -> EngineResult<Value> {
        let value = self
            .synthesizer
            .generate_node(&definition.item, table.root(), &self.options())?;
        Ok(into_record(value, id))
    }
}

/// Force `value` into a stored record. Non-object values are kept under `value`.
fn into_record(value: Value, id: Value) -> Value {
    let mut record = match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    record.insert("id".to_string(), id);
    Value::Object(record)
}

fn merge_into(item: &mut Value, overlay: Map<String, Value>) {
    if let Value::Object(base) = item {
        for (key, value) in overlay {
            base.insert(key, value);
        }
    }
}

fn set_field(item: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = item {
        map.insert(key.to_string(), value);
    }
}

fn path_id(request: &RequestView) -> EngineResult<&str> {
    request
        .param("id")
        .ok_or_else(|| EngineError::InvalidInput("missing `id` path parameter".to_string()))
}

/// The request body as an object; an absent body counts as `{}`
fn object_body(request: &RequestView) -> EngineResult<Map<String, Value>> {
    match &request.body {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(EngineError::InvalidInput(format!(
            "request body must be a JSON object, found {}",
            crate::domain::schema::json_kind(other)
        ))),
    }
}
