use super::crud_handler::{CrudHandler, SEED_COUNT};
use super::routes::{RouteOptions, RouteTable};
use super::state_manager::ResourceStore;
use super::synthesizer::Synthesizer;
use crate::domain::error::EngineError;
use crate::domain::schema::SchemaDocument;
use crate::domain::{HttpMethod, RequestView};
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

fn user_schema() -> Value {
    json!({
        "title": "Users",
        "type": "object",
        "required": ["id", "name", "age"],
        "properties": {
            "id": {"type": "string", "format": "uuid"},
            "name": {"type": "string"},
            "age": {"type": "integer", "minimum": 0, "maximum": 120}
        }
    })
}

struct Fixture {
    table: RouteTable,
    handler: CrudHandler,
    store: ResourceStore,
}

impl Fixture {
    fn new(schema: Value) -> Self {
        let table = RouteTable::from_document(
            SchemaDocument::parse(schema).unwrap(),
            &RouteOptions::default(),
        )
        .unwrap();
        Self {
            table,
            handler: CrudHandler::new(Arc::new(Synthesizer::seeded(21)), false),
            store: ResourceStore::new(),
        }
    }

    async fn call(&self, method: HttpMethod, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (route, params) = self.table.find(method, path).expect("route should match");
        let mut request = RequestView::new(method, path);
        request.params = params;
        request.body = body;
        let output = self
            .handler
            .respond(&self.table, route, &request, &self.store)
            .await
            .unwrap();
        (output.status, output.body)
    }
}

#[tokio::test]
async fn test_list_seeds_once_then_persists() {
    let fx = Fixture::new(user_schema());

    let (status, first) = fx.call(HttpMethod::Get, "/api/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], json!(true));
    assert_eq!(first["data"].as_array().unwrap().len(), SEED_COUNT);
    assert_eq!(first["meta"]["total"], json!(SEED_COUNT));

    let (_, second) = fx.call(HttpMethod::Get, "/api/users", None).await;
    assert_eq!(first["data"], second["data"]);
}

#[tokio::test]
async fn test_seeded_items_have_unique_ids() {
    let fx = Fixture::new(user_schema());
    let (_, body) = fx.call(HttpMethod::Get, "/api/users", None).await;
    let mut ids: Vec<String> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), SEED_COUNT);
}

#[tokio::test]
async fn test_get_by_id_is_idempotent() {
    let fx = Fixture::new(user_schema());
    let (_, first) = fx.call(HttpMethod::Get, "/api/users/abc", None).await;
    let (_, second) = fx.call(HttpMethod::Get, "/api/users/abc", None).await;

    assert_eq!(first["data"]["id"], json!("abc"));
    assert_eq!(first["data"], second["data"]);

    let (_, list) = fx.call(HttpMethod::Get, "/api/users", None).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let fx = Fixture::new(user_schema());
    fx.call(HttpMethod::Put, "/api/users/u1", Some(json!({"name": "Ada"}))).await;
    let (status, put) = fx
        .call(HttpMethod::Put, "/api/users/u1", Some(json!({"name": "Grace", "id": "other"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(put["data"]["id"], json!("u1"));

    let (_, got) = fx.call(HttpMethod::Get, "/api/users/u1", None).await;
    assert_eq!(got["data"]["id"], json!("u1"));
    assert_eq!(got["data"]["name"], json!("Grace"));
    assert!(got["data"]["createdAt"].is_string());
    assert!(got["data"]["updatedAt"].is_string());
}

#[tokio::test]
async fn test_patch_merges_onto_existing() {
    let fx = Fixture::new(user_schema());
    let (_, original) = fx.call(HttpMethod::Get, "/api/users/p1", None).await;
    let (_, patched) = fx
        .call(HttpMethod::Patch, "/api/users/p1", Some(json!({"age": 33})))
        .await;
    assert_eq!(patched["data"]["age"], json!(33));
    assert_eq!(patched["data"]["name"], original["data"]["name"]);
}

#[tokio::test]
async fn test_create_assigns_id_and_timestamps() {
    let fx = Fixture::new(user_schema());
    let (status, created) = fx
        .call(HttpMethod::Post, "/api/users", Some(json!({"name": "Linus"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let item = &created["data"];
    assert_eq!(item["name"], json!("Linus"));
    assert!(uuid::Uuid::parse_str(item["id"].as_str().unwrap()).is_ok());
    assert_eq!(item["createdAt"], item["updatedAt"]);
    assert!(item["age"].is_i64());
}

#[tokio::test]
async fn test_create_with_existing_id_replaces() {
    let fx = Fixture::new(user_schema());
    fx.call(HttpMethod::Post, "/api/users", Some(json!({"id": "dup", "name": "a"}))).await;
    fx.call(HttpMethod::Post, "/api/users", Some(json!({"id": "dup", "name": "b"}))).await;

    let (_, list) = fx.call(HttpMethod::Get, "/api/users", None).await;
    let items = list["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], json!("b"));
}

#[tokio::test]
async fn test_create_rejects_non_object_body() {
    let fx = Fixture::new(user_schema());
    let (route, _) = fx.table.find(HttpMethod::Post, "/api/users").unwrap();
    let request = RequestView::new(HttpMethod::Post, "/api/users").with_body(json!([1, 2]));
    let err = fx
        .handler
        .respond(&fx.table, route, &request, &fx.store)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_delete_missing_still_succeeds() {
    let fx = Fixture::new(user_schema());
    let (status, body) = fx.call(HttpMethod::Delete, "/api/users/ghost", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn test_delete_removes_item() {
    let fx = Fixture::new(user_schema());
    fx.call(HttpMethod::Get, "/api/users/gone", None).await;
    fx.call(HttpMethod::Delete, "/api/users/gone", None).await;

    let (_, list) = fx.call(HttpMethod::Get, "/api/users", None).await;
    let items = list["data"].as_array().unwrap();
    // empty again, so the list reseeds
    assert_eq!(items.len(), SEED_COUNT);
    assert!(items.iter().all(|item| item["id"] != json!("gone")));
}

#[tokio::test]
async fn test_numeric_ids_match_path_strings() {
    let fx = Fixture::new(user_schema());
    fx.call(HttpMethod::Post, "/api/users", Some(json!({"id": 7, "name": "seven"}))).await;

    let (_, got) = fx.call(HttpMethod::Get, "/api/users/7", None).await;
    assert_eq!(got["data"]["id"], json!(7));
    assert_eq!(got["data"]["name"], json!("seven"));
}

#[tokio::test]
async fn test_array_root_seeds_from_one_array() {
    let fx = Fixture::new(json!({
        "type": "array",
        "minItems": 2,
        "maxItems": 2,
        "items": {"type": "object", "properties": {"sku": {"type": "string"}}}
    }));
    let (_, list) = fx.call(HttpMethod::Get, "/api/items", None).await;
    let items = list["data"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item["id"].is_string()));
}

#[tokio::test]
async fn test_declared_routes_bypass_envelope() {
    let fx = Fixture::new(json!({
        "x-schemock-routes": [
            {"path": "/ping", "method": "get", "response": {"pong": true}, "statusCode": 418,
             "headers": {"X-Teapot": "1"}},
            {"path": "/users/:id", "method": "get",
             "response": {"type": "object", "required": ["n"], "properties": {"n": {"const": 5}}}}
        ]
    }));

    let (route, _) = fx.table.find(HttpMethod::Get, "/ping").unwrap();
    let output = fx
        .handler
        .respond(&fx.table, route, &RequestView::new(HttpMethod::Get, "/ping"), &fx.store)
        .await
        .unwrap();
    assert_eq!(output.status, StatusCode::IM_A_TEAPOT);
    assert_eq!(output.body, json!({"pong": true}));
    assert_eq!(output.headers, vec![("X-Teapot".to_string(), "1".to_string())]);

    let (_, body) = fx.call(HttpMethod::Get, "/users/3", None).await;
    assert_eq!(body, json!({"n": 5}));
}
