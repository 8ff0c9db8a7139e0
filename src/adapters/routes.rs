//! Route table construction
//!
//! A [`RouteTable`] is built once per schema document. With no declarative
//! routes it follows the CRUD convention, five bindings under
//! `<base>/<resource>`; when the root carries `x-schemock-routes` those
//! bindings replace the convention entirely.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use crate::domain::error::{EngineError, EngineResult};
use crate::domain::schema::{Items, SchemaDocument, SchemaNode, TypeName};
use crate::domain::HttpMethod;

pub const ROUTES_EXTENSION: &str = "x-schemock-routes";
pub const DEFAULT_RESOURCE: &str = "items";
pub const DEFAULT_BASE_PATH: &str = "/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudAction {
    List,
    Get,
    Create,
    Update,
    Delete,
}

/// What a matched route answers with
#[derive(Debug, Clone)]
pub enum RouteResponse {
    /// Returned verbatim
    Fixed(Value),
    /// Synthesized per request
    Schema(SchemaNode),
    Crud { resource: String, action: CrudAction },
}

impl RouteResponse {
    fn kind(&self) -> &'static str {
        match self {
            Self::Fixed(_) => "fixed",
            Self::Schema(_) => "schema",
            Self::Crud { .. } => "crud",
        }
    }
}

// ============================================================================
// Path templates
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A path with `:name` or `{name}` placeholder segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(path: &str) -> Self {
        let segments = split_path(path)
            .map(|segment| {
                if let Some(name) = segment.strip_prefix(':') {
                    Segment::Param(name.to_string())
                } else if let Some(name) = segment
                    .strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                {
                    Segment::Param(name.to_string())
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();
        Self {
            raw: path.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Captured parameters when `path` fits this template
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

// ============================================================================
// Routes and resources
// ============================================================================

#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub method: HttpMethod,
    pub path: PathTemplate,
    pub response: RouteResponse,
    pub status_code: Option<u16>,
    pub delay_ms: Option<u64>,
    pub headers: Vec<(String, String)>,
}

impl RouteConfig {
    fn crud(method: HttpMethod, path: &str, resource: &str, action: CrudAction) -> Self {
        Self {
            method,
            path: PathTemplate::parse(path),
            response: RouteResponse::Crud {
                resource: resource.to_string(),
                action,
            },
            status_code: None,
            delay_ms: None,
            headers: Vec::new(),
        }
    }
}

/// Schema backing one CRUD resource
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub name: String,
    /// Schema for one stored item
    pub item: SchemaNode,
    /// The whole array schema when the document root is an array
    pub collection: Option<SchemaNode>,
}

#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub resource_name: Option<String>,
    pub base_path: String,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            resource_name: None,
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }
}

/// Listing entry for `/_admin/routes`
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub method: HttpMethod,
    pub path: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<CrudAction>,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    document: SchemaDocument,
    routes: Vec<RouteConfig>,
    resources: HashMap<String, ResourceDefinition>,
}

impl RouteTable {
    pub fn from_document(document: SchemaDocument, options: &RouteOptions) -> EngineResult<Self> {
        let declared = document.root.extensions.get(ROUTES_EXTENSION).cloned();
        let table = match declared {
            Some(Value::Array(entries)) => {
                let routes = entries
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| parse_declared_route(i, entry))
                    .collect::<EngineResult<Vec<_>>>()?;
                Self {
                    document,
                    routes,
                    resources: HashMap::new(),
                }
            }
            Some(_) => {
                return Err(EngineError::InvalidSchema(format!(
                    "`{}` must be an array of routes",
                    ROUTES_EXTENSION
                )))
            }
            None => Self::conventional(document, options),
        };

        info!(
            routes = table.routes.len(),
            resources = table.resources.len(),
            "route table built"
        );
        Ok(table)
    }

    fn conventional(document: SchemaDocument, options: &RouteOptions) -> Self {
        let name = options
            .resource_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| document.root.title.as_deref().and_then(slug))
            .unwrap_or_else(|| DEFAULT_RESOURCE.to_string());

        let (item, collection) = match &document.root.array.items {
            Some(Items::Single(item)) if document.root.is_array() => {
                ((**item).clone(), Some(document.root.clone()))
            }
            _ => (document.root.clone(), None),
        };

        let base = options.base_path.trim_end_matches('/');
        let collection_path = format!("{}/{}", base, name);
        let item_path = format!("{}/:id", collection_path);

        let routes = vec![
            RouteConfig::crud(HttpMethod::Get, &collection_path, &name, CrudAction::List),
            RouteConfig::crud(HttpMethod::Post, &collection_path, &name, CrudAction::Create),
            RouteConfig::crud(HttpMethod::Get, &item_path, &name, CrudAction::Get),
            RouteConfig::crud(HttpMethod::Put, &item_path, &name, CrudAction::Update),
            RouteConfig::crud(HttpMethod::Patch, &item_path, &name, CrudAction::Update),
            RouteConfig::crud(HttpMethod::Delete, &item_path, &name, CrudAction::Delete),
        ];

        let mut resources = HashMap::new();
        resources.insert(
            name.clone(),
            ResourceDefinition {
                name,
                item,
                collection,
            },
        );

        Self {
            document,
            routes,
            resources,
        }
    }

    /// First route, in declaration order, that binds `method` and `path`
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<(&RouteConfig, HashMap<String, String>)> {
        self.routes
            .iter()
            .filter(|route| route.method == method)
            .find_map(|route| route.path.matches(path).map(|params| (route, params)))
    }

    /// Whether any route binds `path` under some other method
    pub fn path_exists(&self, path: &str) -> bool {
        self.routes.iter().any(|route| route.path.matches(path).is_some())
    }

    pub fn routes(&self) -> &[RouteConfig] {
        &self.routes
    }

    pub fn list(&self) -> Vec<RouteSummary> {
        self.routes
            .iter()
            .map(|route| {
                let (resource, action) = match &route.response {
                    RouteResponse::Crud { resource, action } => (Some(resource.clone()), Some(*action)),
                    _ => (None, None),
                };
                RouteSummary {
                    method: route.method,
                    path: route.path.as_str().to_string(),
                    kind: route.response.kind(),
                    resource,
                    action,
                }
            })
            .collect()
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.get(name)
    }

    /// Raw root document, which `$ref` pointers resolve against
    pub fn root(&self) -> &Value {
        &self.document.raw
    }

    pub fn document(&self) -> &SchemaDocument {
        &self.document
    }
}

fn parse_declared_route(index: usize, entry: &Value) -> EngineResult<RouteConfig> {
    let invalid = |msg: &str| EngineError::InvalidSchema(format!("route {}: {}", index, msg));

    let obj = entry.as_object().ok_or_else(|| invalid("must be an object"))?;
    let path = obj
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("`path` is required"))?;
    let method: HttpMethod = obj
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("get")
        .parse()?;

    let response = match obj.get("response") {
        Some(value) if is_schema_like(value) => RouteResponse::Schema(SchemaNode::from_value(value)?),
        Some(value) => RouteResponse::Fixed(value.clone()),
        None => RouteResponse::Fixed(Value::Null),
    };

    let status_code = match obj.get("statusCode") {
        None => None,
        Some(value) => Some(
            value
                .as_u64()
                .filter(|code| (100..=599).contains(code))
                .ok_or_else(|| invalid("`statusCode` must be an HTTP status"))? as u16,
        ),
    };

    let headers = obj
        .get("headers")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RouteConfig {
        method,
        path: PathTemplate::parse(path),
        response,
        status_code,
        delay_ms: obj.get("delay").and_then(Value::as_u64),
        headers,
    })
}

/// Whether a declared response should be synthesized rather than echoed
pub fn is_schema_like(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let typed = match obj.get("type") {
        Some(Value::String(name)) => TypeName::parse(name).is_some(),
        Some(Value::Array(names)) => {
            !names.is_empty()
                && names
                    .iter()
                    .all(|n| n.as_str().and_then(TypeName::parse).is_some())
        }
        _ => false,
    };
    typed
        || ["$ref", "oneOf", "anyOf", "allOf", "properties"]
            .iter()
            .any(|keyword| obj.contains_key(*keyword))
}

/// Lowercase, dash-separated form of a title
pub fn slug(title: &str) -> Option<String> {
    let mut out = String::new();
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(schema: Value, options: &RouteOptions) -> RouteTable {
        RouteTable::from_document(SchemaDocument::parse(schema).unwrap(), options).unwrap()
    }

    #[test]
    fn test_path_template_params() {
        let colon = PathTemplate::parse("/api/users/:id");
        let braces = PathTemplate::parse("/api/users/{id}/posts/{post}");

        assert_eq!(colon.matches("/api/users/42").unwrap()["id"], "42");
        assert!(colon.matches("/api/users").is_none());
        assert!(colon.matches("/api/groups/42").is_none());

        let params = braces.matches("/api/users/1/posts/9/").unwrap();
        assert_eq!(params["id"], "1");
        assert_eq!(params["post"], "9");
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("User Profile"), Some("user-profile".to_string()));
        assert_eq!(slug("  Orders!! "), Some("orders".to_string()));
        assert_eq!(slug("***"), None);
    }

    #[test]
    fn test_resource_name_resolution() {
        let titled = json!({"title": "Blog Posts", "type": "object"});
        let t = table(titled.clone(), &RouteOptions::default());
        assert!(t.resource("blog-posts").is_some());

        let configured = RouteOptions {
            resource_name: Some("articles".to_string()),
            ..RouteOptions::default()
        };
        assert!(table(titled, &configured).resource("articles").is_some());

        let t = table(json!({"type": "object"}), &RouteOptions::default());
        assert!(t.resource("items").is_some());
    }

    #[test]
    fn test_conventional_routes() {
        let t = table(json!({"type": "object"}), &RouteOptions::default());
        let (route, params) = t.find(HttpMethod::Get, "/api/items/abc").unwrap();
        assert!(matches!(
            route.response,
            RouteResponse::Crud { action: CrudAction::Get, .. }
        ));
        assert_eq!(params["id"], "abc");

        let (route, _) = t.find(HttpMethod::Patch, "/api/items/abc").unwrap();
        assert!(matches!(
            route.response,
            RouteResponse::Crud { action: CrudAction::Update, .. }
        ));
        assert!(t.find(HttpMethod::Delete, "/api/items").is_none());
        assert!(t.path_exists("/api/items"));
        assert_eq!(t.list().len(), 6);
    }

    #[test]
    fn test_array_root_uses_item_schema() {
        let t = table(
            json!({"type": "array", "items": {"type": "object", "title": "row"}}),
            &RouteOptions::default(),
        );
        let resource = t.resource("items").unwrap();
        assert_eq!(resource.item.title.as_deref(), Some("row"));
        assert!(resource.collection.is_some());
    }

    #[test]
    fn test_declarative_routes_replace_convention() {
        let t = table(
            json!({
                "type": "object",
                "x-schemock-routes": [
                    {"path": "/status", "method": "GET", "response": {"ok": true}},
                    {
                        "path": "/users/{id}",
                        "method": "post",
                        "response": {"type": "object", "properties": {"id": {"type": "string"}}},
                        "statusCode": 202,
                        "delay": 5,
                        "headers": {"X-Mock": "yes"}
                    }
                ]
            }),
            &RouteOptions::default(),
        );

        assert!(t.find(HttpMethod::Get, "/api/items").is_none());

        let (status, _) = t.find(HttpMethod::Get, "/status").unwrap();
        assert!(matches!(&status.response, RouteResponse::Fixed(v) if v == &json!({"ok": true})));

        let (user, params) = t.find(HttpMethod::Post, "/users/5").unwrap();
        assert!(matches!(user.response, RouteResponse::Schema(_)));
        assert_eq!(user.status_code, Some(202));
        assert_eq!(user.delay_ms, Some(5));
        assert_eq!(user.headers, vec![("X-Mock".to_string(), "yes".to_string())]);
        assert_eq!(params["id"], "5");
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let doc = SchemaDocument::parse(json!({
            "x-schemock-routes": [{"path": "/x", "method": "TRACE", "response": 1}]
        }))
        .unwrap();
        let err = RouteTable::from_document(doc, &RouteOptions::default()).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedMethod(m) if m == "TRACE"));
    }

    #[test]
    fn test_schema_like_detection() {
        assert!(is_schema_like(&json!({"type": "string"})));
        assert!(is_schema_like(&json!({"type": ["string", "null"]})));
        assert!(is_schema_like(&json!({"$ref": "#/definitions/a"})));
        assert!(is_schema_like(&json!({"properties": {}})));
        assert!(!is_schema_like(&json!({"type": "admin", "name": "root"})));
        assert!(!is_schema_like(&json!({"message": "hello"})));
        assert!(!is_schema_like(&json!([1, 2])));
    }
}
