//! Schema model
//!
//! Parses a JSON-Schema-like document into an immutable [`SchemaNode`] tree.
//! The type keyword becomes a closed [`SchemaKind`] so synthesis dispatches
//! exhaustively; every other keyword the engine understands gets a typed slot,
//! and vendor `x-*` keys are kept verbatim in `extensions`.

use serde_json::{Map, Value};

use crate::domain::error::{EngineError, EngineResult};

// ============================================================================
// Kind tag
// ============================================================================

/// A single JSON Schema primitive type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeName {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl TypeName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

/// What the `type` keyword declared
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SchemaKind {
    Single(TypeName),
    /// `type: [...]` with more than one recognised name
    Multi(Vec<TypeName>),
    /// No `type` keyword at all
    #[default]
    Untyped,
    /// A `type` name the engine does not know
    Unknown(String),
}

// ============================================================================
// Constraint groups
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Inclusive(f64),
    Exclusive(f64),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringConstraints {
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumericConstraints {
    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub multiple_of: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    Single(Box<SchemaNode>),
    Tuple(Vec<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayShape {
    pub items: Option<Items>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    /// `additionalProperties: true`
    Any,
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectShape {
    /// Declared properties, in document order
    pub properties: Vec<(String, SchemaNode)>,
    pub required: Vec<String>,
    /// `None` when absent or `false`
    pub additional: Option<AdditionalProperties>,
}

impl ObjectShape {
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

// ============================================================================
// Schema node
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub reference: Option<String>,
    pub one_of: Vec<SchemaNode>,
    pub any_of: Vec<SchemaNode>,
    pub all_of: Vec<SchemaNode>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub title: Option<String>,
    pub object: ObjectShape,
    pub array: ArrayShape,
    pub string: StringConstraints,
    pub numeric: NumericConstraints,
    /// Vendor keys (`x-*`), kept verbatim
    pub extensions: Map<String, Value>,
}

impl SchemaNode {
    /// Parse a schema value. Boolean schemas (`true`/`false`) are untyped.
    pub fn from_value(value: &Value) -> EngineResult<Self> {
        match value {
            Value::Bool(_) => Ok(Self::default()),
            Value::Object(map) => Self::from_map(map),
            other => Err(EngineError::InvalidSchema(format!(
                "expected a schema object, found {}",
                json_kind(other)
            ))),
        }
    }

    fn from_map(map: &Map<String, Value>) -> EngineResult<Self> {
        let reference = match map.get("$ref") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(EngineError::InvalidSchema(
                    "`$ref` must be a string".to_string(),
                ))
            }
        };

        let extensions = map
            .iter()
            .filter(|(k, _)| k.starts_with("x-"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            kind: parse_kind(map.get("type"))?,
            reference,
            one_of: parse_list(map, "oneOf")?,
            any_of: parse_list(map, "anyOf")?,
            all_of: parse_list(map, "allOf")?,
            enum_values: match map.get("enum") {
                None => None,
                Some(Value::Array(values)) => Some(values.clone()),
                Some(_) => {
                    return Err(EngineError::InvalidSchema(
                        "`enum` must be an array".to_string(),
                    ))
                }
            },
            const_value: map.get("const").cloned(),
            title: map.get("title").and_then(Value::as_str).map(str::to_string),
            object: parse_object(map)?,
            array: parse_array(map)?,
            string: StringConstraints {
                format: map.get("format").and_then(Value::as_str).map(str::to_string),
                pattern: map.get("pattern").and_then(Value::as_str).map(str::to_string),
                min_length: map.get("minLength").and_then(as_usize),
                max_length: map.get("maxLength").and_then(as_usize),
            },
            numeric: parse_numeric(map),
            extensions,
        })
    }

    /// True when the node carries a `type` or object properties of its own
    pub fn has_own_shape(&self) -> bool {
        !matches!(self.kind, SchemaKind::Untyped) || !self.object.properties.is_empty()
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, SchemaKind::Single(TypeName::Array))
    }
}

/// A parsed document together with its raw JSON, which `$ref` pointers walk
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub raw: Value,
    pub root: SchemaNode,
}

impl SchemaDocument {
    pub fn parse(raw: Value) -> EngineResult<Self> {
        if raw.is_null() {
            return Err(EngineError::InvalidInput("a schema document is required".to_string()));
        }
        let root = SchemaNode::from_value(&raw)?;
        Ok(Self { raw, root })
    }
}

// ============================================================================
// Keyword parsers
// ============================================================================

fn parse_kind(value: Option<&Value>) -> EngineResult<SchemaKind> {
    match value {
        None => Ok(SchemaKind::Untyped),
        Some(Value::String(name)) => Ok(TypeName::parse(name)
            .map(SchemaKind::Single)
            .unwrap_or_else(|| SchemaKind::Unknown(name.clone()))),
        Some(Value::Array(names)) => {
            let raw: Vec<&str> = names.iter().filter_map(Value::as_str).collect();
            let mut types: Vec<TypeName> = Vec::new();
            for name in &raw {
                if let Some(t) = TypeName::parse(name) {
                    if !types.contains(&t) {
                        types.push(t);
                    }
                }
            }
            Ok(match types.len() {
                0 => SchemaKind::Unknown(raw.join(",")),
                1 => SchemaKind::Single(types[0]),
                _ => SchemaKind::Multi(types),
            })
        }
        Some(_) => Err(EngineError::InvalidSchema(
            "`type` must be a string or an array of strings".to_string(),
        )),
    }
}

fn parse_list(map: &Map<String, Value>, keyword: &str) -> EngineResult<Vec<SchemaNode>> {
    match map.get(keyword) {
        None => Ok(Vec::new()),
        Some(Value::Array(branches)) => branches.iter().map(SchemaNode::from_value).collect(),
        Some(_) => Err(EngineError::InvalidSchema(format!(
            "`{}` must be an array of schemas",
            keyword
        ))),
    }
}

fn parse_object(map: &Map<String, Value>) -> EngineResult<ObjectShape> {
    let properties = match map.get("properties") {
        None => Vec::new(),
        Some(Value::Object(props)) => props
            .iter()
            .map(|(name, schema)| {
                SchemaNode::from_value(schema)
                    .map(|node| (name.clone(), node))
                    .map_err(|e| match e {
                        EngineError::InvalidSchema(msg) => {
                            EngineError::InvalidSchema(format!("property '{}': {}", name, msg))
                        }
                        other => other,
                    })
            })
            .collect::<EngineResult<Vec<_>>>()?,
        Some(_) => {
            return Err(EngineError::InvalidSchema(
                "`properties` must be an object".to_string(),
            ))
        }
    };

    let required = map
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let additional = match map.get("additionalProperties") {
        None | Some(Value::Bool(false)) => None,
        Some(Value::Bool(true)) => Some(AdditionalProperties::Any),
        Some(schema @ Value::Object(_)) => Some(AdditionalProperties::Schema(Box::new(
            SchemaNode::from_value(schema)?,
        ))),
        Some(_) => {
            return Err(EngineError::InvalidSchema(
                "`additionalProperties` must be a boolean or a schema".to_string(),
            ))
        }
    };

    Ok(ObjectShape {
        properties,
        required,
        additional,
    })
}

fn parse_array(map: &Map<String, Value>) -> EngineResult<ArrayShape> {
    let items = match map.get("items") {
        None => None,
        Some(Value::Array(tuple)) => Some(Items::Tuple(
            tuple
                .iter()
                .map(SchemaNode::from_value)
                .collect::<EngineResult<Vec<_>>>()?,
        )),
        Some(single @ (Value::Object(_) | Value::Bool(_))) => {
            Some(Items::Single(Box::new(SchemaNode::from_value(single)?)))
        }
        Some(_) => {
            return Err(EngineError::InvalidSchema(
                "`items` must be a schema or an array of schemas".to_string(),
            ))
        }
    };

    Ok(ArrayShape {
        items,
        min_items: map.get("minItems").and_then(as_usize),
        max_items: map.get("maxItems").and_then(as_usize),
    })
}

fn parse_numeric(map: &Map<String, Value>) -> NumericConstraints {
    let minimum = map.get("minimum").and_then(Value::as_f64);
    let maximum = map.get("maximum").and_then(Value::as_f64);

    NumericConstraints {
        minimum: lower_bound(minimum, map.get("exclusiveMinimum")),
        maximum: upper_bound(maximum, map.get("exclusiveMaximum")),
        multiple_of: map
            .get("multipleOf")
            .and_then(Value::as_f64)
            .filter(|m| *m > 0.0),
    }
}

// Draft-04 uses a boolean flag next to `minimum`; draft-06 and later carry the
// bound itself. When both forms give a number the tighter one applies.
fn lower_bound(minimum: Option<f64>, exclusive: Option<&Value>) -> Option<Bound> {
    match (minimum, exclusive) {
        (Some(min), Some(Value::Bool(true))) => Some(Bound::Exclusive(min)),
        (Some(min), Some(Value::Number(n))) => match n.as_f64() {
            Some(ex) if ex >= min => Some(Bound::Exclusive(ex)),
            _ => Some(Bound::Inclusive(min)),
        },
        (None, Some(Value::Number(n))) => n.as_f64().map(Bound::Exclusive),
        (Some(min), _) => Some(Bound::Inclusive(min)),
        (None, _) => None,
    }
}

fn upper_bound(maximum: Option<f64>, exclusive: Option<&Value>) -> Option<Bound> {
    match (maximum, exclusive) {
        (Some(max), Some(Value::Bool(true))) => Some(Bound::Exclusive(max)),
        (Some(max), Some(Value::Number(n))) => match n.as_f64() {
            Some(ex) if ex <= max => Some(Bound::Exclusive(ex)),
            _ => Some(Bound::Inclusive(max)),
        },
        (None, Some(Value::Number(n))) => n.as_f64().map(Bound::Exclusive),
        (Some(max), _) => Some(Bound::Inclusive(max)),
        (None, _) => None,
    }
}

fn as_usize(value: &Value) -> Option<usize> {
    value.as_u64().map(|n| n as usize)
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
