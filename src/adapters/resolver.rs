//! `$ref` and composition resolution
//!
//! Resolves internal JSON pointers against the root document and tracks the
//! pointers currently being expanded so self-referential schemas terminate.
//! Composition helpers pick `oneOf`/`anyOf` branches and merge `allOf` results.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::adapters::synthesizer::DynRng;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::schema::{SchemaNode, TypeName};

// ============================================================================
// Resolution Context
// ============================================================================

/// Per-call state carried through one top-level synthesis
pub struct ResolutionContext<'a> {
    root: &'a Value,
    /// Pointers on the current expansion path
    visited: HashSet<String>,
    strict: bool,
    hint: Option<String>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(root: &'a Value, strict: bool, hint: Option<String>) -> Self {
        Self {
            root,
            visited: HashSet::new(),
            strict,
            hint,
        }
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Property-name hint the call started with
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// True outside any `$ref` expansion
    pub fn is_top_level(&self) -> bool {
        self.visited.is_empty()
    }

    pub fn is_visited(&self, pointer: &str) -> bool {
        self.visited.contains(pointer)
    }

    /// Mark a pointer as being expanded. Returns false if it already was.
    pub fn enter(&mut self, pointer: &str) -> bool {
        self.visited.insert(pointer.to_string())
    }

    /// Mark a pointer as no longer being expanded
    pub fn exit(&mut self, pointer: &str) {
        self.visited.remove(pointer);
    }
}

// ============================================================================
// Reference Resolution
// ============================================================================

/// Outcome of following one `$ref`
#[derive(Debug)]
pub enum Resolution {
    Resolved(SchemaNode),
    /// The pointer is already on the expansion path
    Cycle,
    /// Not an internal `#/` pointer
    Unsupported,
}

/// Look up `pointer` in the context's root document.
///
/// Does not mark the pointer visited; the caller brackets its recursion with
/// [`ResolutionContext::enter`] and [`ResolutionContext::exit`].
pub fn resolve_ref(pointer: &str, ctx: &ResolutionContext<'_>) -> EngineResult<Resolution> {
    if pointer != "#" && !pointer.starts_with("#/") {
        return Ok(Resolution::Unsupported);
    }
    if ctx.is_visited(pointer) {
        return Ok(Resolution::Cycle);
    }
    let target = lookup_pointer(ctx.root(), pointer)?;
    Ok(Resolution::Resolved(SchemaNode::from_value(target)?))
}

/// Walk `root` along an internal pointer such as `#/definitions/User`
pub fn lookup_pointer<'v>(root: &'v Value, pointer: &str) -> EngineResult<&'v Value> {
    let path = match pointer.strip_prefix('#') {
        Some("") => return Ok(root),
        Some(rest) => rest.strip_prefix('/').unwrap_or(rest),
        None => pointer,
    };

    let mut current = root;
    for raw in path.split('/') {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Object(map) => map.get(&segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| EngineError::Reference {
            pointer: pointer.to_string(),
            segment: segment.clone(),
        })?;
    }
    Ok(current)
}

// ============================================================================
// Composition
// ============================================================================

/// Uniform choice among `oneOf`/`anyOf` branches
pub fn pick_branch<'n>(branches: &'n [SchemaNode], rng: &mut DynRng) -> Option<&'n SchemaNode> {
    branches.choose(rng)
}

/// Uniform choice among the names of a multi-type declaration
pub fn pick_type(types: &[TypeName], rng: &mut DynRng) -> TypeName {
    let idx = rng.gen_range(0..types.len());
    types[idx]
}

/// Shallow-merge `allOf` results in order. Later object keys win; a non-object
/// result replaces whatever was accumulated so far.
pub fn merge_all_of(parts: Vec<Value>) -> Value {
    let mut acc: Option<Value> = None;
    for part in parts {
        acc = Some(match (acc, part) {
            (Some(Value::Object(mut base)), Value::Object(overlay)) => {
                for (k, v) in overlay {
                    base.insert(k, v);
                }
                Value::Object(base)
            }
            (_, part) => part,
        });
    }
    acc.unwrap_or_else(|| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use serde_json::json;

    #[test]
    fn test_lookup_pointer_walks_objects_and_arrays() {
        let root = json!({
            "definitions": {
                "User": {"type": "object"},
                "a/b": {"type": "string"}
            },
            "list": [{"type": "integer"}]
        });
        assert_eq!(
            lookup_pointer(&root, "#/definitions/User").unwrap(),
            &json!({"type": "object"})
        );
        assert_eq!(
            lookup_pointer(&root, "#/definitions/a~1b").unwrap(),
            &json!({"type": "string"})
        );
        assert_eq!(
            lookup_pointer(&root, "#/list/0").unwrap(),
            &json!({"type": "integer"})
        );
        assert_eq!(lookup_pointer(&root, "#").unwrap(), &root);
    }

    #[test]
    fn test_missing_segment_is_named() {
        let root = json!({"definitions": {}});
        match lookup_pointer(&root, "#/definitions/Ghost/name") {
            Err(EngineError::Reference { segment, pointer }) => {
                assert_eq!(segment, "Ghost");
                assert_eq!(pointer, "#/definitions/Ghost/name");
            }
            other => panic!("expected reference error, got {:?}", other),
        }
    }

    #[test]
    fn test_external_ref_is_unsupported() {
        let root = json!({});
        let ctx = ResolutionContext::new(&root, false, None);
        assert!(matches!(
            resolve_ref("https://example.com/schema.json", &ctx).unwrap(),
            Resolution::Unsupported
        ));
        assert!(matches!(
            resolve_ref("other.json#/a", &ctx).unwrap(),
            Resolution::Unsupported
        ));
    }

    #[test]
    fn test_visited_pointer_is_a_cycle() {
        let root = json!({"a": {"type": "string"}});
        let mut ctx = ResolutionContext::new(&root, false, None);
        assert!(ctx.is_top_level());
        assert!(ctx.enter("#/a"));
        assert!(!ctx.enter("#/a"));
        assert!(matches!(resolve_ref("#/a", &ctx).unwrap(), Resolution::Cycle));
        ctx.exit("#/a");
        assert!(ctx.is_top_level());
        assert!(matches!(
            resolve_ref("#/a", &ctx).unwrap(),
            Resolution::Resolved(_)
        ));
    }

    #[test]
    fn test_merge_all_of_later_keys_win() {
        let merged = merge_all_of(vec![
            json!({"a": 1, "b": 1}),
            json!({"b": 2, "c": 3}),
        ]);
        assert_eq!(merged, json!({"a": 1, "b": 2, "c": 3}));
    }

    #[test]
    fn test_merge_all_of_non_object_replaces() {
        assert_eq!(merge_all_of(vec![json!({"a": 1}), json!("flat")]), json!("flat"));
        assert_eq!(
            merge_all_of(vec![json!(5), json!({"a": 1})]),
            json!({"a": 1})
        );
        assert_eq!(merge_all_of(vec![]), json!({}));
    }

    #[test]
    fn test_pick_type_stays_in_declared_set() {
        let mut rng = StepRng::new(0, 1 << 60);
        let types = [TypeName::String, TypeName::Integer, TypeName::Null];
        for _ in 0..20 {
            assert!(types.contains(&pick_type(&types, &mut rng)));
        }
    }
}
