//! Schema-driven value synthesis
//!
//! [`Synthesizer`] turns a schema into a plausible JSON value. It owns the
//! injectable random source and the optional [`SynthesisCache`]; each call
//! builds a fresh [`ResolutionContext`] and walks the schema with a
//! [`Generation`] pass that borrows the random source for its duration.

use chrono::Utc;
use fake::faker::internet::en::DomainSuffix;
use fake::faker::lorem::en::Word;
use fake::Fake;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::{Map, Number, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::adapters::heuristics;
use crate::adapters::resolver::{self, Resolution, ResolutionContext};
use crate::adapters::synthesis_cache::{CacheKey, SynthesisCache};
use crate::config::GeneratorSettings;
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::schema::{AdditionalProperties, Bound, Items, SchemaKind, SchemaNode, TypeName};

/// The random source every generator draws from
pub type DynRng = dyn RngCore + Send;

/// Upper limit on generated array lengths and string lengths
pub const MAX_GENERATED_LEN: usize = 1000;

/// The one pattern mapped to a literal instead of being ignored
pub const SSN_PATTERN: &str = "^[0-9]{3}-[0-9]{2}-[0-9]{4}$";
const SSN_LITERAL: &str = "123-45-6789";
const IPV6_PLACEHOLDER: &str = "2001:0db8:85a3:0000:0000:8a2e:0370:7334";

pub const UNKNOWN_TYPE_SENTINEL: &str = "unknown-type";
const UNSUPPORTED_REF_PREFIX: &str = "unsupported-ref:";

/// RFC 4122 v4 uuid built from the given source
pub fn random_uuid(rng: &mut DynRng) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub strict: bool,
    /// Property name used for heuristics at the top level
    pub hint: Option<String>,
    /// Consult and populate the synthesis cache
    pub use_cache: bool,
}

impl GenerateOptions {
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn cached(mut self) -> Self {
        self.use_cache = true;
        self
    }
}

pub struct Synthesizer {
    rng: Mutex<Box<DynRng>>,
    cache: Option<Arc<SynthesisCache>>,
    generated: AtomicU64,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(Box::new(StdRng::seed_from_u64(seed)))
    }

    /// Use a caller-supplied random source, e.g. a stub in tests
    pub fn with_rng(rng: Box<DynRng>) -> Self {
        Self {
            rng: Mutex::new(rng),
            cache: None,
            generated: AtomicU64::new(0),
        }
    }

    pub fn with_cache(mut self, cache: Arc<SynthesisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn from_settings(settings: &GeneratorSettings) -> Self {
        let synthesizer = match settings.seed {
            Some(seed) => Self::seeded(seed),
            None => Self::new(),
        };
        if settings.cache.enabled {
            synthesizer.with_cache(Arc::new(SynthesisCache::new(
                settings.cache.capacity,
                Duration::from_secs(settings.cache.ttl_seconds),
            )))
        } else {
            synthesizer
        }
    }

    pub fn cache(&self) -> Option<&Arc<SynthesisCache>> {
        self.cache.as_ref()
    }

    /// Number of values produced by raw generation (cache hits excluded)
    pub fn generated_count(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    /// Synthesize a value for a self-contained schema
    pub fn generate(&self, schema: &Value, options: &GenerateOptions) -> EngineResult<Value> {
        self.generate_in(schema, schema, options)
    }

    /// Synthesize a value for `schema`, resolving `$ref` pointers against `root`
    pub fn generate_in(
        &self,
        schema: &Value,
        root: &Value,
        options: &GenerateOptions,
    ) -> EngineResult<Value> {
        if schema.is_null() {
            return Err(EngineError::InvalidInput("a schema is required".to_string()));
        }
        let node = SchemaNode::from_value(schema)?;
        let mut ctx = ResolutionContext::new(root, options.strict, options.hint.clone());

        let cache_key = match &self.cache {
            Some(_) if options.use_cache && ctx.is_top_level() => {
                Some(CacheKey::new(schema, ctx.strict(), ctx.hint()))
            }
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                debug!(key = key.as_str(), "synthesis cache hit");
                return Ok(hit);
            }
        }

        let value = self.run(&node, &mut ctx)?;
        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.set(key, value.clone());
        }
        Ok(value)
    }

    /// Synthesize from an already parsed node. Never cached.
    pub fn generate_node(
        &self,
        node: &SchemaNode,
        root: &Value,
        options: &GenerateOptions,
    ) -> EngineResult<Value> {
        let mut ctx = ResolutionContext::new(root, options.strict, options.hint.clone());
        self.run(node, &mut ctx)
    }

    fn run(&self, node: &SchemaNode, ctx: &mut ResolutionContext<'_>) -> EngineResult<Value> {
        let value = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let hint = ctx.hint().map(str::to_string);
            Generation { rng: &mut **rng }.synthesize(node, ctx, hint.as_deref())?
        };
        self.generated.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    /// Fresh uuid drawn from the synthesizer's random source
    pub fn next_id(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        random_uuid(&mut **rng)
    }
}

// ============================================================================
// Generation pass
// ============================================================================

/// One walk over a schema tree, holding the borrowed random source
pub struct Generation<'r> {
    pub rng: &'r mut DynRng,
}

impl<'r> Generation<'r> {
    pub fn synthesize(
        &mut self,
        node: &SchemaNode,
        ctx: &mut ResolutionContext<'_>,
        hint: Option<&str>,
    ) -> EngineResult<Value> {
        if let Some(pointer) = &node.reference {
            return self.synthesize_ref(pointer, ctx, hint);
        }
        if let Some(value) = &node.const_value {
            return Ok(value.clone());
        }

        if !node.all_of.is_empty() {
            let mut parts = Vec::with_capacity(node.all_of.len() + 1);
            if node.has_own_shape() {
                parts.push(self.synthesize_own(node, ctx, hint)?);
            }
            for branch in &node.all_of {
                parts.push(self.synthesize(branch, ctx, hint)?);
            }
            return Ok(resolver::merge_all_of(parts));
        }
        if let Some(branch) = resolver::pick_branch(&node.one_of, &mut *self.rng) {
            return self.synthesize(branch, ctx, hint);
        }
        if let Some(branch) = resolver::pick_branch(&node.any_of, &mut *self.rng) {
            return self.synthesize(branch, ctx, hint);
        }

        self.synthesize_own(node, ctx, hint)
    }

    fn synthesize_ref(
        &mut self,
        pointer: &str,
        ctx: &mut ResolutionContext<'_>,
        hint: Option<&str>,
    ) -> EngineResult<Value> {
        match resolver::resolve_ref(pointer, ctx)? {
            Resolution::Unsupported => {
                warn!(pointer, "external $ref targets are not resolved");
                Ok(Value::String(format!("{}{}", UNSUPPORTED_REF_PREFIX, pointer)))
            }
            Resolution::Cycle => {
                warn!(pointer, "circular $ref, substituting null");
                Ok(Value::Null)
            }
            Resolution::Resolved(target) => {
                ctx.enter(pointer);
                let result = self.synthesize(&target, ctx, hint);
                ctx.exit(pointer);
                result
            }
        }
    }

    /// Enum choice or type dispatch, ignoring composition keywords
    fn synthesize_own(
        &mut self,
        node: &SchemaNode,
        ctx: &mut ResolutionContext<'_>,
        hint: Option<&str>,
    ) -> EngineResult<Value> {
        if let Some(values) = &node.enum_values {
            if let Some(choice) = values.choose(&mut *self.rng) {
                return Ok(choice.clone());
            }
        }

        match &node.kind {
            SchemaKind::Single(type_name) => self.synthesize_type(*type_name, node, ctx, hint),
            SchemaKind::Multi(types) => {
                let type_name = resolver::pick_type(types, &mut *self.rng);
                self.synthesize_type(type_name, node, ctx, hint)
            }
            SchemaKind::Untyped => self.synthesize_untyped(node, ctx, None),
            SchemaKind::Unknown(name) => self.synthesize_untyped(node, ctx, Some(name)),
        }
    }

    fn synthesize_type(
        &mut self,
        type_name: TypeName,
        node: &SchemaNode,
        ctx: &mut ResolutionContext<'_>,
        hint: Option<&str>,
    ) -> EngineResult<Value> {
        match type_name {
            TypeName::String => Ok(Value::String(self.synthesize_string(node, hint))),
            TypeName::Number => Ok(self.synthesize_number(node, hint, false, ctx.strict())),
            TypeName::Integer => Ok(self.synthesize_number(node, hint, true, ctx.strict())),
            TypeName::Boolean => Ok(Value::Bool(self.rng.gen_bool(0.5))),
            TypeName::Object => self.synthesize_object(node, ctx),
            TypeName::Array => self.synthesize_array(node, ctx, hint),
            TypeName::Null => Ok(Value::Null),
        }
    }

    fn synthesize_untyped(
        &mut self,
        node: &SchemaNode,
        ctx: &mut ResolutionContext<'_>,
        type_name: Option<&str>,
    ) -> EngineResult<Value> {
        if !ctx.strict() && !node.object.properties.is_empty() {
            return self.synthesize_object(node, ctx);
        }
        Ok(Value::String(match type_name {
            Some(name) => format!("{}:{}", UNKNOWN_TYPE_SENTINEL, name),
            None => UNKNOWN_TYPE_SENTINEL.to_string(),
        }))
    }

    // ------------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------------

    fn synthesize_string(&mut self, node: &SchemaNode, hint: Option<&str>) -> String {
        if let Some(heuristic) = hint.and_then(heuristics::classify_string) {
            return heuristics::fake_string(heuristic, &mut *self.rng);
        }

        let constraints = &node.string;
        if let Some(value) = constraints.format.as_deref().and_then(|f| self.format_string(f)) {
            return value;
        }
        if let Some(pattern) = constraints.pattern.as_deref() {
            if pattern == SSN_PATTERN {
                return SSN_LITERAL.to_string();
            }
            debug!(pattern, "pattern not supported, generating a random string");
        }

        self.random_alphanumeric(constraints.min_length, constraints.max_length)
    }

    fn format_string(&mut self, format: &str) -> Option<String> {
        let now = Utc::now();
        let value = match format {
            "date-time" => now.to_rfc3339(),
            "date" => now.format("%Y-%m-%d").to_string(),
            "time" => now.format("%H:%M:%S").to_string(),
            "email" => heuristics::fake_string(heuristics::StringHeuristic::Email, &mut *self.rng),
            "hostname" => self.hostname(),
            "ipv4" => {
                let octets: Vec<String> = (0..4)
                    .map(|_| self.rng.gen_range(0..=255u8).to_string())
                    .collect();
                octets.join(".")
            }
            "ipv6" => IPV6_PLACEHOLDER.to_string(),
            "uri" | "url" => format!("https://{}", self.hostname()),
            "uuid" => random_uuid(&mut *self.rng),
            _ => return None,
        };
        Some(value)
    }

    fn hostname(&mut self) -> String {
        let label: String = Word().fake_with_rng(&mut *self.rng);
        let suffix: String = DomainSuffix().fake_with_rng(&mut *self.rng);
        format!("{}.{}", label.to_lowercase(), suffix)
    }

    fn random_alphanumeric(&mut self, min_length: Option<usize>, max_length: Option<usize>) -> String {
        let (min, max) = length_range(min_length, max_length, 5);
        let len = self.rng.gen_range(min..=max);
        (0..len)
            .map(|_| self.rng.sample(Alphanumeric) as char)
            .collect()
    }

    // ------------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------------

    fn synthesize_number(
        &mut self,
        node: &SchemaNode,
        hint: Option<&str>,
        integer: bool,
        strict: bool,
    ) -> Value {
        let constraints = &node.numeric;
        let step = constraints
            .multiple_of
            .unwrap_or(if integer { 1.0 } else { 0.01 });
        let (min, max) = effective_bounds(constraints.minimum, constraints.maximum, step, strict);

        if let Some(heuristic) = hint.and_then(heuristics::classify_number) {
            let mut value = heuristics::fake_number(heuristic, integer, &mut *self.rng);
            if constraints.minimum.is_some() {
                value = value.max(min);
            }
            if constraints.maximum.is_some() {
                value = value.min(max);
            }
            return if integer {
                integral_within(value, min, max)
            } else {
                number_value(value, false)
            };
        }

        if let Some(multiple) = constraints.multiple_of {
            let steps = ((max - min) / multiple).floor().max(0.0);
            let steps = if steps.is_finite() { steps as u64 } else { u64::MAX };
            let k = self.rng.gen_range(0..=steps);
            let value = round_to_step(min + k as f64 * multiple).min(max).max(min);
            return if integer {
                integral_within(value, min, max)
            } else {
                number_value(value, false)
            };
        }

        if integer {
            let lo = min.ceil();
            let hi = max.floor();
            if lo > hi {
                return integral_within(min, min, max);
            }
            let value = if lo >= i64::MIN as f64 && hi <= i64::MAX as f64 {
                self.rng.gen_range(lo as i64..=hi as i64) as f64
            } else {
                // Floats this large are already whole numbers
                self.uniform(lo, hi).floor().max(lo)
            };
            return number_value(value, true);
        }

        number_value(self.uniform(min, max), false)
    }

    /// Uniform draw from `[min, max]` that survives spans wider than `f64::MAX`
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            min
        } else if (max - min).is_finite() {
            self.rng.gen_range(min..=max)
        } else {
            let t: f64 = self.rng.gen();
            (min * (1.0 - t) + max * t).max(min).min(max)
        }
    }

    // ------------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------------

    fn synthesize_array(
        &mut self,
        node: &SchemaNode,
        ctx: &mut ResolutionContext<'_>,
        hint: Option<&str>,
    ) -> EngineResult<Value> {
        let shape = &node.array;
        let strict = ctx.strict();
        let min_items = shape.min_items.or(Some(if strict { 1 } else { 0 }));
        let (min, max) = length_range(min_items, shape.max_items, if strict { 2 } else { 5 });
        let count = self.rng.gen_range(min..=max);

        let mut items = Vec::with_capacity(count);
        match &shape.items {
            Some(Items::Tuple(schemas)) => {
                for schema in schemas.iter().take(count) {
                    items.push(self.synthesize(schema, ctx, hint)?);
                }
            }
            Some(Items::Single(schema)) => {
                for _ in 0..count {
                    items.push(self.synthesize(schema, ctx, hint)?);
                }
            }
            None => {
                for _ in 0..count {
                    items.push(Value::String(self.random_alphanumeric(None, None)));
                }
            }
        }
        Ok(Value::Array(items))
    }

    fn synthesize_object(
        &mut self,
        node: &SchemaNode,
        ctx: &mut ResolutionContext<'_>,
    ) -> EngineResult<Value> {
        let shape = &node.object;
        let mut out = Map::new();

        for (name, schema) in &shape.properties {
            let include = shape.is_required(name) || !ctx.strict() || self.rng.gen_bool(0.9);
            if include {
                let value = self.synthesize(schema, ctx, Some(name))?;
                out.insert(name.clone(), value);
            }
        }

        match &shape.additional {
            Some(AdditionalProperties::Schema(schema)) => {
                let extra = self.rng.gen_range(0..=3);
                for i in 0..extra {
                    let key = format!("extra_{}", i);
                    if !out.contains_key(&key) {
                        let value = self.synthesize(schema, ctx, None)?;
                        out.insert(key, value);
                    }
                }
            }
            Some(AdditionalProperties::Any) => {
                let extra = self.rng.gen_range(0..=3);
                for i in 0..extra {
                    let key = format!("extra_{}", i);
                    if !out.contains_key(&key) {
                        let word: String = Word().fake_with_rng(&mut *self.rng);
                        out.insert(key, Value::String(word));
                    }
                }
            }
            None => {}
        }

        Ok(Value::Object(out))
    }
}

/// Length bounds with the default maximum `max(min + extra, 10)`, both ends
/// capped at [`MAX_GENERATED_LEN`]
fn length_range(min: Option<usize>, max: Option<usize>, extra: usize) -> (usize, usize) {
    let declared_min = min.unwrap_or(0);
    if declared_min > MAX_GENERATED_LEN {
        warn!(declared_min, cap = MAX_GENERATED_LEN, "declared length above the cap, truncating");
    }
    let min = declared_min.min(MAX_GENERATED_LEN);
    let max = max
        .unwrap_or_else(|| min.saturating_add(extra).max(10))
        .clamp(min, MAX_GENERATED_LEN);
    (min, max)
}

/// Resolve declared bounds, defaults, and exclusivity into a closed range.
///
/// A lone declared bound that falls outside the default range drags the other
/// end along so the range stays non-empty.
fn effective_bounds(
    minimum: Option<Bound>,
    maximum: Option<Bound>,
    step: f64,
    strict: bool,
) -> (f64, f64) {
    let (default_min, default_max) = if strict { (0.0, 100.0) } else { (-100.0, 1000.0) };
    let span = default_max - default_min;

    let min = minimum.map(|b| match b {
        Bound::Inclusive(v) => v,
        Bound::Exclusive(v) => v + step,
    });
    let max = maximum.map(|b| match b {
        Bound::Inclusive(v) => v,
        Bound::Exclusive(v) => v - step,
    });

    let (min, max) = match (min, max) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => (lo, if lo > default_max { lo + span } else { default_max }),
        (None, Some(hi)) => (if hi < default_min { hi - span } else { default_min }, hi),
        (None, None) => (default_min, default_max),
    };
    (min, max.max(min))
}

fn round_to_step(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

/// Snap `value` to a whole number inside `[min, max]`. A range holding no
/// whole number keeps `value` as is, so the bounds win over integrality.
fn integral_within(value: f64, min: f64, max: f64) -> Value {
    let mut snapped = value.round();
    if snapped > max {
        snapped = value.floor();
    }
    if snapped < min {
        snapped = value.ceil();
    }
    if (min..=max).contains(&snapped) {
        number_value(snapped, true)
    } else {
        warn!(min, max, "integer schema admits no whole number, emitting {}", value);
        number_value(value, false)
    }
}

/// Integers are emitted integral when they fit an `i64`
fn number_value(value: f64, integer: bool) -> Value {
    if integer && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        Value::from(value.round() as i64)
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}
