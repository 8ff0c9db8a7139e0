use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// String form of an id, so `"7"` and `7` compare equal
pub fn id_key(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordered collection of generated objects for one resource
#[derive(Debug, Default, Clone)]
pub struct ResourceState {
    items: Vec<Value>,
}

impl ResourceState {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn id_of(item: &Value) -> Option<String> {
        item.get("id").map(id_key)
    }

    pub fn find(&self, id: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|item| Self::id_of(item).as_deref() == Some(id))
    }

    /// Append an item, replacing any existing item with the same id
    pub fn append(&mut self, item: Value) {
        if let Some(id) = Self::id_of(&item) {
            self.items.retain(|existing| Self::id_of(existing).as_deref() != Some(&id));
        }
        self.items.push(item);
    }

    /// Replace the item with the same id in place, or append it
    pub fn upsert(&mut self, item: Value) {
        let id = Self::id_of(&item);
        let position = id.as_deref().and_then(|id| {
            self.items
                .iter()
                .position(|existing| Self::id_of(existing).as_deref() == Some(id))
        });
        match position {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| Self::id_of(item).as_deref() != Some(id));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Per-resource collections owned by one server instance.
///
/// Each resource sits behind its own mutex so a read-modify-write on one
/// resource never blocks another.
#[derive(Clone, Default)]
pub struct ResourceStore {
    resources: Arc<RwLock<HashMap<String, Arc<Mutex<ResourceState>>>>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on a resource's state, created empty on first access
    pub async fn collection(&self, name: &str) -> Arc<Mutex<ResourceState>> {
        if let Some(existing) = self.resources.read().await.get(name) {
            return existing.clone();
        }
        let mut resources = self.resources.write().await;
        resources
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ResourceState::default())))
            .clone()
    }

    /// Every resource's items, for inspection
    pub async fn snapshot(&self) -> Map<String, Value> {
        let mut handles: Vec<(String, Arc<Mutex<ResourceState>>)> = {
            let resources = self.resources.read().await;
            resources
                .iter()
                .map(|(name, state)| (name.clone(), state.clone()))
                .collect()
        };

        handles.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = Map::new();
        for (name, state) in handles {
            let state = state.lock().await;
            out.insert(name, Value::Array(state.items().to_vec()));
        }
        out
    }

    pub async fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Clear one resource. Returns false if it was never touched.
    pub async fn reset(&self, name: &str) -> bool {
        let handle = self.resources.read().await.get(name).cloned();
        match handle {
            Some(state) => {
                state.lock().await.clear();
                true
            }
            None => false,
        }
    }

    pub async fn reset_all(&self) {
        let handles: Vec<_> = self.resources.read().await.values().cloned().collect();
        for state in handles {
            state.lock().await.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_compare_by_string_form() {
        let mut state = ResourceState::default();
        state.append(json!({"id": 7, "name": "seven"}));
        assert_eq!(state.find("7").unwrap()["name"], json!("seven"));
        assert!(state.remove("7"));
        assert!(state.is_empty());
    }

    #[test]
    fn test_append_keeps_ids_unique() {
        let mut state = ResourceState::default();
        state.append(json!({"id": "a", "v": 1}));
        state.append(json!({"id": "b", "v": 1}));
        state.append(json!({"id": "a", "v": 2}));
        assert_eq!(state.len(), 2);
        assert_eq!(state.find("a").unwrap()["v"], json!(2));
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut state = ResourceState::default();
        state.append(json!({"id": "a"}));
        state.append(json!({"id": "b"}));
        state.upsert(json!({"id": "a", "v": 3}));
        assert_eq!(state.items()[0], json!({"id": "a", "v": 3}));
        state.upsert(json!({"id": "c"}));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut state = ResourceState::default();
        state.append(json!({"id": "a"}));
        assert!(!state.remove("zzz"));
        assert_eq!(state.len(), 1);
    }

    #[tokio::test]
    async fn test_collection_is_shared() {
        let store = ResourceStore::new();
        store.collection("users").await.lock().await.append(json!({"id": 1}));

        let users = store.collection("users").await;
        assert_eq!(users.lock().await.len(), 1);
        assert_eq!(store.resource_names().await, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_and_reset() {
        let store = ResourceStore::new();
        store.collection("b").await.lock().await.append(json!({"id": 1}));
        store.collection("a").await.lock().await.append(json!({"id": 2}));

        let snapshot = store.snapshot().await;
        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, ["a", "b"]);

        assert!(store.reset("a").await);
        assert!(!store.reset("missing").await);
        assert_eq!(store.snapshot().await["a"], json!([]));

        store.reset_all().await;
        assert_eq!(store.snapshot().await["b"], json!([]));
    }
}
