//! Capacity-bounded LRU result cache, one per cache name, safe to share between requests.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub struct LruCache {
    capacity: usize,
    inner: Mutex<LruInner>,
}

#[derive(Default)]
struct LruInner {
    entries: HashMap<String, (Value, u64)>,
    /// Access tick -> key, oldest first.
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl LruInner {
    fn touch(&mut self, key: &str) -> Option<Value> {
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.1);
        self.tick += 1;
        entry.1 = self.tick;
        self.recency.insert(self.tick, key.to_string());
        Some(entry.0.clone())
    }
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            capacity: capacity.max(1),
            inner: Mutex::new(LruInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().touch(key)
    }

    /// Insert or replace `key`, evicting least recently used entries beyond capacity.
    pub fn put(&self, key: String, value: Value) {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        if let Some((_, old)) = inner.entries.insert(key.clone(), (value, tick)) {
            inner.recency.remove(&old);
        }
        inner.recency.insert(tick, key);
        while inner.entries.len() > self.capacity {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock();
        let (value, tick) = inner.entries.remove(key)?;
        inner.recency.remove(&tick);
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for a call argument: strings and numbers verbatim, objects by their `name` field
/// when present, anything else by its JSON text. No argument is the empty key.
pub fn cache_key(arg: Option<&Value>) -> String {
    match arg {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Object(map)) => match map.get("name") {
            Some(Value::String(s)) => s.clone(),
            Some(v) if !v.is_null() => v.to_string(),
            _ => Value::Object(map.clone()).to_string(),
        },
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evicts_least_recently_used() {
        let cache = LruCache::new(2);
        cache.put("a".into(), json!(1));
        cache.put("b".into(), json!(2));
        assert_eq!(cache.get("a"), Some(json!(1)));
        cache.put("c".into(), json!(3));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(json!(1)));
        assert_eq!(cache.get("c"), Some(json!(3)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replacing_a_key_keeps_size() {
        let cache = LruCache::new(2);
        cache.put("a".into(), json!(1));
        cache.put("a".into(), json!(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), Some(json!(2)));
        assert_eq!(cache.remove("a"), Some(json!(2)));
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_derive_from_argument_shape() {
        assert_eq!(cache_key(None), "");
        assert_eq!(cache_key(Some(&json!("u1"))), "u1");
        assert_eq!(cache_key(Some(&json!(42))), "42");
        assert_eq!(cache_key(Some(&json!({"name": "ann", "id": 1}))), "ann");
        assert_eq!(cache_key(Some(&json!({"id": 1}))), r#"{"id":1}"#);
    }
}
