// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-process `DocStore<T>`, for unit and integration tests, mirroring
//! the teacher's `test-support`-gated fakes. Documents are held as raw
//! `serde_json::Value` so `cas_update`'s dotted-path `set_ops` can be
//! applied the same way a real adapter would apply them at the wire level.

use async_trait::async_trait;
use civault_core::docstore::{BulkUpsertOp, DocId, DocStore, DocStoreError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sets `root.<path>` to `new_value`, creating intermediate objects as
/// needed. Never panics: a path segment that collides with a non-object
/// value simply replaces that value with a fresh object and continues.
fn set_path(root: &mut Value, path: &str, new_value: Value) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = root;
    for (i, part) in parts.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if i == parts.len() - 1 {
            map.insert((*part).to_string(), new_value);
            return;
        }
        current = map.entry((*part).to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
}

fn apply_set_ops(root: &mut Value, set_ops: &Value) {
    if let Some(map) = set_ops.as_object() {
        for (path, value) in map {
            set_path(root, path, value.clone());
        }
    }
}

fn doc_version(value: &Value) -> u64 {
    value.get("_version").and_then(Value::as_u64).unwrap_or(0)
}

struct Slot {
    value: Value,
}

pub struct MemoryDocStore<T> {
    docs: Mutex<HashMap<DocId, Slot>>,
    keys: Mutex<HashMap<String, DocId>>,
    next_id: AtomicU64,
    _marker: PhantomData<T>,
}

impl<T> Default for MemoryDocStore<T> {
    fn default() -> Self {
        Self { docs: Mutex::new(HashMap::new()), keys: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1), _marker: PhantomData }
    }
}

impl<T> MemoryDocStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&self) -> DocId {
        DocId(format!("mem-{}", self.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

#[async_trait]
impl<T> DocStore<T> for MemoryDocStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn open_collection(&self) -> Result<(), DocStoreError> {
        Ok(())
    }

    async fn find_or_create_by_key(&self, key: Value, default: T) -> Result<(DocId, T, bool), DocStoreError> {
        let key_str = key.to_string();
        let mut keys = self.keys.lock();
        if let Some(id) = keys.get(&key_str).cloned() {
            let docs = self.docs.lock();
            let slot = docs.get(&id).ok_or_else(|| DocStoreError::Unexpected("key index points at a missing doc".to_string()))?;
            let doc = serde_json::from_value(slot.value.clone()).map_err(|e| DocStoreError::Serde(e.to_string()))?;
            return Ok((id, doc, false));
        }

        let id = self.alloc_id();
        let value = serde_json::to_value(&default).map_err(|e| DocStoreError::Serde(e.to_string()))?;
        self.docs.lock().insert(id.clone(), Slot { value });
        keys.insert(key_str, id.clone());
        Ok((id, default, true))
    }

    async fn get(&self, id: &DocId) -> Result<Option<T>, DocStoreError> {
        let docs = self.docs.lock();
        match docs.get(id) {
            Some(slot) => Ok(Some(serde_json::from_value(slot.value.clone()).map_err(|e| DocStoreError::Serde(e.to_string()))?)),
            None => Ok(None),
        }
    }

    async fn cas_update(&self, id: &DocId, expected_version: u64, set_ops: Value) -> Result<bool, DocStoreError> {
        let mut docs = self.docs.lock();
        let Some(slot) = docs.get_mut(id) else {
            return Ok(false);
        };
        if doc_version(&slot.value) != expected_version {
            return Ok(false);
        }
        apply_set_ops(&mut slot.value, &set_ops);
        set_path(&mut slot.value, "_version", Value::from(expected_version + 1));
        Ok(true)
    }

    async fn insert(&self, doc: T) -> Result<(), DocStoreError> {
        let id = self.alloc_id();
        let value = serde_json::to_value(&doc).map_err(|e| DocStoreError::Serde(e.to_string()))?;
        self.docs.lock().insert(id, Slot { value });
        Ok(())
    }

    async fn bulk_upsert(&self, ops: Vec<BulkUpsertOp<T>>) -> Result<usize, DocStoreError> {
        let mut applied = 0usize;
        for op in ops {
            let key_str = op.key.to_string();
            let value = serde_json::to_value(&op.doc).map_err(|e| DocStoreError::Serde(e.to_string()))?;
            let mut keys = self.keys.lock();
            let id = keys.get(&key_str).cloned().unwrap_or_else(|| self.alloc_id());
            self.docs.lock().insert(id.clone(), Slot { value });
            keys.insert(key_str, id);
            applied += 1;
        }
        Ok(applied)
    }

    async fn close(&self) -> Result<(), DocStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn find_or_create_creates_then_finds() {
        let store: MemoryDocStore<Value> = MemoryDocStore::new();
        let key = json!({"type": "koji-build", "aid": "1"});
        let (id1, _doc, created1) = store.find_or_create_by_key(key.clone(), json!({"_version": 1})).await.unwrap();
        assert!(created1);
        let (id2, _doc, created2) = store.find_or_create_by_key(key, json!({"_version": 1})).await.unwrap();
        assert!(!created2);
        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn cas_update_applies_dotted_paths_and_bumps_version() {
        let store: MemoryDocStore<Value> = MemoryDocStore::new();
        let (id, _doc, _created) = store
            .find_or_create_by_key(json!({"type": "koji-build", "aid": "1"}), json!({"_version": 1}))
            .await
            .unwrap();

        let applied = store
            .cas_update(&id, 1, json!({"payload.nvr": "foo-1.0-1.fc40"}))
            .await
            .unwrap();
        assert!(applied);

        let doc = store.get(&id).await.unwrap().unwrap();
        assert_eq!(doc.pointer("/payload/nvr").and_then(Value::as_str), Some("foo-1.0-1.fc40"));
        assert_eq!(doc.get("_version").and_then(Value::as_u64), Some(2));
    }

    #[tokio::test]
    async fn cas_update_rejects_stale_version() {
        let store: MemoryDocStore<Value> = MemoryDocStore::new();
        let (id, _doc, _created) = store
            .find_or_create_by_key(json!({"type": "koji-build", "aid": "1"}), json!({"_version": 1}))
            .await
            .unwrap();

        let applied = store.cas_update(&id, 99, json!({"payload.nvr": "x"})).await.unwrap();
        assert!(!applied);
    }
}
