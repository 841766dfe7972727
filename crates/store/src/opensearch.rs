// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The indexed-store `DocStore` adapter, backed by an OpenSearch index.
//! Single-document compare-and-swap is expressed as a scripted (Painless)
//! update since OpenSearch has no native "update if field equals" verb;
//! `bulk_upsert` uses the native `_bulk` API, which is this backend's
//! primary write path.

use async_trait::async_trait;
use civault_core::docstore::{BulkUpsertOp, DocId, DocStore, DocStoreError};
use opensearch::http::request::JsonBody;
use opensearch::{BulkParts, GetParts, IndexParts, OpenSearch, SearchParts, UpdateParts};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::time::Instant;

pub struct OpenSearchDocStore<T> {
    client: OpenSearch,
    index: String,
    _marker: PhantomData<T>,
}

impl<T> OpenSearchDocStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(client: OpenSearch, index: impl Into<String>) -> Self {
        Self { client, index, _marker: PhantomData }
    }

    fn decode(hit: &Value) -> Result<(DocId, T), DocStoreError> {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| DocStoreError::Unexpected("hit missing _id".to_string()))?;
        let source = hit.get("_source").cloned().unwrap_or(Value::Null);
        let doc = serde_json::from_value(source).map_err(|e| DocStoreError::Serde(e.to_string()))?;
        Ok((DocId(id.to_string()), doc))
    }
}

#[async_trait]
impl<T> DocStore<T> for OpenSearchDocStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn open_collection(&self) -> Result<(), DocStoreError> {
        let exists = self
            .client
            .indices()
            .exists(opensearch::indices::IndicesExistsParts::Index(&[&self.index]))
            .send()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?
            .status_code()
            .is_success();

        if !exists {
            self.client
                .indices()
                .create(opensearch::indices::IndicesCreateParts::Index(&self.index))
                .body(json!({"mappings": {"properties": {"_version": {"type": "long"}}}}))
                .send()
                .await
                .map_err(|e| DocStoreError::Connection(e.to_string()))?;
            tracing::info!(index = %self.index, "created index");
        }
        Ok(())
    }

    async fn find_or_create_by_key(&self, key: Value, default: T) -> Result<(DocId, T, bool), DocStoreError> {
        let start = Instant::now();
        let must = key
            .as_object()
            .ok_or_else(|| DocStoreError::Unexpected("key must be an object".to_string()))?
            .iter()
            .map(|(field, value)| json!({"term": {field: value}}))
            .collect::<Vec<_>>();

        let response = self
            .client
            .search(SearchParts::Index(&[&self.index]))
            .body(json!({"size": 1, "query": {"bool": {"must": must}}}))
            .send()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        let body: Value = response.json().await.map_err(|e| DocStoreError::Serde(e.to_string()))?;
        let hits = body.pointer("/hits/hits").and_then(Value::as_array).cloned().unwrap_or_default();

        if let Some(hit) = hits.first() {
            let (id, doc) = Self::decode(hit)?;
            return Ok((id, doc, false));
        }

        let index_response = self
            .client
            .index(IndexParts::Index(&self.index))
            .body(&default)
            .send()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        let index_body: Value = index_response.json().await.map_err(|e| DocStoreError::Serde(e.to_string()))?;
        let id = index_body
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| DocStoreError::Unexpected("index response missing _id".to_string()))?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(elapsed_ms, %id, "created document");
        Ok((DocId(id.to_string()), default, true))
    }

    async fn get(&self, id: &DocId) -> Result<Option<T>, DocStoreError> {
        let response = self
            .client
            .get(GetParts::IndexId(&self.index, id.as_str()))
            .send()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        if response.status_code() == opensearch::http::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Value = response.json().await.map_err(|e| DocStoreError::Serde(e.to_string()))?;
        match body.get("_source").cloned() {
            Some(source) => Ok(Some(serde_json::from_value(source).map_err(|e| DocStoreError::Serde(e.to_string()))?)),
            None => Ok(None),
        }
    }

    async fn cas_update(&self, id: &DocId, expected_version: u64, set_ops: Value) -> Result<bool, DocStoreError> {
        let script = json!({
            "source": "if (ctx._source._version == params.expected) { \
                        params.set.forEach((k, v) -> ctx._source[k] = v); \
                        ctx._source._version += 1; \
                       } else { ctx.op = 'none'; }",
            "lang": "painless",
            "params": {"expected": expected_version, "set": set_ops},
        });

        let response = self
            .client
            .update(UpdateParts::IndexId(&self.index, id.as_str()))
            .body(json!({"script": script}))
            .send()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        let body: Value = response.json().await.map_err(|e| DocStoreError::Serde(e.to_string()))?;
        Ok(body.get("result").and_then(Value::as_str) == Some("updated"))
    }

    async fn insert(&self, doc: T) -> Result<(), DocStoreError> {
        self.client
            .index(IndexParts::Index(&self.index))
            .body(&doc)
            .send()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn bulk_upsert(&self, ops: Vec<BulkUpsertOp<T>>) -> Result<usize, DocStoreError> {
        if ops.is_empty() {
            return Ok(0);
        }
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(ops.len() * 2);
        for op in &ops {
            let id = op.key.to_string();
            body.push(JsonBody::new(json!({"index": {"_index": self.index, "_id": id}})));
            body.push(JsonBody::new(serde_json::to_value(&op.doc).map_err(|e| DocStoreError::Serde(e.to_string()))?));
        }

        let start = Instant::now();
        let response = self
            .client
            .bulk(BulkParts::Index(&self.index))
            .body(body)
            .send()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        let response_body: Value = response.json().await.map_err(|e| DocStoreError::Serde(e.to_string()))?;
        if response_body.get("errors").and_then(Value::as_bool) == Some(true) {
            return Err(DocStoreError::Unexpected("bulk request reported per-item errors".to_string()));
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(elapsed_ms, count = ops.len(), "bulk upsert applied");
        Ok(ops.len())
    }

    async fn close(&self) -> Result<(), DocStoreError> {
        Ok(())
    }
}
