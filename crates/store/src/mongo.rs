// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The primary-store `DocStore` adapter, backed by a Mongo collection and
//! its `_version` field for compare-and-swap updates.

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{doc, Document};
use civault_core::docstore::{BulkUpsertOp, DocId, DocStore, DocStoreError};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Instant;

/// Wraps a document with the Mongo `_id` Mongo itself assigns, flattening
/// the application document's own fields (including its `_version`) at the
/// top level so callers see the same shape on the wire either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(flatten)]
    doc: T,
}

/// A `DocStore<T>` backed by a single Mongo collection, using `open_collection`
/// to reconcile the collection's indexes against a declared set and `_version`
/// equality as the compare-and-swap predicate.
pub struct MongoDocStore<T> {
    client: Client,
    collection: Collection<Envelope<T>>,
    indexes: Vec<IndexModel>,
    _marker: PhantomData<T>,
}

impl<T> MongoDocStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(client: Client, db_name: &str, collection_name: &str, indexes: Vec<IndexModel>) -> Self {
        let collection = client.database(db_name).collection(collection_name);
        Self { client, collection, indexes, _marker: PhantomData }
    }

    fn object_id(id: &DocId) -> Result<ObjectId, DocStoreError> {
        ObjectId::parse_str(id.as_str())
            .map_err(|e| DocStoreError::Unexpected(format!("doc id {id} is not an object id: {e}")))
    }

    fn key_filter(key: &Value) -> Result<Document, DocStoreError> {
        bson::to_document(key).map_err(|e| DocStoreError::Serde(e.to_string()))
    }
}

fn index_name(model: &IndexModel) -> Option<String> {
    model.options.as_ref().and_then(|opts: &IndexOptions| opts.name.clone())
}

#[async_trait]
impl<T> DocStore<T> for MongoDocStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + Clone,
{
    async fn open_collection(&self) -> Result<(), DocStoreError> {
        let start = Instant::now();
        let mut existing = self
            .collection
            .list_index_names()
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?
            .into_iter()
            .collect::<HashSet<_>>();
        existing.remove("_id_");

        let declared = self.indexes.iter().filter_map(index_name).collect::<HashSet<_>>();

        for stale in existing.difference(&declared) {
            self.collection
                .drop_index(stale)
                .await
                .map_err(|e| DocStoreError::Connection(e.to_string()))?;
            tracing::info!(index = %stale, "dropped stale index");
        }

        let missing: Vec<IndexModel> = self
            .indexes
            .iter()
            .filter(|model| index_name(model).map(|name| !existing.contains(&name)).unwrap_or(true))
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.collection
                .create_indexes(missing)
                .await
                .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(elapsed_ms, "reconciled collection indexes");
        Ok(())
    }

    async fn find_or_create_by_key(&self, key: Value, default: T) -> Result<(DocId, T, bool), DocStoreError> {
        let filter = Self::key_filter(&key)?;
        let start = Instant::now();

        if let Some(found) = self
            .collection
            .find_one(filter.clone())
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?
        {
            return Ok((DocId(found.id.to_hex()), found.doc, false));
        }

        let envelope = Envelope { id: ObjectId::new(), doc: default };
        match self.collection.insert_one(&envelope).await {
            Ok(_) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                tracing::debug!(elapsed_ms, "created document");
                Ok((DocId(envelope.id.to_hex()), envelope.doc, true))
            }
            Err(e) if e.to_string().contains("E11000") => {
                // Lost the create race to another loader; the winner's
                // document is now there for us to read.
                let found = self
                    .collection
                    .find_one(filter)
                    .await
                    .map_err(|e| DocStoreError::Connection(e.to_string()))?
                    .ok_or_else(|| DocStoreError::Unexpected("racing insert vanished".to_string()))?;
                Ok((DocId(found.id.to_hex()), found.doc, false))
            }
            Err(e) => Err(DocStoreError::Connection(e.to_string())),
        }
    }

    async fn get(&self, id: &DocId) -> Result<Option<T>, DocStoreError> {
        let object_id = Self::object_id(id)?;
        let found = self
            .collection
            .find_one(doc! {"_id": object_id})
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        Ok(found.map(|envelope| envelope.doc))
    }

    async fn cas_update(&self, id: &DocId, expected_version: u64, set_ops: Value) -> Result<bool, DocStoreError> {
        let object_id = Self::object_id(id)?;
        let set_doc = bson::to_document(&set_ops).map_err(|e| DocStoreError::Serde(e.to_string()))?;
        let filter = doc! {"_id": object_id, "_version": expected_version as i64};
        let update = doc! {"$set": set_doc, "$inc": {"_version": 1i64}};

        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        Ok(result.modified_count == 1)
    }

    async fn insert(&self, doc_value: T) -> Result<(), DocStoreError> {
        let envelope = Envelope { id: ObjectId::new(), doc: doc_value };
        self.collection
            .insert_one(&envelope)
            .await
            .map_err(|e| DocStoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn bulk_upsert(&self, ops: Vec<BulkUpsertOp<T>>) -> Result<usize, DocStoreError> {
        // Mongo is the CAS primary-store path, not the bulk-indexed path;
        // fall back to sequential per-op upserts.
        let mut applied = 0usize;
        for op in ops {
            let filter = Self::key_filter(&op.key)?;
            let set_doc = bson::to_document(&op.doc).map_err(|e| DocStoreError::Serde(e.to_string()))?;
            let update = doc! {"$set": set_doc};
            self.collection
                .update_one(filter, update)
                .upsert(true)
                .await
                .map_err(|e| DocStoreError::Connection(e.to_string()))?;
            applied += 1;
        }
        Ok(applied)
    }

    async fn close(&self) -> Result<(), DocStoreError> {
        tracing::info!(client = ?self.client.default_database().map(|db| db.name().to_string()), "closing mongo docstore");
        Ok(())
    }
}
