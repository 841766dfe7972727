// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The document-store collaborator contract. Concrete adapters (Mongo,
//! OpenSearch, an in-memory fake) live in the storage crate; this module
//! only defines the seam handlers and the updater are written against.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An adapter-native document identifier (a Mongo `ObjectId` hex string, an
/// OpenSearch `_id`, or an in-memory key), opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub String);

impl DocId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One document in a `bulk_upsert` batch: `key` addresses it (e.g.
/// `{type, aid}`), `doc` is the full proposed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUpsertOp<T> {
    pub key: Value,
    pub doc: T,
}

/// A document-store collection holding documents of type `T`, addressed by
/// an opaque `DocId` plus an application-level key (e.g. `{type, aid}`).
///
/// Mirrors the collaborator's `openCollection` / `findOrCreateByKey` /
/// `casUpdate` / `insert` / `bulkUpsert` / `close` contract.
#[async_trait]
pub trait DocStore<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Ensures the backing collection/index exists and that its configured
    /// indexes are reconciled (missing ones created, extras other than the
    /// primary dropped).
    async fn open_collection(&self) -> Result<(), DocStoreError>;

    /// Finds the document addressed by `key`, creating it from `default` if
    /// absent. Returns the document's id, its current value, and whether it
    /// was just created.
    async fn find_or_create_by_key(&self, key: Value, default: T) -> Result<(DocId, T, bool), DocStoreError>;

    /// Reads the current value of a document by id, if it still exists.
    async fn get(&self, id: &DocId) -> Result<Option<T>, DocStoreError>;

    /// Conditional update: applies `set_ops` (an object of field paths to
    /// new values) only if the document at `id` is still at
    /// `expected_version`, incrementing its version on success. Returns
    /// whether exactly one existing document was modified.
    async fn cas_update(&self, id: &DocId, expected_version: u64, set_ops: Value) -> Result<bool, DocStoreError>;

    /// Writes a new document outright, for write-only sideline stores.
    async fn insert(&self, doc: T) -> Result<(), DocStoreError>;

    /// Atomic-per-op bulk write, for the indexed-store variant. Returns the
    /// number of operations applied.
    async fn bulk_upsert(&self, ops: Vec<BulkUpsertOp<T>>) -> Result<usize, DocStoreError>;

    async fn close(&self) -> Result<(), DocStoreError>;
}

#[derive(Debug, Error)]
pub enum DocStoreError {
    #[error("docstore connection error: {0}")]
    Connection(String),
    #[error("docstore operation timed out")]
    Timeout,
    #[error("docstore serialization error: {0}")]
    Serde(String),
    #[error("docstore reported an unexpected result: {0}")]
    Unexpected(String),
}
