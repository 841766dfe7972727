// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Picks the configured `DocStore` backend and opens it as one of a small
//! closed set of concrete adapters, so the rest of the daemon can stay
//! generic over a single `DocStore<T>` without a boxed trait object per
//! call.

use crate::config::{Backend, DocstoreConfig};
use async_trait::async_trait;
use civault_core::docstore::{BulkUpsertOp, DocId, DocStore, DocStoreError};
use civault_store::MemoryDocStore;
#[cfg(feature = "mongo")]
use civault_store::MongoDocStore;
#[cfg(feature = "opensearch-backend")]
use civault_store::OpenSearchDocStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub enum AnyDocStore<T> {
    Memory(MemoryDocStore<T>),
    #[cfg(feature = "mongo")]
    Mongo(MongoDocStore<T>),
    #[cfg(feature = "opensearch-backend")]
    OpenSearch(OpenSearchDocStore<T>),
}

#[async_trait]
impl<T> DocStore<T> for AnyDocStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + Clone,
{
    async fn open_collection(&self) -> Result<(), DocStoreError> {
        match self {
            AnyDocStore::Memory(s) => s.open_collection().await,
            #[cfg(feature = "mongo")]
            AnyDocStore::Mongo(s) => s.open_collection().await,
            #[cfg(feature = "opensearch-backend")]
            AnyDocStore::OpenSearch(s) => s.open_collection().await,
        }
    }

    async fn find_or_create_by_key(&self, key: Value, default: T) -> Result<(DocId, T, bool), DocStoreError> {
        match self {
            AnyDocStore::Memory(s) => s.find_or_create_by_key(key, default).await,
            #[cfg(feature = "mongo")]
            AnyDocStore::Mongo(s) => s.find_or_create_by_key(key, default).await,
            #[cfg(feature = "opensearch-backend")]
            AnyDocStore::OpenSearch(s) => s.find_or_create_by_key(key, default).await,
        }
    }

    async fn get(&self, id: &DocId) -> Result<Option<T>, DocStoreError> {
        match self {
            AnyDocStore::Memory(s) => s.get(id).await,
            #[cfg(feature = "mongo")]
            AnyDocStore::Mongo(s) => s.get(id).await,
            #[cfg(feature = "opensearch-backend")]
            AnyDocStore::OpenSearch(s) => s.get(id).await,
        }
    }

    async fn cas_update(&self, id: &DocId, expected_version: u64, set_ops: Value) -> Result<bool, DocStoreError> {
        match self {
            AnyDocStore::Memory(s) => s.cas_update(id, expected_version, set_ops).await,
            #[cfg(feature = "mongo")]
            AnyDocStore::Mongo(s) => s.cas_update(id, expected_version, set_ops).await,
            #[cfg(feature = "opensearch-backend")]
            AnyDocStore::OpenSearch(s) => s.cas_update(id, expected_version, set_ops).await,
        }
    }

    async fn insert(&self, doc: T) -> Result<(), DocStoreError> {
        match self {
            AnyDocStore::Memory(s) => s.insert(doc).await,
            #[cfg(feature = "mongo")]
            AnyDocStore::Mongo(s) => s.insert(doc).await,
            #[cfg(feature = "opensearch-backend")]
            AnyDocStore::OpenSearch(s) => s.insert(doc).await,
        }
    }

    async fn bulk_upsert(&self, ops: Vec<BulkUpsertOp<T>>) -> Result<usize, DocStoreError> {
        match self {
            AnyDocStore::Memory(s) => s.bulk_upsert(ops).await,
            #[cfg(feature = "mongo")]
            AnyDocStore::Mongo(s) => s.bulk_upsert(ops).await,
            #[cfg(feature = "opensearch-backend")]
            AnyDocStore::OpenSearch(s) => s.bulk_upsert(ops).await,
        }
    }

    async fn close(&self) -> Result<(), DocStoreError> {
        match self {
            AnyDocStore::Memory(s) => s.close().await,
            #[cfg(feature = "mongo")]
            AnyDocStore::Mongo(s) => s.close().await,
            #[cfg(feature = "opensearch-backend")]
            AnyDocStore::OpenSearch(s) => s.close().await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OpenStoreError {
    #[error("backend {backend:?} requires docstore.uri")]
    MissingUri { backend: Backend },
    #[error("backend {0:?} was not compiled into this binary")]
    BackendDisabled(Backend),
    #[error("docstore connection failed: {0}")]
    Connection(#[from] DocStoreError),
    #[cfg(feature = "mongo")]
    #[error("mongo client error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[cfg(feature = "opensearch-backend")]
    #[error("opensearch transport error: {0}")]
    OpenSearchTransport(#[from] opensearch::http::transport::BuildError),
}

/// Opens `collection` against the configured backend, reconciling its
/// indexes before returning.
pub async fn open_store<T>(config: &DocstoreConfig, collection: &str, indexes: ConfiguredIndexes) -> Result<AnyDocStore<T>, OpenStoreError>
where
    T: Serialize + DeserializeOwned + Send + Sync + Clone,
{
    let store = match config.backend {
        Backend::Memory => AnyDocStore::Memory(MemoryDocStore::new()),
        #[cfg(feature = "mongo")]
        Backend::Mongo => {
            let uri = config.uri.as_deref().ok_or(OpenStoreError::MissingUri { backend: Backend::Mongo })?;
            let client = mongodb::Client::with_uri_str(uri).await?;
            let database = config.database.as_deref().unwrap_or("civault");
            AnyDocStore::Mongo(MongoDocStore::new(client, database, collection, indexes.into_mongo()))
        }
        #[cfg(not(feature = "mongo"))]
        Backend::Mongo => return Err(OpenStoreError::BackendDisabled(Backend::Mongo)),
        #[cfg(feature = "opensearch-backend")]
        Backend::OpenSearch => {
            let uri = config.uri.as_deref().ok_or(OpenStoreError::MissingUri { backend: Backend::OpenSearch })?;
            let transport = opensearch::http::transport::TransportBuilder::new(opensearch::http::transport::SingleNodeConnectionPool::new(
                uri.parse().map_err(|_| OpenStoreError::MissingUri { backend: Backend::OpenSearch })?,
            ))
            .build()?;
            let client = opensearch::OpenSearch::new(transport);
            AnyDocStore::OpenSearch(OpenSearchDocStore::new(client, collection))
        }
        #[cfg(not(feature = "opensearch-backend"))]
        Backend::OpenSearch => return Err(OpenStoreError::BackendDisabled(Backend::OpenSearch)),
    };

    store.open_collection().await?;
    Ok(store)
}

/// The index set `open_collection` reconciles for the artifacts
/// collection. Sideline collections open with no secondary indexes.
#[derive(Default)]
pub struct ConfiguredIndexes {
    #[cfg(feature = "mongo")]
    pub mongo: Vec<mongodb::IndexModel>,
}

impl ConfiguredIndexes {
    pub fn none() -> Self {
        Self::default()
    }

    #[cfg(feature = "mongo")]
    pub fn into_mongo(self) -> Vec<mongodb::IndexModel> {
        self.mongo
    }

    #[cfg(not(feature = "mongo"))]
    pub fn into_mongo(self) -> Vec<()> {
        Vec::new()
    }
}

/// The `(type, aid)` uniqueness index every deployment needs on the
/// primary artifacts collection.
#[cfg(feature = "mongo")]
pub fn artifact_indexes() -> ConfiguredIndexes {
    use mongodb::bson::doc;
    use mongodb::options::IndexOptions;
    use mongodb::IndexModel;

    let model = IndexModel::builder()
        .keys(doc! {"type": 1, "aid": 1})
        .options(IndexOptions::builder().name("type_aid_unique".to_string()).unique(true).build())
        .build();
    ConfiguredIndexes { mongo: vec![model] }
}

#[cfg(not(feature = "mongo"))]
pub fn artifact_indexes() -> ConfiguredIndexes {
    ConfiguredIndexes::none()
}
