// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup and shutdown orchestration: wires the schema registry, queue,
//! docstores, and router into a [`Loader`], and tears them down cleanly.

use crate::config::Config;
use crate::loader::Loader;
use crate::store;
use civault_core::{DirectorySchemaSource, SchemaLoadError, SchemaRegistry, SchemaRegistryValidator, SystemClock};
use civault_queue::{FileQueue, FileQueueConfig, QueueError};
use civault_router::{default_routes, HubRegistry, Router};
use civault_store::sideline::{InvalidStore, UnknownTopicStore};
use civault_updater::{BulkAccumulator, BulkConfig};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load schemas: {0}")]
    Schema(#[from] SchemaLoadError),
    #[error("failed to open file queue: {0}")]
    Queue(#[from] QueueError),
    #[error("failed to open docstore: {0}")]
    Docstore(#[from] store::OpenStoreError),
}

/// Everything [`Loader::run`] needs, plus the handles `shutdown` uses to
/// tear the same resources back down.
pub struct Daemon {
    loader: Loader,
    queue: FileQueue,
    schema_refresh: tokio::task::JoinHandle<()>,
}

impl Daemon {
    pub async fn start(config: &Config) -> Result<Self, StartupError> {
        let schema_source = DirectorySchemaSource::new(config.schema.dir.clone());
        let schema_registry = Arc::new(SchemaRegistry::load_from(&schema_source)?);
        let schema_refresh = spawn_schema_refresh(schema_registry.clone(), config.schema.dir.clone(), config.schema.refresh_interval());
        let validator = Box::new(SchemaRegistryValidator::new(schema_registry.clone()));

        let queue = FileQueue::open(
            &config.queue.dir,
            FileQueueConfig { poll_interval: config.queue.poll_interval(), optimize_list: config.queue.optimize_list },
        )
        .await?;

        let artifact_store = store::open_store(&config.docstore, &config.docstore.artifacts_collection, store::artifact_indexes()).await?;
        let invalid_backing = store::open_store(&config.docstore, &config.docstore.invalid_collection, store::ConfiguredIndexes::none()).await?;
        let unknown_backing =
            store::open_store(&config.docstore, &config.docstore.unknown_topic_collection, store::ConfiguredIndexes::none()).await?;

        let invalid_store = InvalidStore::new(invalid_backing, SystemClock);
        let unknown_topic_store = UnknownTopicStore::new(unknown_backing, SystemClock);

        // No concrete Koji/Brew hub client ships in this binary: resolving
        // build-tag events against the real XML-RPC hub is an injected
        // capability, same as the AMQP listener upstream of the queue.
        // Tag routes simply have no handler until a deployment supplies one.
        let hubs = HubRegistry::new();
        let router = Router::new(default_routes(&hubs));

        let bulk = config.bulk.enabled.then(|| {
            BulkAccumulator::new(BulkConfig {
                max_ops: config.bulk.max_ops,
                max_bytes: config.bulk.max_bytes,
                idle_gap: config.bulk.idle_gap(),
            })
        });

        let loader = Loader { queue: queue.clone(), router, validator, store: artifact_store, invalid_store, unknown_topic_store, bulk };

        Ok(Self { loader, queue, schema_refresh })
    }

    pub async fn run(self) -> crate::loader::LoopExit {
        let exit = self.loader.run().await;
        self.schema_refresh.abort();
        exit
    }

    /// A handle whose `stop()` ends the loop gracefully: the in-flight
    /// `tpop` call in `run` wakes up and returns `Ok(None)`.
    pub fn queue_handle(&self) -> FileQueue {
        self.queue.clone()
    }
}

fn spawn_schema_refresh(registry: Arc<SchemaRegistry>, dir: std::path::PathBuf, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let source = DirectorySchemaSource::new(dir);
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = registry.refresh(&source) {
                tracing::warn!(error = %e, "schema refresh failed, keeping previous snapshot");
            }
        }
    })
}

