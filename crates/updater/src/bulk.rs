// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The bulk-mode accumulator for the indexed-store variant: batches
//! upserts across envelopes and flushes on size, byte, or idle-gap
//! thresholds, committing or rolling back the whole batch's file-queue
//! entries together.

use crate::error::UpdaterError;
use civault_core::docstore::{BulkUpsertOp, DocStore};
use civault_core::ArtifactModel;
use civault_queue::PopHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct BulkConfig {
    pub max_ops: usize,
    pub max_bytes: usize,
    pub idle_gap: Duration,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { max_ops: 100, max_bytes: 8 * 1024 * 1024, idle_gap: Duration::from_secs(3) }
    }
}

/// Accumulates proposed upserts, pairing each with the queue handle of the
/// envelope that produced it so a flush result can resolve every one of
/// them together.
pub struct BulkAccumulator {
    config: BulkConfig,
    ops: Vec<BulkUpsertOp<ArtifactModel>>,
    handles: Vec<PopHandle>,
    byte_size: usize,
    last_push: Instant,
}

impl BulkAccumulator {
    pub fn new(config: BulkConfig) -> Self {
        Self { config, ops: Vec::new(), handles: Vec::new(), byte_size: 0, last_push: Instant::now() }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Adds one envelope's proposed document to the batch.
    pub fn push(&mut self, key: serde_json::Value, doc: ArtifactModel, handle: PopHandle) -> Result<(), UpdaterError> {
        let serialized = serde_json::to_vec(&doc).map_err(|e| UpdaterError::DocstoreFatal(e.to_string()))?;
        self.byte_size += serialized.len();
        self.ops.push(BulkUpsertOp { key, doc });
        self.handles.push(handle);
        self.last_push = Instant::now();
        Ok(())
    }

    /// Whether accumulated state crosses any flush threshold. The caller is
    /// expected to poll this on an idle timer as well as after every push,
    /// since the idle-gap trigger fires with no new envelope arriving.
    pub fn should_flush(&self) -> bool {
        !self.is_empty()
            && (self.ops.len() >= self.config.max_ops
                || self.byte_size >= self.config.max_bytes
                || self.last_push.elapsed() >= self.config.idle_gap)
    }

    /// Flushes the batch: on success, commits every accumulated file-queue
    /// entry and clears the batch. On failure, rolls every entry back to
    /// the head of the queue and returns a fatal error — the caller exits
    /// non-zero, letting the supervisor restart and redeliver them.
    pub async fn flush<S>(&mut self, store: &S) -> Result<usize, UpdaterError>
    where
        S: DocStore<ArtifactModel>,
    {
        if self.is_empty() {
            return Ok(0);
        }

        let ops = std::mem::take(&mut self.ops);
        let handles = std::mem::take(&mut self.handles);
        self.byte_size = 0;
        let op_count = ops.len();

        match store.bulk_upsert(ops).await {
            Ok(applied) => {
                for handle in handles {
                    handle.commit().await.map_err(|e| UpdaterError::BulkFlushFailed(e.to_string()))?;
                }
                tracing::info!(applied, "bulk flush committed");
                Ok(applied)
            }
            Err(e) => {
                for handle in handles {
                    if let Err(rollback_err) = handle.rollback().await {
                        tracing::warn!(error = %rollback_err, "failed to roll back envelope after bulk flush failure");
                    }
                }
                tracing::error!(error = %e, op_count, "bulk flush rejected, batch rolled back");
                Err(UpdaterError::BulkFlushFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civault_core::{ArtifactType, FqMsgId};
    use civault_queue::{FileQueue, FileQueueConfig};

    fn envelope(msg_id: &str) -> civault_core::FileQueueMessage {
        civault_core::FileQueueMessage {
            fq_msg_id: FqMsgId::from_string(msg_id),
            broker_msg_id: msg_id.to_string(),
            broker_topic: "org.centos.prod.ci.koji-build.test.complete".to_string(),
            body: serde_json::json!({}),
            broker_extra: std::collections::HashMap::new(),
            provider_name: "test".to_string(),
            provider_timestamp: 0,
        }
    }

    #[tokio::test]
    async fn flushes_once_the_op_count_reaches_the_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::open(dir.path(), FileQueueConfig::default()).await.unwrap();
        queue.push(&envelope("m1")).await.unwrap();
        let handle = queue.tpop().await.unwrap().expect("one envelope was pushed");

        let config = BulkConfig { max_ops: 1, ..BulkConfig::default() };
        let mut accumulator = BulkAccumulator::new(config);
        assert!(!accumulator.should_flush());

        let key = serde_json::json!({"type": "koji-build", "aid": "1"});
        let doc = ArtifactModel::new(ArtifactType::KojiBuild, "1".to_string());
        accumulator.push(key, doc, handle).unwrap();
        assert!(accumulator.should_flush());
    }

    #[test]
    fn does_not_flush_below_the_op_count_threshold() {
        let config = BulkConfig { max_ops: 2, ..BulkConfig::default() };
        let accumulator = BulkAccumulator::new(config);
        assert!(!accumulator.should_flush());
    }

    #[test]
    fn default_thresholds_match_the_documented_values() {
        let config = BulkConfig::default();
        assert_eq!(config.max_ops, 100);
        assert_eq!(config.idle_gap, Duration::from_secs(3));
    }
}
