// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The consumer loop: pop an envelope, resolve it to a handler, run it
//! through the updater's CAS retry loop (or the bulk accumulator for the
//! indexed-store variant), and commit or roll back the envelope.

use crate::store::AnyDocStore;
use civault_core::validator::Validator;
use civault_core::{ArtifactModel, FileQueueMessage, SystemClock};
use civault_queue::{FileQueue, PopHandle};
use civault_router::{Handler, Router, RouterError};
use civault_store::sideline::{InvalidRecord, InvalidStore, UnknownTopicRecord, UnknownTopicStore};
use civault_updater::{process_envelope, BulkAccumulator, UpdaterError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub type ArtifactStore = AnyDocStore<ArtifactModel>;
pub type InvalidBackingStore = AnyDocStore<InvalidRecord>;
pub type UnknownTopicBackingStore = AnyDocStore<UnknownTopicRecord>;

/// What the consumer loop exits with. Mirrors the process exit-code
/// contract: `0` on a clean `queue.stop()`-driven shutdown, `1` on any
/// fatal error.
pub enum LoopExit {
    Shutdown,
    Fatal(String),
}

impl LoopExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            LoopExit::Shutdown => 0,
            LoopExit::Fatal(_) => 1,
        }
    }
}

pub struct Loader {
    pub queue: FileQueue,
    pub router: Router,
    pub validator: Box<dyn Validator>,
    pub store: ArtifactStore,
    pub invalid_store: InvalidStore<InvalidBackingStore, SystemClock>,
    pub unknown_topic_store: UnknownTopicStore<UnknownTopicBackingStore, SystemClock>,
    pub bulk: Option<BulkAccumulator>,
}

impl Loader {
    pub async fn run(mut self) -> LoopExit {
        loop {
            let needs_idle_check = self.bulk.as_ref().is_some_and(|b| !b.is_empty());

            let popped = if needs_idle_check {
                tokio::select! {
                    popped = self.queue.tpop() => popped,
                    _ = tokio::time::sleep(idle_poll_interval()) => {
                        if let Some(accumulator) = self.bulk.as_mut() {
                            if accumulator.should_flush() {
                                if let Err(e) = accumulator.flush(&self.store).await {
                                    return LoopExit::Fatal(e.to_string());
                                }
                            }
                        }
                        continue;
                    }
                }
            } else {
                self.queue.tpop().await
            };

            let handle = match popped {
                Ok(Some(handle)) => handle,
                Ok(None) => return LoopExit::Shutdown,
                Err(e) => return LoopExit::Fatal(e.to_string()),
            };

            if let Err(exit) = self.process_one(handle).await {
                return exit;
            }
        }
    }

    async fn process_one(&mut self, handle: PopHandle) -> Result<(), LoopExit> {
        let envelope = handle.message().clone();

        let handler = match self.router.resolve(&envelope.broker_topic) {
            Ok(handler) => handler,
            Err(RouterError::NoHandler(_)) => {
                self.unknown_topic_store.record(&envelope).await.map_err(fatal)?;
                return handle.commit().await.map_err(fatal);
            }
            Err(other) => {
                self.invalid_store.record(&envelope, other.to_string()).await.map_err(fatal)?;
                return handle.commit().await.map_err(fatal);
            }
        };

        if self.bulk.is_some() {
            return process_bulk_envelope(
                &self.store,
                self.validator.as_ref(),
                &self.invalid_store,
                handler,
                envelope,
                handle,
                self.bulk.as_mut().expect("checked is_some above"),
            )
            .await;
        }

        match process_envelope(&self.store, self.validator.as_ref(), handler.as_ref(), &envelope).await {
            Ok(_) => handle.commit().await.map_err(fatal),
            Err(UpdaterError::Invalid(msg)) => {
                self.invalid_store.record(&envelope, msg).await.map_err(fatal)?;
                handle.commit().await.map_err(fatal)
            }
            Err(UpdaterError::NoHandler) => {
                self.unknown_topic_store.record(&envelope).await.map_err(fatal)?;
                handle.commit().await.map_err(fatal)
            }
            Err(UpdaterError::ExternalQueryFailed(reason)) => {
                tracing::warn!(topic = %envelope.broker_topic, reason, "external query failed, rolling back for retry");
                handle.rollback().await.map_err(fatal)
            }
            Err(fatal_err @ (UpdaterError::UpdateExhausted | UpdaterError::DocstoreFatal(_) | UpdaterError::BulkFlushFailed(_))) => {
                Err(LoopExit::Fatal(fatal_err.to_string()))
            }
        }
    }
}

/// The bulk-mode branch: validate and project, then hand the envelope's
/// handle to the accumulator instead of writing it through a CAS loop.
/// Free function (not a `Loader` method) so it borrows only the fields it
/// needs rather than all of `self`.
async fn process_bulk_envelope(
    store: &ArtifactStore,
    validator: &dyn Validator,
    invalid_store: &InvalidStore<InvalidBackingStore, SystemClock>,
    handler: Arc<dyn Handler>,
    envelope: FileQueueMessage,
    handle: PopHandle,
    accumulator: &mut BulkAccumulator,
) -> Result<(), LoopExit> {
    if let Err(e) = validator.validate(&envelope.broker_topic, &envelope.body) {
        invalid_store.record(&envelope, e.to_string()).await.map_err(fatal)?;
        return handle.commit().await.map_err(fatal);
    }

    let proposal = match handler.handle(store, &envelope).await {
        Ok(proposal) => proposal,
        Err(RouterError::ExternalQueryFailed { .. }) => {
            tracing::warn!(topic = %envelope.broker_topic, "external query failed, rolling back for retry");
            return handle.rollback().await.map_err(fatal);
        }
        Err(e) => {
            invalid_store.record(&envelope, e.to_string()).await.map_err(fatal)?;
            return handle.commit().await.map_err(fatal);
        }
    };

    let key = json!({"type": proposal.artifact_type.as_str(), "aid": proposal.aid});
    accumulator.push(key, proposal, handle).map_err(|e| LoopExit::Fatal(e.to_string()))?;

    if accumulator.should_flush() {
        accumulator.flush(store).await.map_err(|e| LoopExit::Fatal(e.to_string()))?;
    }
    Ok(())
}

fn fatal<E: std::fmt::Display>(e: E) -> LoopExit {
    LoopExit::Fatal(e.to_string())
}

fn idle_poll_interval() -> Duration {
    Duration::from_millis(500)
}
