// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-only sideline collections for envelopes the loop could not route
//! or validate. Every record carries a 15-day TTL from the moment it is
//! recorded, computed off the injected [`Clock`] so tests can control it.

use chrono::{DateTime, Utc};
use civault_core::docstore::{DocStore, DocStoreError};
use civault_core::{Clock, FileQueueMessage};
use serde::{Deserialize, Serialize};

const FIFTEEN_DAYS_MS: i64 = 15 * 24 * 60 * 60 * 1000;

fn expire_at(clock: &impl Clock) -> (i64, String, i64) {
    let now_ms = clock.epoch_ms();
    let time = DateTime::<Utc>::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now).to_rfc3339();
    (now_ms, time, now_ms + FIFTEEN_DAYS_MS)
}

/// A record of an envelope that failed schema validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub timestamp: i64,
    pub time: String,
    pub broker_msg: FileQueueMessage,
    pub broker_topic: String,
    pub errmsg: String,
    pub expire_at: i64,
}

/// A record of an envelope whose topic matched no configured handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownTopicRecord {
    pub timestamp: i64,
    pub time: String,
    pub broker_msg: FileQueueMessage,
    pub broker_topic: String,
    pub expire_at: i64,
}

/// Records envelopes the validator rejected.
pub struct InvalidStore<S, C> {
    inner: S,
    clock: C,
}

impl<S, C> InvalidStore<S, C>
where
    S: DocStore<InvalidRecord>,
    C: Clock,
{
    pub fn new(inner: S, clock: C) -> Self {
        Self { inner, clock }
    }

    pub async fn record(&self, envelope: &FileQueueMessage, errmsg: String) -> Result<(), DocStoreError> {
        let (timestamp, time, expire_at) = expire_at(&self.clock);
        let record = InvalidRecord {
            timestamp,
            time,
            broker_msg: envelope.clone(),
            broker_topic: envelope.broker_topic.clone(),
            errmsg,
            expire_at,
        };
        tracing::warn!(fq_msg_id = %envelope.fq_msg_id, topic = %envelope.broker_topic, "recording invalid envelope");
        self.inner.insert(record).await
    }
}

/// Records envelopes whose topic resolved to no handler.
pub struct UnknownTopicStore<S, C> {
    inner: S,
    clock: C,
}

impl<S, C> UnknownTopicStore<S, C>
where
    S: DocStore<UnknownTopicRecord>,
    C: Clock,
{
    pub fn new(inner: S, clock: C) -> Self {
        Self { inner, clock }
    }

    pub async fn record(&self, envelope: &FileQueueMessage) -> Result<(), DocStoreError> {
        let (timestamp, time, expire_at) = expire_at(&self.clock);
        let record = UnknownTopicRecord {
            timestamp,
            time,
            broker_msg: envelope.clone(),
            broker_topic: envelope.broker_topic.clone(),
            expire_at,
        };
        tracing::warn!(fq_msg_id = %envelope.fq_msg_id, topic = %envelope.broker_topic, "recording unroutable envelope");
        self.inner.insert(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocStore;
    use civault_core::FakeClock;
    use std::collections::HashMap;

    fn envelope() -> FileQueueMessage {
        FileQueueMessage {
            fq_msg_id: civault_core::FqMsgId::from_string("x"),
            broker_msg_id: "m1".into(),
            broker_topic: "org.centos.prod.ci.unknown.test.complete".into(),
            body: serde_json::json!({}),
            broker_extra: HashMap::new(),
            provider_name: "test".into(),
            provider_timestamp: 0,
        }
    }

    #[tokio::test]
    async fn invalid_store_records_a_ttl_bounded_entry() {
        let clock = FakeClock::new();
        clock.set_epoch_ms(1_700_000_000_000);
        let store = InvalidStore::new(MemoryDocStore::<InvalidRecord>::new(), clock);
        store.record(&envelope(), "schema violation at /artifact/id".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_topic_store_records_an_entry() {
        let clock = FakeClock::new();
        let store = UnknownTopicStore::new(MemoryDocStore::<UnknownTopicRecord>::new(), clock);
        store.record(&envelope()).await.unwrap();
    }
}
