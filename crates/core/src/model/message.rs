// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `FileQueueMessage`: the self-contained envelope the listener writes and
//! the loader reads.

use crate::ids::FqMsgId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A broker message as handed off through the file-queue. Immutable once
/// written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileQueueMessage {
    /// Unique, time-prefixed, monotonic-per-second identifier assigned by
    /// the listener at push time.
    pub fq_msg_id: FqMsgId,
    /// Opaque identifier assigned by the broker.
    pub broker_msg_id: String,
    /// Dotted topic, e.g. `org.centos.prod.ci.koji-build.test.complete`.
    pub broker_topic: String,
    /// Decoded JSON body.
    pub body: Value,
    /// Broker headers / application properties.
    #[serde(default)]
    pub broker_extra: HashMap<String, Value>,
    pub provider_name: String,
    /// Unix seconds.
    pub provider_timestamp: i64,
}

impl FileQueueMessage {
    /// The second-to-last and last dot-delimited segments of `broker_topic`,
    /// i.e. `(stage, state)`.
    pub fn stage_state(&self) -> Option<(&str, &str)> {
        let mut parts = self.broker_topic.rsplitn(3, '.');
        let state = parts.next()?;
        let stage = parts.next()?;
        Some((stage, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str) -> FileQueueMessage {
        FileQueueMessage {
            fq_msg_id: FqMsgId::from_string("x"),
            broker_msg_id: "m".into(),
            broker_topic: topic.into(),
            body: Value::Null,
            broker_extra: HashMap::new(),
            provider_name: "p".into(),
            provider_timestamp: 0,
        }
    }

    #[test]
    fn stage_state_splits_last_two_segments() {
        let m = msg("org.centos.prod.ci.koji-build.test.complete");
        assert_eq!(m.stage_state(), Some(("test", "complete")));
    }

    #[test]
    fn stage_state_rejoin_round_trips_the_last_two_segments() {
        let m = msg("org.fedoraproject.prod.buildsys.tag");
        let (stage, state) = m.stage_state().expect("has stage/state");
        assert!(m.broker_topic.ends_with(&format!("{stage}.{state}")));
    }

    #[test]
    fn stage_state_none_when_topic_has_fewer_than_two_segments() {
        let m = msg("tag");
        assert_eq!(m.stage_state(), None);
    }
}
