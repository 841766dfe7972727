// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `make_state`: synthesizes the `KaiState`/`ArtifactState` pair for one
//! observable CI-state event.

use crate::error::RouterError;
use civault_core::{
    derive_test_case_name, derive_thread_id, derive_timestamp_ms, ArtifactState, FileQueueMessage, KaiState,
    Origin,
};

/// States that represent observable CI progress and therefore get appended
/// to an artifact's `states` history. Tag events carry none of these.
pub const OBSERVABLE_STATES: &[&str] = &["queued", "running", "complete", "error"];

/// Builds the `ArtifactState` for one envelope, per the thread-id fallback
/// rule (`body.pipeline.id`, else `sha256_hex(body.run.url)`). Fails with
/// [`RouterError::NoThreadId`] when neither is a usable string, and with
/// [`RouterError::MalformedBody`] when the topic carries fewer than the two
/// trailing dot-segments every registered pattern guarantees.
pub fn make_state(envelope: &FileQueueMessage) -> Result<ArtifactState, RouterError> {
    let thread_id = derive_thread_id(&envelope.body).ok_or(RouterError::NoThreadId)?;
    let (stage, state) = envelope
        .stage_state()
        .ok_or_else(|| RouterError::MalformedBody(format!("topic has no stage/state segments: {}", envelope.broker_topic)))?;

    let version = envelope.body.get("version").and_then(|v| v.as_str()).unwrap_or_default().to_string();

    let kai_state = KaiState {
        thread_id,
        msg_id: envelope.broker_msg_id.clone(),
        version,
        stage: stage.to_string(),
        state: state.to_string(),
        timestamp: derive_timestamp_ms(&envelope.body),
        origin: Origin::default(),
        test_case_name: derive_test_case_name(&envelope.body),
    };

    Ok(ArtifactState { broker_msg_body: envelope.body.clone(), kai_state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn envelope(topic: &str, body: serde_json::Value) -> FileQueueMessage {
        FileQueueMessage {
            fq_msg_id: civault_core::FqMsgId::from_string("x"),
            broker_msg_id: "m1".into(),
            broker_topic: topic.into(),
            body,
            broker_extra: HashMap::new(),
            provider_name: "test".into(),
            provider_timestamp: 0,
        }
    }

    #[test]
    fn synthesizes_stage_and_state_from_the_topic() {
        let env = envelope(
            "org.centos.prod.ci.koji-build.test.complete",
            json!({"pipeline": {"id": "PIPE-1"}}),
        );
        let state = make_state(&env).unwrap();
        assert_eq!(state.kai_state.stage, "test");
        assert_eq!(state.kai_state.state, "complete");
        assert_eq!(state.kai_state.thread_id, "PIPE-1");
    }

    #[test]
    fn fails_with_no_thread_id_when_neither_source_present() {
        let env = envelope("org.centos.prod.ci.koji-build.test.complete", json!({}));
        assert!(matches!(make_state(&env), Err(RouterError::NoThreadId)));
    }
}
