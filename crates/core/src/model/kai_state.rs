// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `KaiState`: the canonical per-event record derived from one broker
//! message, and `ArtifactState`, the envelope around it appended to an
//! artifact's history.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Who/why produced a `KaiState`. Always the loader itself, per spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub creator: String,
    pub reason: String,
}

impl Default for Origin {
    fn default() -> Self {
        Self { creator: "kaijs-loader".to_string(), reason: "broker message".to_string() }
    }
}

/// One CI event, synthesized from a broker message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KaiState {
    pub thread_id: String,
    pub msg_id: String,
    pub version: String,
    pub stage: String,
    pub state: String,
    /// Milliseconds since epoch parsed from `body.generated_at`. `None` when
    /// the field is missing or unparseable (the JS original's `NaN`).
    pub timestamp: Option<i64>,
    pub origin: Origin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_name: Option<String>,
}

/// One historical entry in an artifact's `states` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactState {
    pub broker_msg_body: Value,
    pub kai_state: KaiState,
}

/// `body.pipeline.id` if it is a non-empty string, else
/// `"dummy-thread-" + sha256_hex(body.run.url)`. Returns `None` when neither
/// source is usable — callers must treat that as a hard error.
pub fn derive_thread_id(body: &Value) -> Option<String> {
    if let Some(id) = body.pointer("/pipeline/id").and_then(Value::as_str) {
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    let run_url = body.pointer("/run/url").and_then(Value::as_str)?;
    if run_url.is_empty() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(run_url.as_bytes());
    let digest = hasher.finalize();
    Some(format!("dummy-thread-{digest:x}"))
}

/// `"{namespace}.{type}.{category}"` when all three are non-empty strings,
/// else `None`.
pub fn derive_test_case_name(body: &Value) -> Option<String> {
    let namespace = non_empty_str(body, "/test/namespace")?;
    let kind = non_empty_str(body, "/test/type")?;
    let category = non_empty_str(body, "/test/category")?;
    Some(format!("{namespace}.{kind}.{category}"))
}

/// Milliseconds since epoch parsed from `body.generated_at`.
pub fn derive_timestamp_ms(body: &Value) -> Option<i64> {
    let raw = body.get("generated_at")?.as_str()?;
    chrono::DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.timestamp_millis())
}

fn non_empty_str<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    let s = body.pointer(pointer)?.as_str()?;
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
