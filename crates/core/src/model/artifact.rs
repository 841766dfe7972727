// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ArtifactModel`: the accumulated per-artifact document.

use super::kai_state::ArtifactState;
use super::payload::{ArtifactPayload, PayloadVariantMismatch};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The closed set of artifact identities this system tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    KojiBuild,
    KojiBuildCs,
    BrewBuild,
    RedhatModule,
    RedhatContainerImage,
}

impl ArtifactType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactType::KojiBuild => "koji-build",
            ArtifactType::KojiBuildCs => "koji-build-cs",
            ArtifactType::BrewBuild => "brew-build",
            ArtifactType::RedhatModule => "redhat-module",
            ArtifactType::RedhatContainerImage => "redhat-container-image",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The accumulated per-`(type, aid)` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactModel {
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub aid: String,
    #[serde(rename = "_version")]
    pub version: u64,
    #[serde(default)]
    pub states: Vec<ArtifactState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<ArtifactPayload>,
    #[serde(default)]
    pub current_state: HashMap<String, Vec<ArtifactState>>,
    /// Spelling preserved verbatim as the on-wire field name for document
    /// compatibility; the in-memory field name is corrected.
    #[serde(default, rename = "current_state_lenghts")]
    pub current_state_lengths: HashMap<String, usize>,
    #[serde(default)]
    pub resultsdb_testcase: Vec<String>,
}

impl ArtifactModel {
    /// A brand-new document for `(type, aid)`, as produced by `findOrCreate`
    /// on first contact.
    pub fn new(artifact_type: ArtifactType, aid: impl Into<String>) -> Self {
        Self {
            artifact_type,
            aid: aid.into(),
            version: 1,
            states: Vec::new(),
            payload: None,
            current_state: HashMap::new(),
            current_state_lengths: HashMap::new(),
            resultsdb_testcase: Vec::new(),
        }
    }

    /// Merge a handler's partial payload into the document's own payload,
    /// per the field-wise merge rules. Assigns if no payload exists yet.
    pub fn merge_payload(&mut self, new: ArtifactPayload) -> Result<(), PayloadVariantMismatch> {
        match &mut self.payload {
            None => {
                self.payload = Some(new);
                Ok(())
            }
            Some(existing) => existing.merge_from(new),
        }
    }

    /// Append a state unless its `msg_id` is already present. Returns
    /// whether the append happened (callers use this to decide whether a
    /// write is needed at all).
    pub fn append_state(&mut self, state: ArtifactState) -> bool {
        if self.states.iter().any(|s| s.kai_state.msg_id == state.kai_state.msg_id) {
            return false;
        }
        self.states.push(state);
        true
    }

    /// Recompute `current_state`, `current_state_lengths`, and
    /// `resultsdb_testcase` from `states`. Must be called after any append.
    pub fn refresh_derived(&mut self) {
        let mut states_seen: HashSet<String> = HashSet::new();
        let mut head_by_thread: HashMap<String, ArtifactState> = HashMap::new();

        for s in &self.states {
            if s.kai_state.state.is_empty() {
                continue;
            }
            states_seen.insert(s.kai_state.state.clone());
            let better = match head_by_thread.get(&s.kai_state.thread_id) {
                None => true,
                Some(existing) => {
                    s.kai_state.timestamp.unwrap_or(i64::MIN)
                        >= existing.kai_state.timestamp.unwrap_or(i64::MIN)
                }
            };
            if better {
                head_by_thread.insert(s.kai_state.thread_id.clone(), s.clone());
            }
        }

        let mut current_state: HashMap<String, Vec<ArtifactState>> = HashMap::new();
        for state_name in &states_seen {
            current_state.insert(state_name.clone(), Vec::new());
        }
        for head in head_by_thread.into_values() {
            current_state.entry(head.kai_state.state.clone()).or_default().push(head);
        }

        let mut lengths = HashMap::new();
        for state_name in &states_seen {
            lengths.insert(state_name.clone(), current_state.get(state_name).map(Vec::len).unwrap_or(0));
        }

        let mut test_cases: Vec<String> =
            self.states.iter().filter_map(|s| s.kai_state.test_case_name.clone()).collect();
        test_cases.sort();
        test_cases.dedup();

        self.current_state = current_state;
        self.current_state_lengths = lengths;
        self.resultsdb_testcase = test_cases;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::kai_state::{KaiState, Origin};

    fn state(thread_id: &str, state: &str, msg_id: &str, ts: i64, test_case: Option<&str>) -> ArtifactState {
        ArtifactState {
            broker_msg_body: serde_json::Value::Null,
            kai_state: KaiState {
                thread_id: thread_id.into(),
                msg_id: msg_id.into(),
                version: "1".into(),
                stage: "test".into(),
                state: state.into(),
                timestamp: Some(ts),
                origin: Origin::default(),
                test_case_name: test_case.map(str::to_string),
            },
        }
    }

    #[test]
    fn append_state_dedupes_by_msg_id() {
        let mut artifact = ArtifactModel::new(ArtifactType::KojiBuild, "42");
        assert!(artifact.append_state(state("PIPE-1", "queued", "m1", 1, None)));
        assert!(!artifact.append_state(state("PIPE-1", "queued", "m1", 1, None)));
        assert_eq!(artifact.states.len(), 1);
    }

    #[test]
    fn refresh_derived_moves_thread_head_from_queued_to_complete() {
        let mut artifact = ArtifactModel::new(ArtifactType::KojiBuild, "42");
        artifact.append_state(state("PIPE-1", "queued", "m1", 1, Some("x.y.z")));
        artifact.refresh_derived();
        assert_eq!(artifact.current_state_lengths.get("queued"), Some(&1));

        artifact.append_state(state("PIPE-1", "complete", "m2", 2, Some("x.y.z")));
        artifact.refresh_derived();

        assert_eq!(artifact.current_state.get("queued"), Some(&vec![]));
        assert_eq!(artifact.current_state_lengths.get("queued"), Some(&0));
        assert_eq!(artifact.current_state.get("complete").map(Vec::len), Some(1));
        assert_eq!(artifact.resultsdb_testcase, vec!["x.y.z".to_string()]);
    }

    #[test]
    fn current_state_lengths_keys_match_states_observed() {
        let mut artifact = ArtifactModel::new(ArtifactType::KojiBuild, "42");
        artifact.append_state(state("T1", "queued", "m1", 1, None));
        artifact.append_state(state("T2", "running", "m2", 2, None));
        artifact.refresh_derived();
        let mut keys: Vec<_> = artifact.current_state_lengths.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["queued".to_string(), "running".to_string()]);
    }

    #[test]
    fn distinct_threads_each_keep_their_own_head() {
        let mut artifact = ArtifactModel::new(ArtifactType::KojiBuild, "42");
        artifact.append_state(state("T1", "complete", "m1", 5, None));
        artifact.append_state(state("T2", "running", "m2", 6, None));
        artifact.refresh_derived();
        assert_eq!(artifact.current_state_lengths.get("complete"), Some(&1));
        assert_eq!(artifact.current_state_lengths.get("running"), Some(&1));
    }

    #[test]
    fn resultsdb_testcase_is_distinct_and_non_empty_only() {
        let mut artifact = ArtifactModel::new(ArtifactType::KojiBuild, "42");
        artifact.append_state(state("T1", "queued", "m1", 1, Some("a.b.c")));
        artifact.append_state(state("T1", "complete", "m2", 2, Some("a.b.c")));
        artifact.append_state(state("T2", "running", "m3", 3, None));
        artifact.refresh_derived();
        assert_eq!(artifact.resultsdb_testcase, vec!["a.b.c".to_string()]);
    }
}
