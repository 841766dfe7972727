// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single-envelope read-modify-write loop: validate, invoke the
//! handler, diff against the currently persisted document, and
//! compare-and-swap — retrying on contention up to a fixed attempt budget.

use crate::diff::compute_update_set;
use crate::error::{classify_docstore, DocstoreOutcome, UpdaterError};
use civault_core::docstore::DocStore;
use civault_core::validator::Validator;
use civault_core::{ArtifactModel, FileQueueMessage};
use civault_router::Handler;
use serde_json::{json, Map, Value};

pub const MAX_UPDATE_ATTEMPTS: u32 = 30;

/// Validates and persists one envelope's effect, retrying the
/// compare-and-swap write up to [`MAX_UPDATE_ATTEMPTS`] times.
pub async fn process_envelope<S>(
    store: &S,
    validator: &dyn Validator,
    handler: &dyn Handler,
    envelope: &FileQueueMessage,
) -> Result<ArtifactModel, UpdaterError>
where
    S: DocStore<ArtifactModel>,
{
    validator.validate(&envelope.broker_topic, &envelope.body)?;

    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let proposal = handler.handle(store, envelope).await?;

        let key = json!({"type": proposal.artifact_type.as_str(), "aid": proposal.aid});
        let (doc_id, current, _created) = match store.find_or_create_by_key(key, proposal.clone()).await {
            Ok(found) => found,
            Err(e) => match classify_docstore(e) {
                DocstoreOutcome::Retry => {
                    tracing::debug!(attempt, aid = %proposal.aid, "transient docstore error re-reading document, retrying");
                    continue;
                }
                DocstoreOutcome::Fatal(err) => return Err(err),
            },
        };

        let update_set = leaf_diff(&proposal, &current)?;
        if update_set.as_object().map(Map::is_empty).unwrap_or(true) {
            return Ok(proposal);
        }

        match store.cas_update(&doc_id, current.version, update_set).await {
            Ok(true) => return Ok(proposal),
            Ok(false) => {
                tracing::debug!(attempt, aid = %proposal.aid, "cas contention, retrying");
                continue;
            }
            Err(e) => match classify_docstore(e) {
                DocstoreOutcome::Retry => {
                    tracing::debug!(attempt, aid = %proposal.aid, "transient docstore error on cas update, retrying");
                    continue;
                }
                DocstoreOutcome::Fatal(err) => return Err(err),
            },
        }
    }

    Err(UpdaterError::UpdateExhausted)
}

fn leaf_diff(proposal: &ArtifactModel, current: &ArtifactModel) -> Result<Value, UpdaterError> {
    let proposal_value = serde_json::to_value(proposal).map_err(|e| UpdaterError::DocstoreFatal(e.to_string()))?;
    let current_value = serde_json::to_value(current).map_err(|e| UpdaterError::DocstoreFatal(e.to_string()))?;
    Ok(compute_update_set(&proposal_value, &current_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use civault_core::{ArtifactPayload, ArtifactType, RpmBuild};
    use civault_store::MemoryDocStore;
    use std::collections::HashMap;

    struct StubValidator;
    impl Validator for StubValidator {
        fn validate(&self, _schema_name: &str, _instance: &Value) -> Result<(), civault_core::validator::ValidationError> {
            Ok(())
        }
    }

    struct MergeHandler;
    #[async_trait::async_trait]
    impl Handler for MergeHandler {
        async fn handle(
            &self,
            store: &dyn DocStore<ArtifactModel>,
            _envelope: &FileQueueMessage,
        ) -> Result<ArtifactModel, civault_router::RouterError> {
            let key = json!({"type": "koji-build", "aid": "42"});
            let default = ArtifactModel::new(ArtifactType::KojiBuild, "42".to_string());
            let (_id, mut model, _created) = store.find_or_create_by_key(key, default).await?;
            model.merge_payload(ArtifactPayload::RpmBuild(RpmBuild {
                task_id: Some(42),
                build_id: None,
                nvr: Some("gcompris-qt-1.1-1.fc40".to_string()),
                issuer: Some("packager".to_string()),
                source: None,
                scratch: Some(false),
                component: None,
            }))?;
            Ok(model)
        }
    }

    fn envelope() -> FileQueueMessage {
        FileQueueMessage {
            fq_msg_id: civault_core::FqMsgId::from_string("x"),
            broker_msg_id: "m1".into(),
            broker_topic: "org.centos.prod.buildsys.tag".into(),
            body: json!({"build": {"build_id": 42}}),
            broker_extra: HashMap::new(),
            provider_name: "test".into(),
            provider_timestamp: 0,
        }
    }

    #[tokio::test]
    async fn first_write_persists_the_full_proposal() {
        let store: MemoryDocStore<ArtifactModel> = MemoryDocStore::new();
        let model = process_envelope(&store, &StubValidator, &MergeHandler, &envelope()).await.unwrap();
        assert_eq!(model.aid, "42");
    }

    #[tokio::test]
    async fn a_second_identical_envelope_needs_no_write() {
        let store: MemoryDocStore<ArtifactModel> = MemoryDocStore::new();
        process_envelope(&store, &StubValidator, &MergeHandler, &envelope()).await.unwrap();
        let model = process_envelope(&store, &StubValidator, &MergeHandler, &envelope()).await.unwrap();
        assert_eq!(model.aid, "42");
    }
}
