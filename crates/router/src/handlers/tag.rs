// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The build-system tag handler: resolves `build_id` via the injected
//! [`KojiHub`] to obtain the Koji `task_id` identity, then seeds/merges the
//! `rpm_build` payload. Tag events carry no observable CI state.

use crate::error::RouterError;
use crate::koji_hub::KojiHub;
use crate::router::Handler;
use async_trait::async_trait;
use civault_core::{ArtifactModel, ArtifactPayload, ArtifactType, DocStore, FileQueueMessage, RpmBuild};
use serde_json::json;
use std::sync::Arc;

pub struct TagHandler {
    artifact_type: ArtifactType,
    hub: Arc<dyn KojiHub>,
}

impl TagHandler {
    pub fn new(artifact_type: ArtifactType, hub: Arc<dyn KojiHub>) -> Self {
        Self { artifact_type, hub }
    }
}

#[async_trait]
impl Handler for TagHandler {
    async fn handle(
        &self,
        store: &dyn DocStore<ArtifactModel>,
        envelope: &FileQueueMessage,
    ) -> Result<ArtifactModel, RouterError> {
        let build_id = envelope
            .body
            .pointer("/build/build_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| RouterError::MalformedBody("build.build_id missing".to_string()))?;

        let build_info = self
            .hub
            .get_build(build_id)
            .await
            .map_err(|source| RouterError::ExternalQueryFailed { hub: "koji", source: source.to_string() })?;

        let aid = build_info.task_id.to_string();
        let key = json!({"type": self.artifact_type.as_str(), "aid": aid});
        let default = ArtifactModel::new(self.artifact_type, aid.clone());
        let (_id, mut model, created) = store.find_or_create_by_key(key, default).await?;
        tracing::debug!(artifact_type = %self.artifact_type, %aid, created, "resolved tag-event document");

        model.merge_payload(ArtifactPayload::RpmBuild(RpmBuild {
            task_id: Some(build_info.task_id),
            build_id: Some(build_id),
            nvr: Some(build_info.nvr),
            issuer: Some(build_info.issuer),
            source: build_info.source,
            scratch: Some(build_info.scratch),
            component: build_info.component,
        }))?;

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::koji_hub::{KojiBuildInfo, KojiHubError};
    use civault_core::docstore::{BulkUpsertOp, DocId, DocStoreError};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct FakeHub;

    #[async_trait]
    impl KojiHub for FakeHub {
        async fn get_build(&self, build_id: i64) -> Result<KojiBuildInfo, KojiHubError> {
            Ok(KojiBuildInfo {
                task_id: build_id + 1000,
                nvr: "gcompris-qt-1.1-1.fc40".into(),
                issuer: "packager".into(),
                source: None,
                scratch: false,
                component: Some("gcompris-qt".into()),
            })
        }
    }

    struct FakeStore {
        docs: Mutex<HashMap<String, (DocId, ArtifactModel)>>,
    }

    impl FakeStore {
        fn new() -> Self {
            Self { docs: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl DocStore<ArtifactModel> for FakeStore {
        async fn open_collection(&self) -> Result<(), DocStoreError> {
            Ok(())
        }

        async fn find_or_create_by_key(
            &self,
            key: serde_json::Value,
            default: ArtifactModel,
        ) -> Result<(DocId, ArtifactModel, bool), DocStoreError> {
            let key_str = key.to_string();
            let mut docs = self.docs.lock();
            if let Some((id, doc)) = docs.get(&key_str) {
                return Ok((id.clone(), doc.clone(), false));
            }
            let id = DocId(key_str.clone());
            docs.insert(key_str, (id.clone(), default.clone()));
            Ok((id, default, true))
        }

        async fn get(&self, id: &DocId) -> Result<Option<ArtifactModel>, DocStoreError> {
            Ok(self.docs.lock().values().find(|(doc_id, _)| doc_id == id).map(|(_, doc)| doc.clone()))
        }

        async fn cas_update(&self, _id: &DocId, _expected_version: u64, _set_ops: serde_json::Value) -> Result<bool, DocStoreError> {
            Ok(true)
        }

        async fn insert(&self, _doc: ArtifactModel) -> Result<(), DocStoreError> {
            Ok(())
        }

        async fn bulk_upsert(&self, _ops: Vec<BulkUpsertOp<ArtifactModel>>) -> Result<usize, DocStoreError> {
            Ok(0)
        }

        async fn close(&self) -> Result<(), DocStoreError> {
            Ok(())
        }
    }

    fn envelope(body: serde_json::Value) -> FileQueueMessage {
        FileQueueMessage {
            fq_msg_id: civault_core::FqMsgId::from_string("x"),
            broker_msg_id: "m1".into(),
            broker_topic: "org.centos.prod.buildsys.tag".into(),
            body,
            broker_extra: HashMap::new(),
            provider_name: "test".into(),
            provider_timestamp: 0,
        }
    }

    #[tokio::test]
    async fn resolves_task_id_via_the_hub_and_seeds_rpm_build() {
        let handler = TagHandler::new(ArtifactType::KojiBuild, Arc::new(FakeHub));
        let store = FakeStore::new();
        let env = envelope(json!({"build": {"build_id": 42}}));

        let model = handler.handle(&store, &env).await.unwrap();
        assert_eq!(model.aid, "1042");
        match model.payload {
            Some(ArtifactPayload::RpmBuild(rpm)) => assert_eq!(rpm.task_id, Some(1042)),
            other => panic!("expected rpm_build payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_build_id_is_malformed_body() {
        let handler = TagHandler::new(ArtifactType::KojiBuild, Arc::new(FakeHub));
        let store = FakeStore::new();
        let env = envelope(json!({}));
        let err = handler.handle(&store, &env).await.unwrap_err();
        assert!(matches!(err, RouterError::MalformedBody(_)));
    }
}
