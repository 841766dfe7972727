// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CI-state handler shared by all four artifact families: extract a
//! partial payload and identity from the event body, merge it into the
//! document, and append the observable state if this event carries one.

use crate::error::RouterError;
use crate::router::Handler;
use crate::state::{make_state, OBSERVABLE_STATES};
use async_trait::async_trait;
use civault_core::{
    ArtifactModel, ArtifactPayload, ArtifactType, ContainerImage, DocStore, FileQueueMessage, ModuleBuild,
    RpmBuild, SourceInfo,
};
use serde_json::{json, Value};

fn artifact_field<'a>(body: &'a Value, name: &str) -> Option<&'a Value> {
    body.pointer(&format!("/artifact/{name}"))
}

fn artifact_str(body: &Value, name: &str) -> Option<String> {
    artifact_field(body, name).and_then(Value::as_str).map(str::to_string)
}

fn artifact_i64(body: &Value, name: &str) -> Option<i64> {
    artifact_field(body, name).and_then(Value::as_i64)
}

fn artifact_bool(body: &Value, name: &str) -> Option<bool> {
    artifact_field(body, name).and_then(Value::as_bool)
}

/// Extracts this family's identity and partial payload from an event body.
pub trait ArtifactProjection: Send + Sync {
    fn artifact_type(&self) -> ArtifactType;
    fn project(&self, body: &Value) -> Result<(String, ArtifactPayload), RouterError>;
}

/// `koji-build` / `koji-build-cs` / `brew-build`: identity is the Koji
/// `task_id` (`body.artifact.id`), payload is `rpm_build`.
pub struct KojiBuildProjection {
    pub artifact_type: ArtifactType,
}

impl ArtifactProjection for KojiBuildProjection {
    fn artifact_type(&self) -> ArtifactType {
        self.artifact_type
    }

    fn project(&self, body: &Value) -> Result<(String, ArtifactPayload), RouterError> {
        let task_id = artifact_i64(body, "id")
            .ok_or_else(|| RouterError::MalformedBody("artifact.id missing".to_string()))?;
        let payload = ArtifactPayload::RpmBuild(RpmBuild {
            task_id: Some(task_id),
            build_id: artifact_i64(body, "build_id"),
            nvr: artifact_str(body, "nvr"),
            issuer: artifact_str(body, "issuer"),
            source: artifact_str(body, "source"),
            scratch: artifact_bool(body, "scratch"),
            component: artifact_str(body, "component"),
        });
        Ok((task_id.to_string(), payload))
    }
}

/// `redhat-module`: identity is `nsvc`, per the resolved open question that
/// this family is not a no-op but mirrors the RPM-build handler.
pub struct ModuleBuildProjection;

impl ArtifactProjection for ModuleBuildProjection {
    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::RedhatModule
    }

    fn project(&self, body: &Value) -> Result<(String, ArtifactPayload), RouterError> {
        let nsvc = artifact_str(body, "nsvc")
            .ok_or_else(|| RouterError::MalformedBody("artifact.nsvc missing".to_string()))?;
        let payload = ArtifactPayload::ModuleBuild(ModuleBuild {
            task_id: artifact_i64(body, "id"),
            module_build_id: artifact_i64(body, "module_build_id"),
            nsvc: Some(nsvc.clone()),
            issuer: artifact_str(body, "issuer"),
            source: artifact_str(body, "source"),
            scratch: artifact_bool(body, "scratch"),
            context: artifact_str(body, "context"),
        });
        Ok((nsvc, payload))
    }
}

/// `redhat-container-image`: identity is the image NVR.
pub struct ContainerImageProjection;

impl ArtifactProjection for ContainerImageProjection {
    fn artifact_type(&self) -> ArtifactType {
        ArtifactType::RedhatContainerImage
    }

    fn project(&self, body: &Value) -> Result<(String, ArtifactPayload), RouterError> {
        let nvr = artifact_str(body, "nvr")
            .ok_or_else(|| RouterError::MalformedBody("artifact.nvr missing".to_string()))?;
        let source = match (artifact_str(body, "source/repository"), artifact_str(body, "source/tag")) {
            (None, None) => None,
            (repository, tag) => Some(SourceInfo { repository, tag }),
        };
        let payload = ArtifactPayload::ContainerImage(ContainerImage {
            task_id: artifact_i64(body, "id"),
            nvr: Some(nvr.clone()),
            issuer: artifact_str(body, "issuer"),
            scratch: artifact_bool(body, "scratch"),
            component: artifact_str(body, "component"),
            source,
        });
        Ok((nvr, payload))
    }
}

/// The shared CI-state handler body, parameterized by the per-family
/// [`ArtifactProjection`].
pub struct CiStateHandler<P> {
    projection: P,
}

impl<P: ArtifactProjection> CiStateHandler<P> {
    pub fn new(projection: P) -> Self {
        Self { projection }
    }
}

#[async_trait]
impl<P: ArtifactProjection> Handler for CiStateHandler<P> {
    async fn handle(
        &self,
        store: &dyn DocStore<ArtifactModel>,
        envelope: &FileQueueMessage,
    ) -> Result<ArtifactModel, RouterError> {
        let artifact_type = self.projection.artifact_type();
        let (aid, payload) = self.projection.project(&envelope.body)?;

        let key = json!({"type": artifact_type.as_str(), "aid": aid});
        let default = ArtifactModel::new(artifact_type, aid.clone());
        let (_id, mut model, created) = store.find_or_create_by_key(key, default).await?;
        tracing::debug!(%artifact_type, %aid, created, "resolved artifact document");

        model.merge_payload(payload)?;

        if let Some((_, state_name)) = envelope.stage_state() {
            if OBSERVABLE_STATES.contains(&state_name) {
                let state = make_state(envelope)?;
                if model.append_state(state) {
                    model.refresh_derived();
                }
            }
        }

        Ok(model)
    }
}
