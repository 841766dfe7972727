// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed sum of per-artifact-type build payloads
//! (`rpm_build` / `module_build` / `container_image`), each mergeable via
//! [`MergeValue`].

use super::merge::{merge_field, MergeValue};
use serde::{Deserialize, Serialize};

/// Nested registry coordinates for a container image, merged recursively
/// (merge rule 4: both sides are objects).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl SourceInfo {
    fn merge_from(mut self, new: Self) -> Self {
        merge_field(&mut self.repository, new.repository);
        merge_field(&mut self.tag, new.tag);
        self
    }
}

impl MergeValue for SourceInfo {
    fn merge_with(dest: Self, new: Self) -> Self {
        dest.merge_from(new)
    }
}

/// Partial `rpm_build` sub-record, progressively filled by the tag and
/// CI-state handlers for `koji-build` / `koji-build-cs` / `brew-build`
/// artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpmBuild {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nvr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl RpmBuild {
    pub fn merge_from(&mut self, new: RpmBuild) {
        merge_field(&mut self.task_id, new.task_id);
        merge_field(&mut self.build_id, new.build_id);
        merge_field(&mut self.nvr, new.nvr);
        merge_field(&mut self.issuer, new.issuer);
        merge_field(&mut self.source, new.source);
        merge_field(&mut self.scratch, new.scratch);
        merge_field(&mut self.component, new.component);
    }
}

/// Partial `module_build` sub-record. Identity is `nsvc`
/// (name-stream-version-context), per the resolved redhat-module open
/// question: this mirrors [`RpmBuild`] rather than being a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleBuild {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_build_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsvc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ModuleBuild {
    pub fn merge_from(&mut self, new: ModuleBuild) {
        merge_field(&mut self.task_id, new.task_id);
        merge_field(&mut self.module_build_id, new.module_build_id);
        merge_field(&mut self.nsvc, new.nsvc);
        merge_field(&mut self.issuer, new.issuer);
        merge_field(&mut self.source, new.source);
        merge_field(&mut self.scratch, new.scratch);
        merge_field(&mut self.context, new.context);
    }
}

/// Partial `container_image` sub-record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nvr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
}

impl ContainerImage {
    pub fn merge_from(&mut self, new: ContainerImage) {
        merge_field(&mut self.task_id, new.task_id);
        merge_field(&mut self.nvr, new.nvr);
        merge_field(&mut self.issuer, new.issuer);
        merge_field(&mut self.scratch, new.scratch);
        merge_field(&mut self.component, new.component);
        merge_field(&mut self.source, new.source);
    }
}

/// The closed sum of build-type payloads an `ArtifactModel` carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactPayload {
    RpmBuild(RpmBuild),
    ModuleBuild(ModuleBuild),
    ContainerImage(ContainerImage),
}

impl ArtifactPayload {
    /// Merge `new` into `self` if they are the same variant. Handlers only
    /// ever produce the variant matching the artifact's own type, so a
    /// variant mismatch is a handler bug rather than something to merge
    /// around; it is reported by the caller rather than silently dropped.
    pub fn merge_from(&mut self, new: ArtifactPayload) -> Result<(), PayloadVariantMismatch> {
        match (self, new) {
            (ArtifactPayload::RpmBuild(dest), ArtifactPayload::RpmBuild(new)) => {
                dest.merge_from(new);
                Ok(())
            }
            (ArtifactPayload::ModuleBuild(dest), ArtifactPayload::ModuleBuild(new)) => {
                dest.merge_from(new);
                Ok(())
            }
            (ArtifactPayload::ContainerImage(dest), ArtifactPayload::ContainerImage(new)) => {
                dest.merge_from(new);
                Ok(())
            }
            _ => Err(PayloadVariantMismatch),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("artifact payload variant mismatch")]
pub struct PayloadVariantMismatch;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpm_build_merge_fills_missing_fields() {
        let mut dest = RpmBuild { task_id: Some(42), ..Default::default() };
        dest.merge_from(RpmBuild { nvr: Some("gcompris-qt-1.1-1.fc33".into()), ..Default::default() });
        assert_eq!(dest.task_id, Some(42));
        assert_eq!(dest.nvr.as_deref(), Some("gcompris-qt-1.1-1.fc33"));
    }

    #[test]
    fn rpm_build_merge_keeps_destination_on_empty_string() {
        let mut dest = RpmBuild { nvr: Some("keep".into()), ..Default::default() };
        dest.merge_from(RpmBuild { nvr: Some(String::new()), ..Default::default() });
        assert_eq!(dest.nvr.as_deref(), Some("keep"));
    }

    #[test]
    fn container_image_merge_recurses_into_source_object() {
        let mut dest = ContainerImage {
            source: Some(SourceInfo { repository: Some("repo".into()), tag: None }),
            ..Default::default()
        };
        dest.merge_from(ContainerImage {
            source: Some(SourceInfo { repository: None, tag: Some("latest".into()) }),
            ..Default::default()
        });
        let source = dest.source.expect("source present");
        assert_eq!(source.repository.as_deref(), Some("repo"));
        assert_eq!(source.tag.as_deref(), Some("latest"));
    }

    #[test]
    fn mismatched_variants_report_an_error() {
        let mut dest = ArtifactPayload::RpmBuild(RpmBuild::default());
        let err = dest.merge_from(ArtifactPayload::ModuleBuild(ModuleBuild::default()));
        assert!(err.is_err());
    }
}
