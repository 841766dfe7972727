// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The artifact-ingestion data model: the self-contained broker envelope,
//! the per-event `KaiState` record, and the accumulated `ArtifactModel`
//! document.

mod artifact;
mod kai_state;
mod merge;
mod message;
mod payload;

pub use artifact::{ArtifactModel, ArtifactType};
pub use kai_state::{derive_test_case_name, derive_thread_id, derive_timestamp_ms, ArtifactState, KaiState, Origin};
pub use merge::MergeValue;
pub use message::FileQueueMessage;
pub use payload::{ArtifactPayload, ContainerImage, ModuleBuild, PayloadVariantMismatch, RpmBuild, SourceInfo};
