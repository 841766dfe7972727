// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! civault-core: shared data model and collaborator contracts for the
//! CI artifact bridge.

pub mod clock;
pub mod docstore;
pub mod ids;
pub mod model;
pub mod schema;
pub mod validator;

pub use clock::{Clock, FakeClock, SystemClock};
pub use docstore::{BulkUpsertOp, DocId, DocStore, DocStoreError};
pub use ids::FqMsgId;
pub use model::{
    derive_test_case_name, derive_thread_id, derive_timestamp_ms, ArtifactModel, ArtifactPayload,
    ArtifactState, ArtifactType, ContainerImage, FileQueueMessage, KaiState, MergeValue, ModuleBuild,
    Origin, PayloadVariantMismatch, RpmBuild, SourceInfo,
};
pub use schema::{DirectorySchemaSource, SchemaLoadError, SchemaRegistry, SchemaSource};
pub use validator::{ValidationError, Validator};
