// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use civault_core::{ArtifactType, DocStoreError, PayloadVariantMismatch};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no handler registered for topic {0}")]
    NoHandler(String),
    #[error("thread id could not be derived: neither pipeline.id nor run.url is present")]
    NoThreadId,
    #[error("event body missing expected field: {0}")]
    MalformedBody(String),
    #[error("no external hub configured for artifact type {0}")]
    NoHubForType(ArtifactType),
    #[error("external query to {hub} failed: {source}")]
    ExternalQueryFailed { hub: &'static str, source: String },
    #[error(transparent)]
    DocStore(#[from] DocStoreError),
    #[error(transparent)]
    PayloadVariantMismatch(#[from] PayloadVariantMismatch),
}
