// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use civault_core::docstore::DocStoreError;
use civault_core::validator::ValidationError;
use civault_router::RouterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    /// Sidelineable: schema validation rejected the body, or the handler
    /// could not derive an identity/thread id from it.
    #[error("envelope invalid: {0}")]
    Invalid(String),
    /// Sidelineable: the router matched no handler for this topic.
    #[error("no handler for topic")]
    NoHandler,
    /// Propagate for retry on the next pop; this envelope is rolled back.
    #[error("external query failed: {0}")]
    ExternalQueryFailed(String),
    /// Fatal: 30 CAS attempts were exhausted for one envelope.
    #[error("update retries exhausted")]
    UpdateExhausted,
    /// Fatal: the docstore reported a non-transient error.
    #[error("docstore fatal error: {0}")]
    DocstoreFatal(String),
    /// Fatal: a bulk flush was rejected; all accumulated envelopes roll back.
    #[error("bulk flush failed: {0}")]
    BulkFlushFailed(String),
}

impl From<ValidationError> for UpdaterError {
    fn from(err: ValidationError) -> Self {
        UpdaterError::Invalid(err.to_string())
    }
}

impl From<RouterError> for UpdaterError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::NoHandler(_) => UpdaterError::NoHandler,
            RouterError::NoThreadId | RouterError::MalformedBody(_) | RouterError::PayloadVariantMismatch(_) => {
                UpdaterError::Invalid(err.to_string())
            }
            RouterError::NoHubForType(_) => UpdaterError::Invalid(err.to_string()),
            RouterError::ExternalQueryFailed { .. } => UpdaterError::ExternalQueryFailed(err.to_string()),
            RouterError::DocStore(docstore_err) => classify_docstore(docstore_err).into_fatal(),
        }
    }
}

/// Whether a docstore error encountered mid-retry should be retried (a
/// transient connection hiccup or timeout) or abandoned immediately (a
/// serialization bug or a result shape the adapter should never produce).
pub enum DocstoreOutcome {
    Retry,
    Fatal(UpdaterError),
}

impl DocstoreOutcome {
    pub fn into_fatal(self) -> UpdaterError {
        match self {
            DocstoreOutcome::Retry => UpdaterError::DocstoreFatal("unexpected retryable error treated as fatal".to_string()),
            DocstoreOutcome::Fatal(err) => err,
        }
    }
}

pub fn classify_docstore(err: DocStoreError) -> DocstoreOutcome {
    match err {
        DocStoreError::Connection(_) | DocStoreError::Timeout => DocstoreOutcome::Retry,
        DocStoreError::Serde(msg) | DocStoreError::Unexpected(msg) => {
            DocstoreOutcome::Fatal(UpdaterError::DocstoreFatal(msg))
        }
    }
}
