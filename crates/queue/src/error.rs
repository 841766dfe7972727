// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("file queue io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file queue envelope serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("file queue entry corrupt: {0}")]
    Corrupt(String),
}
