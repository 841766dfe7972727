// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generation of `fq_msg_id`: a time-prefixed string, monotonic per second.

use parking_lot::Mutex;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A `FileQueueMessage` identifier of the form `{unix_seconds}-{seq:06}`.
///
/// Two IDs generated within the same wall-clock second are ordered by the
/// zero-padded sequence suffix; IDs from different seconds are ordered by
/// the leading timestamp. Lexicographic string ordering therefore matches
/// generation order, which is what the file-queue relies on for FIFO
/// filenames.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct FqMsgId(String);

impl FqMsgId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for FqMsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FqMsgId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates monotonic-per-second [`FqMsgId`] values.
///
/// Held by the listener side of the file-queue; one generator per writer.
pub struct FqMsgIdGen {
    state: Mutex<(i64, u32)>,
}

impl FqMsgIdGen {
    pub fn new() -> Self {
        Self { state: Mutex::new((0, 0)) }
    }

    /// Generate the next ID, using `now_secs` as the current unix second.
    pub fn next_at(&self, now_secs: i64) -> FqMsgId {
        let mut state = self.state.lock();
        let (last_secs, seq) = &mut *state;
        if *last_secs == now_secs {
            *seq += 1;
        } else {
            *last_secs = now_secs;
            *seq = 0;
        }
        FqMsgId(format!("{now_secs:020}-{seq:06}"))
    }

    /// Generate the next ID using the system clock.
    pub fn next(&self) -> FqMsgId {
        let now_secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64;
        self.next_at(now_secs)
    }
}

impl Default for FqMsgIdGen {
    fn default() -> Self {
        Self::new()
    }
}
