// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! A durable, directory-backed FIFO decoupling bursty broker traffic from
//! document-store latency.
//!
//! Messages live as individual files under `<root>/visible`; a `tpop`
//! atomically renames one into `<root>/inflight` so it is hidden from other
//! pop callers but still present on disk. `commit` deletes it; `rollback`
//! renames it back into `visible` ahead of everything else, so a rolled-back
//! message is redelivered first.

mod error;

pub use error::QueueError;

use civault_core::model::FileQueueMessage;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

/// Tunables for one [`FileQueue`] handle.
#[derive(Debug, Clone)]
pub struct FileQueueConfig {
    /// How often `tpop` re-scans the visible directory while waiting, to
    /// pick up pushes made by other processes sharing this queue.
    pub poll_interval: Duration,
    /// Cache the visible-directory listing in memory (refreshed on local
    /// push, and on cache-miss) instead of re-reading the directory on
    /// every `tpop` attempt. Disable when several processes share one
    /// queue directory and staleness would cost more than the rescan.
    pub optimize_list: bool,
}

impl Default for FileQueueConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(500), optimize_list: true }
    }
}

struct Inner {
    visible_dir: PathBuf,
    inflight_dir: PathBuf,
    config: FileQueueConfig,
    cached_listing: Mutex<Option<Vec<String>>>,
    rollback_seq: AtomicI64,
    stopped: AtomicBool,
    notify: Notify,
}

/// A handle to a durable file-backed queue. Cheaply `Clone`-able; all
/// clones share the same underlying directories and in-memory state.
#[derive(Clone)]
pub struct FileQueue(Arc<Inner>);

impl FileQueue {
    /// Opens (creating if needed) the queue rooted at `root`, recovering
    /// any envelope left claimed-but-uncommitted by a previous process that
    /// crashed mid-transaction.
    pub async fn open(root: impl AsRef<Path>, config: FileQueueConfig) -> Result<Self, QueueError> {
        let visible_dir = root.as_ref().join("visible");
        let inflight_dir = root.as_ref().join("inflight");
        tokio::fs::create_dir_all(&visible_dir).await?;
        tokio::fs::create_dir_all(&inflight_dir).await?;

        let queue = Self(Arc::new(Inner {
            visible_dir,
            inflight_dir,
            config,
            cached_listing: Mutex::new(None),
            rollback_seq: AtomicI64::new(0),
            stopped: AtomicBool::new(false),
            notify: Notify::new(),
        }));
        queue.recover_inflight().await?;
        Ok(queue)
    }

    async fn recover_inflight(&self) -> Result<(), QueueError> {
        let stranded = Self::list_sorted(&self.0.inflight_dir).await?;
        for name in &stranded {
            self.requeue_to_head(&self.0.inflight_dir, name).await?;
        }
        if !stranded.is_empty() {
            tracing::warn!(count = stranded.len(), "recovered stranded in-flight envelopes on open");
        }
        Ok(())
    }

    /// Persists one envelope durably: write-temp, fsync, rename, fsync the
    /// containing directory. Returns only once the rename has landed.
    pub async fn push(&self, msg: &FileQueueMessage) -> Result<(), QueueError> {
        let start = Instant::now();
        let name = format!("{}.json", msg.fq_msg_id.as_str());
        let final_path = self.0.visible_dir.join(&name);
        let tmp_path = self.0.visible_dir.join(format!(".{name}.tmp"));

        let body = serde_json::to_vec(msg)?;
        {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Self::sync_dir(self.0.visible_dir.clone()).await?;

        if let Some(listing) = self.0.cached_listing.lock().as_mut() {
            listing.push(name);
            listing.sort();
        }
        self.0.notify.notify_waiters();

        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(fq_msg_id = %msg.fq_msg_id, elapsed_ms, "pushed envelope");
        Ok(())
    }

    /// Transactional pop: claims the oldest visible envelope and hides it
    /// from other callers until the returned [`PopHandle`] is committed or
    /// rolled back. Blocks until an envelope is available or the queue is
    /// stopped, in which case `Ok(None)` is returned.
    pub async fn tpop(&self) -> Result<Option<PopHandle>, QueueError> {
        loop {
            if let Some(name) = self.claim_next().await? {
                let path = self.0.inflight_dir.join(&name);
                let raw = tokio::fs::read(&path).await?;
                let message: FileQueueMessage = serde_json::from_slice(&raw)
                    .map_err(|e| QueueError::Corrupt(format!("{name}: {e}")))?;
                tracing::debug!(fq_msg_id = %message.fq_msg_id, "claimed envelope");
                return Ok(Some(PopHandle { queue: self.clone(), name, message }));
            }
            if self.0.stopped.load(Ordering::Acquire) {
                return Ok(None);
            }
            tokio::select! {
                _ = self.0.notify.notified() => {}
                _ = tokio::time::sleep(self.0.config.poll_interval) => {}
            }
            if self.0.stopped.load(Ordering::Acquire) {
                return Ok(None);
            }
        }
    }

    /// Number of envelopes currently visible (neither in-flight nor
    /// committed).
    pub async fn length(&self) -> Result<usize, QueueError> {
        if self.0.config.optimize_list {
            if let Some(listing) = self.0.cached_listing.lock().as_ref() {
                return Ok(listing.len());
            }
        }
        Ok(Self::list_sorted(&self.0.visible_dir).await?.len())
    }

    /// Stops background waiters. In-flight transactional pops remain valid
    /// until committed or rolled back.
    pub fn stop(&self) {
        self.0.stopped.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    async fn claim_next(&self) -> Result<Option<String>, QueueError> {
        loop {
            let Some(name) = self.peek_candidate().await? else {
                return Ok(None);
            };
            let from = self.0.visible_dir.join(&name);
            let to = self.0.inflight_dir.join(&name);
            match tokio::fs::rename(&from, &to).await {
                Ok(()) => {
                    self.drop_cached(&name);
                    return Ok(Some(name));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Raced with another pop (or a stale cache entry); drop it and retry.
                    self.drop_cached(&name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn peek_candidate(&self) -> Result<Option<String>, QueueError> {
        if self.0.config.optimize_list {
            let cached_front = self.0.cached_listing.lock().as_ref().and_then(|v| v.first().cloned());
            if cached_front.is_some() {
                return Ok(cached_front);
            }
            let listing = Self::list_sorted(&self.0.visible_dir).await?;
            let front = listing.first().cloned();
            *self.0.cached_listing.lock() = Some(listing);
            Ok(front)
        } else {
            Ok(Self::list_sorted(&self.0.visible_dir).await?.into_iter().next())
        }
    }

    fn drop_cached(&self, name: &str) {
        if let Some(listing) = self.0.cached_listing.lock().as_mut() {
            listing.retain(|n| n != name);
        }
    }

    /// Moves a file from `from_dir` back into the visible directory with a
    /// name that sorts ahead of every ordinary `fq_msg_id`-derived name,
    /// restoring it to the head of the queue.
    async fn requeue_to_head(&self, from_dir: &Path, name: &str) -> Result<(), QueueError> {
        let seq = self.0.rollback_seq.fetch_sub(1, Ordering::SeqCst);
        let head_name = format!("0-rollback-{seq:020}-{name}");
        tokio::fs::rename(from_dir.join(name), self.0.visible_dir.join(&head_name)).await?;
        if let Some(listing) = self.0.cached_listing.lock().as_mut() {
            listing.insert(0, head_name);
        }
        self.0.notify.notify_waiters();
        Ok(())
    }

    async fn list_sorted(dir: &Path) -> Result<Vec<String>, QueueError> {
        let dir = dir.to_path_buf();
        let names = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else { continue };
                if name.starts_with('.') {
                    continue;
                }
                names.push(name.to_string());
            }
            names.sort();
            Ok(names)
        })
        .await
        .map_err(|_| QueueError::Io(std::io::Error::other("directory listing task panicked")))??;
        Ok(names)
    }

    async fn sync_dir(dir: PathBuf) -> Result<(), QueueError> {
        tokio::task::spawn_blocking(move || std::fs::File::open(&dir).and_then(|f| f.sync_all()))
            .await
            .map_err(|_| QueueError::Io(std::io::Error::other("directory sync task panicked")))??;
        Ok(())
    }
}

/// A claimed-but-not-yet-resolved envelope. Must be resolved with
/// [`commit`](PopHandle::commit) or [`rollback`](PopHandle::rollback).
pub struct PopHandle {
    queue: FileQueue,
    name: String,
    message: FileQueueMessage,
}

impl PopHandle {
    pub fn message(&self) -> &FileQueueMessage {
        &self.message
    }

    /// Permanently removes the envelope: it has been durably applied
    /// downstream.
    pub async fn commit(self) -> Result<(), QueueError> {
        let path = self.queue.0.inflight_dir.join(&self.name);
        tokio::fs::remove_file(&path).await?;
        tracing::debug!(fq_msg_id = %self.message.fq_msg_id, "committed envelope");
        Ok(())
    }

    /// Returns the envelope to the head of the visible queue for
    /// redelivery.
    pub async fn rollback(self) -> Result<(), QueueError> {
        self.queue.requeue_to_head(&self.queue.0.inflight_dir, &self.name).await?;
        tracing::debug!(fq_msg_id = %self.message.fq_msg_id, "rolled back envelope");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
