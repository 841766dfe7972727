// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Koji/Brew hub collaborator: resolves a build-tag event's `build_id`
//! into the build metadata needed to seed an `rpm_build` payload.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// The subset of a Koji/Brew build record the tag handler needs.
#[derive(Debug, Clone, PartialEq)]
pub struct KojiBuildInfo {
    pub task_id: i64,
    pub nvr: String,
    pub issuer: String,
    pub source: Option<String>,
    pub scratch: bool,
    pub component: Option<String>,
}

#[derive(Debug, Error)]
pub enum KojiHubError {
    #[error("koji hub request timed out after {0:?}")]
    Timeout(Duration),
    #[error("koji hub request failed: {0}")]
    Request(String),
}

/// An injected capability for resolving Koji/Brew build metadata. Real
/// deployments implement this against the XML-RPC hub; tests use a fake.
#[async_trait]
pub trait KojiHub: Send + Sync {
    async fn get_build(&self, build_id: i64) -> Result<KojiBuildInfo, KojiHubError>;
}

/// Wraps any [`KojiHub`] with a per-call timeout, so a hung hub can't stall
/// the loader's single consumer loop indefinitely.
pub struct TimeoutKojiHub<H> {
    inner: H,
    timeout: Duration,
}

impl<H> TimeoutKojiHub<H> {
    pub fn new(inner: H, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<H: KojiHub> KojiHub for TimeoutKojiHub<H> {
    async fn get_build(&self, build_id: i64) -> Result<KojiBuildInfo, KojiHubError> {
        tokio::time::timeout(self.timeout, self.inner.get_build(build_id))
            .await
            .map_err(|_| KojiHubError::Timeout(self.timeout))?
    }
}
