// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::error::RouterError;
use async_trait::async_trait;
use civault_core::{ArtifactModel, DocStore, FileQueueMessage};
use regex::Regex;
use std::sync::Arc;

/// A pure projection `(docStore, envelope) → ArtifactModel`. Implementors
/// never mutate the store directly beyond `find_or_create_by_key`; the
/// updater owns every subsequent write.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        store: &dyn DocStore<ArtifactModel>,
        envelope: &FileQueueMessage,
    ) -> Result<ArtifactModel, RouterError>;
}

/// Stateless topic-to-handler resolution. Holds an ordered list of
/// `(pattern, handler)` pairs declared most-specific first; `resolve`
/// returns the first full match.
pub struct Router {
    routes: Vec<(Regex, Arc<dyn Handler>)>,
}

impl Router {
    pub fn new(routes: Vec<(Regex, Arc<dyn Handler>)>) -> Self {
        Self { routes }
    }

    pub fn resolve(&self, topic: &str) -> Result<Arc<dyn Handler>, RouterError> {
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.is_match(topic))
            .map(|(_, handler)| handler.clone())
            .ok_or_else(|| RouterError::NoHandler(topic.to_string()))
    }
}
