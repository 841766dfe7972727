// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assembles the closed, most-specific-first route table described in the
//! component design: one pattern for build-system tag events, and one CI-
//! state pattern per artifact family.

use crate::handlers::ci_state::{CiStateHandler, ContainerImageProjection, KojiBuildProjection, ModuleBuildProjection};
use crate::handlers::tag::TagHandler;
use crate::koji_hub::KojiHub;
use crate::router::Handler;
use civault_core::ArtifactType;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps an artifact family to the hub client that resolves its build-tag
/// events, per the closed `type → hub` mapping in the component design.
pub type HubRegistry = HashMap<ArtifactType, Arc<dyn KojiHub>>;

/// Builds the standard route table. `hubs` supplies the Koji/Brew client
/// for every artifact family whose tag events this deployment handles;
/// families without an entry simply have no tag route registered.
pub fn default_routes(hubs: &HubRegistry) -> Vec<(Regex, Arc<dyn Handler>)> {
    let mut routes: Vec<(Regex, Arc<dyn Handler>)> = Vec::new();

    for (artifact_type, pattern) in [
        (ArtifactType::KojiBuild, r"^org\.(centos|fedoraproject)\.prod\.buildsys\.tag$"),
        (ArtifactType::BrewBuild, r"^org\.redhat\.prod\.buildsys\.tag$"),
    ] {
        if let Some(hub) = hubs.get(&artifact_type) {
            routes.push((
                regex(pattern),
                Arc::new(TagHandler::new(artifact_type, hub.clone())) as Arc<dyn Handler>,
            ));
        }
    }

    routes.push((
        regex(r"^org\.centos\.prod\.ci\.koji-build\.test\.(complete|queued|running|error)$"),
        Arc::new(CiStateHandler::new(KojiBuildProjection { artifact_type: ArtifactType::KojiBuild })),
    ));
    routes.push((
        regex(r"^org\.centos\.prod\.ci\.koji-build-cs\.test\.(complete|queued|running|error)$"),
        Arc::new(CiStateHandler::new(KojiBuildProjection { artifact_type: ArtifactType::KojiBuildCs })),
    ));
    routes.push((
        regex(r"^org\.centos\.prod\.ci\.brew-build\.test\.(complete|queued|running|error)$"),
        Arc::new(CiStateHandler::new(KojiBuildProjection { artifact_type: ArtifactType::BrewBuild })),
    ));
    routes.push((
        regex(r"^org\.centos\.prod\.ci\.redhat-module\.test\.(complete|queued|running|error)$"),
        Arc::new(CiStateHandler::new(ModuleBuildProjection)),
    ));
    routes.push((
        regex(r"^org\.centos\.prod\.ci\.redhat-container-image\.test\.(complete|queued|running|error)$"),
        Arc::new(CiStateHandler::new(ContainerImageProjection)),
    ));

    routes
}

fn regex(pattern: &str) -> Regex {
    #[allow(clippy::expect_used)]
    Regex::new(pattern).expect("route pattern is a compile-time constant")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;

    #[test]
    fn default_routes_resolve_every_documented_topic() {
        let router = Router::new(default_routes(&HubRegistry::new()));
        for topic in [
            "org.centos.prod.ci.koji-build.test.complete",
            "org.centos.prod.ci.koji-build-cs.test.queued",
            "org.centos.prod.ci.brew-build.test.running",
            "org.centos.prod.ci.redhat-module.test.error",
            "org.centos.prod.ci.redhat-container-image.test.complete",
        ] {
            assert!(router.resolve(topic).is_ok(), "expected a handler for {topic}");
        }
    }

    #[test]
    fn tag_routes_are_absent_without_a_configured_hub() {
        let router = Router::new(default_routes(&HubRegistry::new()));
        assert!(router.resolve("org.centos.prod.buildsys.tag").is_err());
    }
}
