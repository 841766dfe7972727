// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Topic routing and per-family handlers: synthesizes `KaiState` from a
//! broker envelope, resolves it to a handler, and lets the handler project
//! the event into a proposed `ArtifactModel`.

mod error;
mod handlers;
mod koji_hub;
mod router;
mod state;

pub use error::RouterError;
pub use handlers::{default_routes, ArtifactProjection, CiStateHandler, HubRegistry, TagHandler};
pub use koji_hub::{KojiBuildInfo, KojiHub, KojiHubError, TimeoutKojiHub};
pub use router::{Handler, Router};
pub use state::{make_state, OBSERVABLE_STATES};
