// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! Values the node threads into this crate rather than ones it loads itself — loading
//! configuration (files, env, CLI flags) stays the node's job, out of scope here.

use serde::{Deserialize, Serialize};

/// Tunables for the cache/staging layers. Threaded in by the caller, not parsed here.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorldStateConfig {
    /// Number of pending entries a `CachedSMT` accumulates before a caller-driven `persist()` is
    /// advisable. Advisory only: `persist()` can be called at any pending-map size and is never
    /// triggered automatically by this crate.
    pub cache_flush_threshold: usize,
    /// Default cap applied to a `scan` call when the caller does not specify one.
    pub scan_default_limit: usize,
}

impl Default for WorldStateConfig {
    fn default() -> Self {
        Self {
            cache_flush_threshold: 10_000,
            scan_default_limit: 1_000,
        }
    }
}
