// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The error taxonomy surfaced at every public boundary of the crate: the byte store, the trie,
//! and the world-state façade all funnel their failures through [`WorldStateError`] rather than
//! propagating raw `anyhow::Error` to callers that need to branch on *kind* (e.g. a validator
//! deciding whether a missing key means "abort the transaction" or "the block is corrupt").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldStateError {
    #[error("key not found: {key}")]
    KeyNotFound { key: String },

    #[error("failed to decode value{}: {source}", .offset.map(|o| format!(" at offset {o}")).unwrap_or_default())]
    Decode {
        offset: Option<usize>,
        #[source]
        source: anyhow::Error,
    },

    #[error("byte store I/O error: {0}")]
    Io(anyhow::Error),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl WorldStateError {
    pub fn key_not_found(key: impl std::fmt::Display) -> Self {
        Self::KeyNotFound {
            key: key.to_string(),
        }
    }

    pub fn decode(source: anyhow::Error) -> Self {
        Self::Decode {
            offset: None,
            source,
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

pub type WorldStateResult<T> = Result<T, WorldStateError>;
