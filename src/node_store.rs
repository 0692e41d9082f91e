// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The opaque byte-level key-value store the trie is built on (§4.A). [`NodeStore`] is the
//! trait every persistence backend implements; [`InMemoryNodeStore`] is the only backend shipped
//! here, grounded on the same `RwLock<HashMap<..>>` shape as the jellyfish-merkle test harness's
//! mock store, but keyed on raw bytes instead of a fixed node type so it can back every trie in
//! the world-state façade plus the code-record table.

use crate::error::WorldStateError;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A mapping from opaque byte keys to opaque byte values, with prefix scan. Node identity in the
/// trie is content-addressed (a node's key is its own hash), so `put` of a key already present
/// with the same bytes is a no-op; the same key with different bytes is a store-corruption-level
/// programming error, not a recoverable one. Failures are [`WorldStateError`] wrapped in
/// `anyhow::Error`, matching every other public boundary in the crate.
pub trait NodeStore: Send + Sync {
    fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.get_opt(key)?
            .ok_or_else(|| WorldStateError::key_not_found(hex::encode(key)).into())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    /// Idempotent on `(key, value)`: re-putting identical bytes at an existing key is a no-op.
    /// Putting different bytes at an existing key is [`WorldStateError::InvariantViolation`].
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    fn remove(&self, key: &[u8]) -> Result<()>;

    /// Up to `limit` `(key, value)` pairs whose key starts with `prefix`, in byte-lexicographic
    /// order.
    fn scan(&self, prefix: &[u8], limit: usize) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// An in-memory [`NodeStore`] backed by a [`BTreeMap`] so that [`NodeStore::scan`] can use
/// [`BTreeMap::range`] for prefix iteration without a secondary index. Not durable: restarting
/// the process loses everything, which is adequate for tests and for embedding behind a durable
/// store that replays its own write-ahead log on startup.
#[derive(Default)]
pub struct InMemoryNodeStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(metrics) = crate::metrics::get() {
            metrics.node_store_ops_total.with_label_values(&["get"]).inc();
        }
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(existing) if existing == &value => return Ok(()),
            Some(_) => {
                return Err(WorldStateError::invariant(format!(
                    "content-addressed put conflict at key {}",
                    hex::encode(&key)
                ))
                .into());
            }
            None => {}
        }
        if let Some(metrics) = crate::metrics::get() {
            metrics.node_store_ops_total.with_label_values(&["put"]).inc();
            metrics
                .node_store_op_bytes
                .with_label_values(&["put"])
                .observe(value.len() as f64);
        }
        entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        if let Some(metrics) = crate::metrics::get() {
            metrics.node_store_ops_total.with_label_values(&["remove"]).inc();
        }
        self.entries.write().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &[u8], limit: usize) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        if let Some(metrics) = crate::metrics::get() {
            metrics.node_store_ops_total.with_label_values(&["scan"]).inc();
        }
        Ok(self
            .entries
            .read()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
