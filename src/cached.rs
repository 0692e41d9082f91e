// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! A write-buffer over a persisted [`SparseMerkleTrie`] (§4.E). Reads consult the pending map
//! first and fall through to the underlying trie; `root_hash` is unavailable until `persist`
//! folds the buffer into a new persisted trie.

use crate::error::WorldStateError;
use crate::jellyfish_merkle::hash::SMTHash;
use crate::node_store::NodeStore;
use crate::smt::SparseMerkleTrie;
use crate::update_set::UpdateSet;
use crate::{Key, Value};
use anyhow::Result;

/// Buffers puts/removes against a persisted trie in memory, in the same "batch mutations, fold
/// on demand" shape as [`crate::jellyfish_merkle::JellyfishMerkleTree::puts`], but exposed as a
/// standing object a caller can keep mutating across many calls instead of a single batch call.
pub struct CachedSMT<K, V, S> {
    persisted: SparseMerkleTrie<K, V, S>,
    pending: UpdateSet<K, V>,
}

impl<K, V, S> CachedSMT<K, V, S>
where
    K: Key,
    V: Value,
    S: NodeStore,
{
    pub fn new(persisted: SparseMerkleTrie<K, V, S>) -> Self {
        Self {
            persisted,
            pending: UpdateSet::new(),
        }
    }

    pub fn get_opt(&self, key: K) -> Result<Option<V>> {
        match self.pending.get_raw(&key) {
            Some(Some(value)) => Ok(Some(value.clone())),
            Some(None) => Ok(None),
            None => self.persisted.get_opt(key),
        }
    }

    pub fn get(&self, key: K) -> Result<V> {
        self.get_opt(key)?
            .ok_or_else(|| WorldStateError::key_not_found(format!("{:x}", key.merkle_hash())).into())
    }

    pub fn exist(&self, key: K) -> Result<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    pub fn put(&mut self, key: K, value: V) {
        self.pending.put(key, value);
    }

    pub fn remove(&mut self, key: K) {
        self.pending.remove(key);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Every key with a pending entry (put or remove) paired with its persisted-trie-shadowing
    /// value, followed by every key in the persisted trie's scan window not already covered by a
    /// pending entry. Used by `WorldState::scan_assets` to resolve a prefix scan across both
    /// layers without materializing the whole trie.
    pub fn scan(&self, start_key: Option<K>, limit: usize) -> Result<Vec<(K, V)>> {
        let start_hash = start_key.map(|k| k.merkle_hash());
        let mut out: Vec<(K, V)> = self
            .pending
            .iter()
            .filter(|(k, _)| start_hash.map(|start| k.merkle_hash() >= start).unwrap_or(true))
            .filter_map(|(k, v)| v.clone().map(|v| (*k, v)))
            .collect();
        // The persisted scan is itself hash-ordered and only bounded below by `start_key`, so it
        // can return entries the pending map already shadows (put or removed) anywhere in the
        // window, not just its first `limit` slots; fetch the same window size from it and dedupe,
        // then sort/truncate the merged set by key hash so neither layer's bound is applied early.
        for (key, value) in self.persisted.scan(start_key, limit)? {
            if self.pending.get_raw(&key).is_some() {
                continue;
            }
            out.push((key, value));
        }
        out.sort_by_key(|(k, _)| k.merkle_hash());
        out.truncate(limit);
        Ok(out)
    }

    /// Drains the pending map into the underlying trie in key order, writing the resulting new
    /// nodes to the byte store and returning a new persisted trie. Idempotent on the semantic
    /// state: persisting the same pending set twice from the same starting root yields the same
    /// resulting root both times.
    pub fn persist(mut self) -> Result<SparseMerkleTrie<K, V, S>> {
        let mut trie = self.persisted;
        for (key, value) in std::mem::take(&mut self.pending).into_iter() {
            trie = match value {
                Some(value) => trie.put(key, value)?,
                None => trie.remove(key)?,
            };
        }
        tracing::debug!(root = %format!("{:x}", trie.root_hash()), "cached smt persisted");
        Ok(trie)
    }
}
