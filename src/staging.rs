// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! A rollbackable speculative layer over a [`CachedSMT`] (§4.F): its own pending map, read-through
//! to the enclosing cache, and an Open/Closed state machine — `commit`/`rollback` close it and
//! further mutation attempts are an error.

use crate::cached::CachedSMT;
use crate::error::WorldStateError;
use crate::jellyfish_merkle::hash::SMTHash;
use crate::node_store::NodeStore;
use crate::update_set::UpdateSet;
use crate::{Key, Value};
use anyhow::Result;

/// A staging view over `'a mut CachedSMT<K, V, S>`. Reads consult its own pending map, then the
/// enclosing cache's pending map, then the persisted trie underneath that. `commit` merges this
/// layer's pending entries into the cache (staging wins on conflict); `rollback` discards them.
/// Either transition closes the staging instance.
pub struct StagingSMT<'a, K, V, S> {
    cache: &'a mut CachedSMT<K, V, S>,
    pending: UpdateSet<K, V>,
    open: bool,
}

impl<'a, K, V, S> StagingSMT<'a, K, V, S>
where
    K: Key,
    V: Value,
    S: NodeStore,
{
    pub fn new(cache: &'a mut CachedSMT<K, V, S>) -> Self {
        Self {
            cache,
            pending: UpdateSet::new(),
            open: true,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.open {
            return Err(WorldStateError::invariant("operation on a closed StagingSMT").into());
        }
        Ok(())
    }

    pub fn get_opt(&self, key: K) -> Result<Option<V>> {
        self.ensure_open()?;
        match self.pending.get_raw(&key) {
            Some(Some(value)) => Ok(Some(value.clone())),
            Some(None) => Ok(None),
            None => self.cache.get_opt(key),
        }
    }

    pub fn get(&self, key: K) -> Result<V> {
        self.get_opt(key)?
            .ok_or_else(|| WorldStateError::key_not_found(format!("{:x}", key.merkle_hash())).into())
    }

    pub fn exist(&self, key: K) -> Result<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    pub fn put(&mut self, key: K, value: V) -> Result<()> {
        self.ensure_open()?;
        self.pending.put(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: K) -> Result<()> {
        self.ensure_open()?;
        self.pending.remove(key);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Merges this layer's pending entries into the enclosing cache (staging entries win on
    /// conflict with anything already pending there), then closes this instance. Further
    /// mutation or read calls on a closed instance return [`WorldStateError::InvariantViolation`].
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        for (key, value) in std::mem::take(&mut self.pending).into_iter() {
            match value {
                Some(value) => self.cache.put(key, value),
                None => self.cache.remove(key),
            }
        }
        self.open = false;
        if let Some(metrics) = crate::metrics::get() {
            metrics
                .staging_transitions_total
                .with_label_values(&["commit"])
                .inc();
        }
        tracing::debug!("staging smt committed");
        Ok(())
    }

    /// Discards this layer's pending entries without touching the enclosing cache, then closes
    /// this instance.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.pending.clear();
        self.open = false;
        if let Some(metrics) = crate::metrics::get() {
            metrics
                .staging_transitions_total
                .with_label_values(&["rollback"])
                .inc();
        }
        tracing::debug!("staging smt rolled back");
        Ok(())
    }
}
