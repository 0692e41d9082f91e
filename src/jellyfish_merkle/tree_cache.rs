// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Starcoin Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! An in-memory overlay of freshly created nodes, consulted before falling through to the
//! underlying [`super::TreeReader`]. A single [`TreeCache`] lives for the duration of one
//! [`super::JellyfishMerkleTree::puts`] call and is drained into a [`super::TreeUpdateBatch`]
//! once every key in the batch has been applied.
//!
//! Nodes are content-addressed, so there is nothing to mark "stale" here: a node that stops
//! being reachable from the new root simply never gets referenced again. Reclaiming the bytes
//! it occupies in the underlying store is a separate, out-of-band concern.

use super::hash::SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE;
use super::node_type::{Node, NodeKey};
use super::{NodeBatch, TreeReader, TreeUpdateBatch};
use crate::{Key, Value};
use anyhow::Result;
use std::collections::HashMap;
use std::marker::PhantomData;

pub(crate) struct TreeCache<'a, R, K, V> {
    reader: &'a R,
    root_node_key: NodeKey,
    node_cache: HashMap<NodeKey, Node<K, V>>,
    num_new_leaves: usize,
    key: PhantomData<K>,
    value: PhantomData<V>,
}

impl<'a, R, K, V> TreeCache<'a, R, K, V>
where
    K: Key,
    V: Value,
    R: 'a + TreeReader<K, V>,
{
    pub fn new(reader: &'a R, root_hash: Option<NodeKey>) -> Self {
        Self {
            reader,
            root_node_key: root_hash.unwrap_or(*SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE),
            node_cache: HashMap::new(),
            num_new_leaves: 0,
            key: PhantomData,
            value: PhantomData,
        }
    }

    pub fn get_root_node_key(&self) -> &NodeKey {
        &self.root_node_key
    }

    pub fn set_root_node_key(&mut self, root_node_key: NodeKey) {
        self.root_node_key = root_node_key;
    }

    pub fn get_node(&self, node_key: &NodeKey) -> Result<Node<K, V>> {
        if *node_key == *SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE {
            return Ok(Node::Null);
        }
        match self.node_cache.get(node_key) {
            Some(node) => Ok(node.clone()),
            None => self.reader.get_node(node_key),
        }
    }

    pub fn put_node(&mut self, node_key: NodeKey, node: Node<K, V>) -> Result<()> {
        if node.is_leaf() {
            self.num_new_leaves += 1;
        }
        self.node_cache.insert(node_key, node);
        Ok(())
    }

    /// A node at `node_key` is no longer reachable from the root being built. Since nodes are
    /// content-addressed and the store never deletes, there is nothing to do here besides drop
    /// it from this batch's own overlay if it was only ever staged in-memory.
    pub fn delete_node(&mut self, node_key: &NodeKey, _is_leaf: bool) {
        self.node_cache.remove(node_key);
    }

    /// Drains this cache into the batch the caller will persist, together with the resulting
    /// root hash.
    pub fn into_batch(self) -> (NodeKey, TreeUpdateBatch<K, V>) {
        let node_batch: NodeBatch<K, V> = self.node_cache.into_iter().collect();
        let batch = TreeUpdateBatch {
            num_new_leaves: self.num_new_leaves,
            node_batch,
        };
        (self.root_node_key, batch)
    }
}
