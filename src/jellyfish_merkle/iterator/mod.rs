// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Starcoin Core Contributors
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! A depth-first, key-ascending iterator over a tree rooted at a fixed hash, able to resume from
//! an arbitrary starting key without visiting anything to its left. Backs [`super::scan`] and the
//! world-state prefix scan built on top of it.

#[cfg(test)]
mod iterator_test;

use super::hash::SMTNodeHash;
use super::nibble::Nibble;
use super::nibble_path::NibblePath;
use super::node_type::{InternalNode, Node};
use super::TreeReader;
use crate::{Key, SMTObject, Value};
use anyhow::Result;
use std::marker::PhantomData;

struct IteratorFrame {
    internal_node: InternalNode,
    next_child: u8,
}

/// Walks every leaf reachable from `root_hash` in ascending key-hash order, starting from the
/// first leaf whose key hash is greater than or equal to the given start key (or from the very
/// first leaf, if none was given).
pub(crate) struct JellyfishMerkleIterator<'a, R, K, V> {
    reader: &'a R,
    stack: Vec<IteratorFrame>,
    pending_leaf: Option<(K, SMTObject<V>)>,
    done: bool,
    key: PhantomData<K>,
    value: PhantomData<V>,
}

impl<'a, R, K, V> JellyfishMerkleIterator<'a, R, K, V>
where
    K: Key,
    V: Value,
    R: 'a + TreeReader<K, V>,
{
    pub fn new(reader: &'a R, root_hash: SMTNodeHash, start_key: Option<K>) -> Result<Self> {
        let target: Vec<Nibble> = match &start_key {
            Some(key) => NibblePath::new(key.merkle_hash().to_vec()).nibbles().collect(),
            None => Vec::new(),
        };

        let mut iter = Self {
            reader,
            stack: Vec::new(),
            pending_leaf: None,
            done: false,
            key: PhantomData,
            value: PhantomData,
        };
        iter.seek(root_hash, &target, 0)?;
        Ok(iter)
    }

    /// Descends along `target` (the nibble path of the start key) as far as it leads to an
    /// existing node, leaving every internal node visited along the way on the stack so `next()`
    /// can continue past it to siblings further to the right.
    fn seek(&mut self, node_key: SMTNodeHash, target: &[Nibble], depth: usize) -> Result<()> {
        match self.reader.get_node(&node_key)? {
            Node::Null => {}
            Node::Leaf(leaf) => {
                self.pending_leaf = Some((leaf.key().clone(), leaf.value().clone()));
            }
            Node::Internal(internal_node) => {
                let start_index: u8 = target.get(depth).copied().map_or(0, u8::from);
                let child = internal_node.child(Nibble::from(start_index)).cloned();
                // If the child at `start_index` exists, `seek` consumes it fully below (as a
                // pending leaf or as deeper frames); `next()` must resume just past it, not at
                // it, or it would re-emit that whole subtree on the way back up.
                let next_child = if child.is_some() {
                    start_index + 1
                } else {
                    start_index
                };
                self.stack.push(IteratorFrame {
                    internal_node,
                    next_child,
                });
                if let Some(child) = child {
                    self.seek(child.hash, target, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    /// Prints every (key, value) pair reachable from the root this iterator was built with, in
    /// ascending order. Exists for debugging tree shape in tests.
    pub fn print(mut self) -> Result<()> {
        loop {
            match self.next() {
                Some(Ok((key, value))) => {
                    tracing::debug!("{:x} -> {:x}", key.merkle_hash(), value.merkle_hash());
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            }
        }
    }
}

impl<'a, R, K, V> Iterator for JellyfishMerkleIterator<'a, R, K, V>
where
    K: Key,
    V: Value,
    R: 'a + TreeReader<K, V>,
{
    type Item = Result<(K, SMTObject<V>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(leaf) = self.pending_leaf.take() {
            return Some(Ok(leaf));
        }
        if self.done {
            return None;
        }

        loop {
            let frame = match self.stack.last_mut() {
                Some(frame) => frame,
                None => {
                    self.done = true;
                    return None;
                }
            };

            let next_child = (frame.next_child..16)
                .find_map(|i| frame.internal_node.child(Nibble::from(i)).map(|c| (i, c.hash)));

            let (index, child_hash) = match next_child {
                Some(found) => found,
                None => {
                    self.stack.pop();
                    continue;
                }
            };
            frame.next_child = index + 1;

            match self.reader.get_node(&child_hash) {
                Ok(Node::Leaf(leaf)) => {
                    return Some(Ok((leaf.key().clone(), leaf.value().clone())));
                }
                Ok(Node::Internal(internal_node)) => {
                    self.stack.push(IteratorFrame {
                        internal_node,
                        next_child: 0,
                    });
                }
                Ok(Node::Null) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
