// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The public authenticated map built on top of [`crate::jellyfish_merkle`]: a
//! [`SparseMerkleTrie`] hides the tree/cache/node-batch plumbing behind `get`/`put`/`remove`/
//! `scan`/`root_hash`, the operations named in §4.D.

use crate::error::WorldStateError;
use crate::jellyfish_merkle::hash::{SMTHash, SMTNodeHash, SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE};
use crate::jellyfish_merkle::iterator::JellyfishMerkleIterator;
use crate::jellyfish_merkle::node_type::{Node, NodeKey};
use crate::jellyfish_merkle::{JellyfishMerkleTree, NodeBatch, TreeReader, TreeWriter};
use crate::node_store::NodeStore;
use crate::{Key, SMTObject, Value};
use anyhow::Result;
use std::marker::PhantomData;
use std::sync::Arc;

/// Bridges the byte-level [`NodeStore`] to the tree layer's [`TreeReader`]/[`TreeWriter`]
/// traits, which speak in terms of [`Node`] rather than raw bytes.
struct NodeStoreAdapter<'a, S>(&'a S);

impl<'a, S, K, V> TreeReader<K, V> for NodeStoreAdapter<'a, S>
where
    S: NodeStore,
    K: Key,
    V: Value,
{
    fn get_node_option(&self, node_key: &NodeKey) -> Result<Option<Node<K, V>>> {
        if *node_key == *SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE {
            return Ok(Some(Node::Null));
        }
        match self.0.get_opt(node_key.as_bytes())? {
            Some(bytes) => Ok(Some(Node::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<'a, S, K, V> TreeWriter<K, V> for NodeStoreAdapter<'a, S>
where
    S: NodeStore,
    K: Key,
    V: Value,
{
    fn write_node_batch(&self, node_batch: &NodeBatch<K, V>) -> Result<()> {
        for (node_key, node) in node_batch.iter() {
            self.0.put(node_key.as_bytes().to_vec(), node.encode()?)?;
        }
        Ok(())
    }
}

/// An authenticated key-value map over `S`, addressed by its current root hash. Every mutation
/// returns a *new* `SparseMerkleTrie` sharing the same underlying store (nodes are
/// content-addressed and the store is append-only, so old roots stay valid and cheap to keep
/// around).
pub struct SparseMerkleTrie<K, V, S> {
    store: Arc<S>,
    root_hash: SMTNodeHash,
    _key: PhantomData<K>,
    _value: PhantomData<V>,
}

impl<K, V, S> Clone for SparseMerkleTrie<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            root_hash: self.root_hash,
            _key: PhantomData,
            _value: PhantomData,
        }
    }
}

impl<K, V, S> SparseMerkleTrie<K, V, S>
where
    K: Key,
    V: Value,
    S: NodeStore,
{
    /// A freshly constructed trie over an empty store reports the sentinel empty-tree root hash.
    pub fn new(store: Arc<S>) -> Self {
        Self::new_with_root(store, *SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE)
    }

    /// Rehydrates a trie reader/writer pointed at an existing root, e.g. one of the three roots
    /// recorded in a block header.
    pub fn new_with_root(store: Arc<S>, root_hash: SMTNodeHash) -> Self {
        Self {
            store,
            root_hash,
            _key: PhantomData,
            _value: PhantomData,
        }
    }

    pub fn root_hash(&self) -> SMTNodeHash {
        self.root_hash
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn get_opt(&self, key: K) -> Result<Option<V>> {
        let adapter = NodeStoreAdapter(self.store.as_ref());
        let tree = JellyfishMerkleTree::new(&adapter);
        let (value, _proof) = tree.get_with_proof(self.root_hash, key)?;
        Ok(value.map(|obj| obj.origin))
    }

    pub fn get(&self, key: K) -> Result<V> {
        self.get_opt(key)?
            .ok_or_else(|| WorldStateError::key_not_found(format!("{:x}", key.merkle_hash())).into())
    }

    pub fn exist(&self, key: K) -> Result<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    /// Writes `(key, value)`, returning a new trie whose root hash reflects the update.
    pub fn put(&self, key: K, value: V) -> Result<Self> {
        let adapter = NodeStoreAdapter(self.store.as_ref());
        let tree = JellyfishMerkleTree::new(&adapter);
        let object = value.into_object()?;
        let (new_root, batch) = tree.insert_all(Some(self.root_hash), vec![(key, object)])?;
        adapter.write_node_batch(&batch.node_batch)?;
        Ok(Self::new_with_root(self.store.clone(), new_root))
    }

    /// Removes `key`, returning a new trie whose root hash reflects the update. Removing a
    /// missing key is a no-op producing the same root (§4.D only surfaces `key-not-found` from
    /// `get`, not from `remove`, since the tree itself cannot distinguish "absent" from
    /// "never present").
    pub fn remove(&self, key: K) -> Result<Self> {
        let adapter = NodeStoreAdapter(self.store.as_ref());
        let tree = JellyfishMerkleTree::new(&adapter);
        let (new_root, batch) =
            tree.updates(Some(self.root_hash), vec![(key, None::<SMTObject<V>>)])?;
        adapter.write_node_batch(&batch.node_batch)?;
        Ok(Self::new_with_root(self.store.clone(), new_root))
    }

    /// Up to `limit` `(key, value)` pairs with key hash `>= start_key.merkle_hash()` (or from the
    /// very first key, if `start_key` is `None`) in ascending key-hash order.
    pub fn scan(&self, start_key: Option<K>, limit: usize) -> Result<Vec<(K, V)>> {
        let adapter = NodeStoreAdapter(self.store.as_ref());
        let iter: JellyfishMerkleIterator<'_, NodeStoreAdapter<'_, S>, K, V> =
            JellyfishMerkleIterator::new(&adapter, self.root_hash, start_key)?;
        let mut out = Vec::with_capacity(limit);
        for item in iter.take(limit) {
            let (key, object) = item?;
            out.push((key, object.origin));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_store::InMemoryNodeStore;
    use crate::types::{AssetOutput, TxOutput, TxOutputRef};
    use primitive_types::H256;

    fn ref_key(byte: u8) -> TxOutputRef {
        let mut bytes = [0u8; 32];
        bytes[31] = byte;
        TxOutputRef::from(H256::from(bytes))
    }

    fn asset(tag: u64) -> TxOutput {
        TxOutput::Asset(AssetOutput { amount: tag })
    }

    #[test]
    fn empty_trie_reports_sentinel_root() {
        let store = Arc::new(InMemoryNodeStore::new());
        let trie: SparseMerkleTrie<TxOutputRef, TxOutput, InMemoryNodeStore> =
            SparseMerkleTrie::new(store);
        assert_eq!(trie.root_hash(), *SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE);
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = Arc::new(InMemoryNodeStore::new());
        let trie: SparseMerkleTrie<TxOutputRef, TxOutput, InMemoryNodeStore> =
            SparseMerkleTrie::new(store);
        let trie = trie.put(ref_key(1), asset(10)).unwrap();
        assert_eq!(trie.get(ref_key(1)).unwrap(), asset(10));
    }

    #[test]
    fn put_remove_returns_to_sentinel_root() {
        let store = Arc::new(InMemoryNodeStore::new());
        let trie: SparseMerkleTrie<TxOutputRef, TxOutput, InMemoryNodeStore> =
            SparseMerkleTrie::new(store);
        let trie = trie.put(ref_key(1), asset(10)).unwrap();
        let trie = trie.remove(ref_key(1)).unwrap();
        assert_eq!(trie.root_hash(), *SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE);
        assert!(trie.get_opt(ref_key(1)).unwrap().is_none());
    }

    #[test]
    fn root_hash_is_order_independent() {
        let store_a = Arc::new(InMemoryNodeStore::new());
        let a = SparseMerkleTrie::<TxOutputRef, TxOutput, InMemoryNodeStore>::new(store_a)
            .put(ref_key(1), asset(1))
            .unwrap()
            .put(ref_key(2), asset(2))
            .unwrap();

        let store_b = Arc::new(InMemoryNodeStore::new());
        let b = SparseMerkleTrie::<TxOutputRef, TxOutput, InMemoryNodeStore>::new(store_b)
            .put(ref_key(2), asset(2))
            .unwrap()
            .put(ref_key(1), asset(1))
            .unwrap();

        assert_eq!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn scan_returns_ascending_key_hash_order() {
        let store = Arc::new(InMemoryNodeStore::new());
        let trie = SparseMerkleTrie::<TxOutputRef, TxOutput, InMemoryNodeStore>::new(store)
            .put(ref_key(1), asset(1))
            .unwrap()
            .put(ref_key(2), asset(2))
            .unwrap()
            .put(ref_key(3), asset(3))
            .unwrap();
        let all = trie.scan(None, 10).unwrap();
        assert_eq!(all.len(), 3);
        let limited = trie.scan(None, 2).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
