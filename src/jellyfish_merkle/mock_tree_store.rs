// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Starcoin Core Contributors
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::hash::*;
use super::{
    NodeBatch, TreeReader, TreeUpdateBatch, TreeWriter,
    node_type::{Node, NodeKey},
};
use crate::{Key, SMTObject, Value};
use anyhow::{Result, bail, ensure};
use primitive_types::H256;
#[cfg(any(test, feature = "fuzzing"))]
use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, hash_map::Entry},
    sync::RwLock,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(any(test, feature = "fuzzing"), derive(Arbitrary))]
pub(crate) struct TestKey(pub SMTNodeHash);

impl From<H256> for TestKey {
    fn from(hash: H256) -> Self {
        Self(hash.into())
    }
}

impl From<TestKey> for H256 {
    fn from(key: TestKey) -> H256 {
        key.0.into()
    }
}

impl TestKey {
    pub fn new(value: [u8; SMTNodeHash::LEN]) -> TestKey {
        Self(SMTNodeHash::new(value))
    }

    pub fn new_with_hash(hash_value: SMTNodeHash) -> TestKey {
        Self(hash_value)
    }

    pub fn random() -> TestKey {
        Self::new_with_hash(SMTNodeHash::random())
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn into_object(self) -> Result<SMTObject<Self>> {
        let raw = self.0.to_vec();
        let hash = self.0;
        Ok(SMTObject::new_for_test(self, raw, hash))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "fuzzing"), derive(Arbitrary))]
pub(crate) struct TestValue {
    pub value: Vec<u8>,
}

impl TestValue {
    pub fn random() -> Self {
        Self {
            value: SMTNodeHash::random().to_vec(),
        }
    }
}

impl From<Vec<u8>> for TestValue {
    fn from(value: Vec<u8>) -> Self {
        Self { value }
    }
}

#[derive(Default)]
pub(crate) struct MockTreeStore<K, V>(RwLock<HashMap<NodeKey, Node<K, V>>>);

pub(crate) type MockTestStore = MockTreeStore<TestKey, TestValue>;

impl MockTestStore {
    pub fn new_test() -> Self {
        MockTreeStore(RwLock::new(HashMap::new()))
    }
}

impl<K, V> TreeReader<K, V> for MockTreeStore<K, V>
where
    K: Key,
    V: Value,
{
    fn get_node_option(&self, node_key: &NodeKey) -> Result<Option<Node<K, V>>> {
        Ok(self.0.read().unwrap().get(node_key).cloned())
    }
}

impl<K, V> TreeWriter<K, V> for MockTreeStore<K, V>
where
    K: Key,
    V: Value,
{
    fn write_node_batch(&self, node_batch: &NodeBatch<K, V>) -> Result<()> {
        let mut locked = self.0.write().unwrap();
        for (node_key, node) in node_batch.clone() {
            ensure!(locked.insert(node_key, node).is_none());
        }
        Ok(())
    }
}

impl<K, V> MockTreeStore<K, V> {
    pub fn put_node(&self, node_key: NodeKey, node: Node<K, V>) -> Result<()> {
        match self.0.write().unwrap().entry(node_key) {
            Entry::Occupied(o) => bail!("Key {:?} exists.", o.key()),
            Entry::Vacant(v) => {
                v.insert(node);
            }
        }
        Ok(())
    }

    pub fn write_tree_update_batch(&self, batch: TreeUpdateBatch<K, V>) -> Result<()> {
        batch
            .node_batch
            .into_iter()
            .map(|(k, v)| self.put_node(k, v))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    pub fn num_nodes(&self) -> usize {
        self.0.read().unwrap().len()
    }
}
