// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Starcoin Core Contributors
// SPDX-License-Identifier: Apache-2.0

// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The 32-byte digest type used throughout the trie: node identity, key hashing and the
//! sentinel "placeholder" hash that stands in for an empty subtree.
//!
//! Every node hash is a BIP-340-style tagged sha256 (`sha256(tag_hash || tag_hash || data)`)
//! rather than a bare `sha256(data)`, so that a leaf's serialized bytes can never collide with
//! an internal node's or a raw key's under a different domain.

use anyhow::{Result, ensure};
use bitcoin_hashes::{Hash as _, sha256};
use once_cell::sync::Lazy;
use primitive_types::H256;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

const NODE_HASH_TAG: &[u8] = b"world-state/smt-node";

/// A 32-byte node/key digest. Thin newtype over [`H256`] so the trie code reads in terms of
/// "hash of a thing" rather than a generic 256-bit integer.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct SMTNodeHash(H256);

impl SMTNodeHash {
    pub const LEN: usize = 32;
    pub const LEN_IN_BITS: usize = Self::LEN * 8;

    pub fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(H256::from(bytes))
    }

    pub fn random() -> Self {
        let mut bytes = [0u8; Self::LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    pub fn random_with_rng<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; Self::LEN];
        rng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    /// Packs an iterator of `LEN_IN_BITS` bits, most-significant first, back into a hash.
    pub fn from_bit_iter(iter: impl Iterator<Item = bool>) -> Result<Self> {
        let bits: Vec<bool> = iter.collect();
        ensure!(
            bits.len() == Self::LEN_IN_BITS,
            "expected {} bits, got {}",
            Self::LEN_IN_BITS,
            bits.len()
        );
        let mut bytes = [0u8; Self::LEN];
        for (i, bit) in bits.into_iter().enumerate() {
            if bit {
                bytes[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        Ok(Self::new(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() == Self::LEN,
            "invalid hash length: expected {}, got {}",
            Self::LEN,
            bytes.len()
        );
        let mut buf = [0u8; Self::LEN];
        buf.copy_from_slice(bytes);
        Ok(Self::new(buf))
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Domain-separated hash of an arbitrary byte string. Used both for hashing a node's
    /// canonical encoding and (via [`crate::Key`]) for deriving a key's position in the trie.
    pub fn tag_sha256(data: &[u8]) -> Self {
        let tag_hash = sha256::Hash::hash(NODE_HASH_TAG);
        let mut engine = sha256::Hash::engine();
        engine.input(tag_hash.as_byte_array());
        engine.input(tag_hash.as_byte_array());
        engine.input(data);
        let digest = sha256::Hash::from_engine(engine);
        Self::new(*digest.as_byte_array())
    }

    /// Combines two child hashes into their parent's hash in the virtual binary tree that
    /// [`super::node_type::InternalNode`] folds 16 children into (see its `make_hash`).
    pub fn from_node_hashes(left: SMTNodeHash, right: SMTNodeHash) -> Self {
        let mut buf = Vec::with_capacity(Self::LEN * 2);
        buf.extend_from_slice(left.as_bytes());
        buf.extend_from_slice(right.as_bytes());
        Self::tag_sha256(&buf)
    }

    /// Iterates over the bits of this hash, most-significant bit first.
    pub fn iter_bits(&self) -> impl DoubleEndedIterator<Item = bool> + '_ {
        (0..Self::LEN_IN_BITS).map(move |i| {
            let byte = self.0.as_bytes()[i / 8];
            let bit = 7 - (i % 8);
            (byte >> bit) & 1 == 1
        })
    }

    /// Number of leading bits `self` and `other` share.
    pub fn common_prefix_bits_len(&self, other: Self) -> usize {
        self.iter_bits()
            .zip(other.iter_bits())
            .take_while(|(a, b)| a == b)
            .count()
    }
}

impl fmt::Debug for SMTNodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self)
    }
}

impl fmt::LowerHex for SMTNodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.as_bytes()))
    }
}

impl From<H256> for SMTNodeHash {
    fn from(h: H256) -> Self {
        Self(h)
    }
}

impl From<SMTNodeHash> for H256 {
    fn from(h: SMTNodeHash) -> Self {
        h.0
    }
}

/// Anything that can authenticate itself with a 32-byte digest: trie nodes, keys, and the
/// serialized values they carry.
pub trait SMTHash {
    fn merkle_hash(&self) -> SMTNodeHash;
}

pub(crate) type Hash = SMTNodeHash;

/// The content hash of the canonical empty-subtree sentinel. Any [`super::node_type::Node::Null`]
/// hashes to this constant, and a freshly constructed [`crate::SparseMerkleTrie`] reports it as
/// its root hash.
pub static SPARSE_MERKLE_PLACEHOLDER_HASH: Lazy<H256> =
    Lazy::new(|| *SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE);

pub static SPARSE_MERKLE_PLACEHOLDER_HASH_VALUE: Lazy<SMTNodeHash> =
    Lazy::new(|| SMTNodeHash::tag_sha256(b"world-state/empty-subtree"));
