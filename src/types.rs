// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The world-state entity types (§3): the UTXO map's key/value pair, contract state, and
//! deduplicated contract code. Each key type is a thin 32-byte [`H256`] newtype satisfying
//! [`Key`]; each value type satisfies [`Value`] by deriving `Serialize`/`Deserialize` (BCS is
//! the wire codec, applied generically by `SMTObject`).

use crate::Hash;
use primitive_types::H256;
use serde::{Deserialize, Serialize};

macro_rules! hash_key {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        pub struct $name(pub H256);

        impl From<H256> for $name {
            fn from(h: H256) -> Self {
                Self(h)
            }
        }

        impl From<$name> for H256 {
            fn from(k: $name) -> Self {
                k.0
            }
        }
    };
}

hash_key!(TxOutputRef);
hash_key!(ContractId);

/// An unspent output: either a plain asset or a contract's output. `getAsset` (§4.G) fails
/// *expected-asset* when it finds the `Contract` variant under a ref the caller believed held an
/// asset.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TxOutput {
    Asset(AssetOutput),
    Contract(ContractOutput),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AssetOutput {
    pub amount: u64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractOutput {
    pub contract_id: ContractId,
}

/// A contract's mutable state: its opaque fields blob (interpreted by the out-of-scope VM), the
/// output ref it is currently attached to, and the hash of the code it runs.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractState {
    pub fields: Vec<u8>,
    pub output_ref: TxOutputRef,
    pub code_hash: Hash,
}

/// A deduplicated code blob, reference-counted across every contract instance that shares it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CodeRecord {
    pub code: Vec<u8>,
    pub ref_count: u64,
}

impl CodeRecord {
    pub fn new(code: Vec<u8>) -> Self {
        Self { code, ref_count: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_output_ref_round_trips_through_h256() {
        let h = H256::random();
        let key = TxOutputRef::from(h);
        assert_eq!(H256::from(key), h);
    }

    #[test]
    fn code_record_new_starts_at_ref_count_one() {
        let record = CodeRecord::new(vec![1, 2, 3]);
        assert_eq!(record.ref_count, 1);
    }
}
