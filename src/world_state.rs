// Copyright (c) Kanari Network
// SPDX-License-Identifier: Apache-2.0

//! The world-state façade (§4.G): three logically independent tries — unspent outputs,
//! contract state, and deduplicated contract code — bundled behind one object per mutation
//! layer, exposing the domain operations a validator/VM actually calls (assets, contracts,
//! code) instead of raw trie `get`/`put`.
//!
//! Per §9's "tagged variant, not deep inheritance" note, `Persisted`/`Cached`/`Staging` are three
//! concrete types (their underlying trees have genuinely different shapes — owned tries, an
//! owned write-buffer, a borrowed speculative layer) sharing a [`WorldStateRead`] trait; only
//! `Cached`/`Staging` additionally implement [`WorldStateWrite`].

use crate::cached::CachedSMT;
use crate::config::WorldStateConfig;
use crate::error::WorldStateError;
use crate::jellyfish_merkle::hash::SMTNodeHash;
use crate::node_store::NodeStore;
use crate::smt::SparseMerkleTrie;
use crate::staging::StagingSMT;
use crate::types::{AssetOutput, CodeRecord, ContractId, ContractState, TxOutput, TxOutputRef};
use crate::Hash;
use anyhow::Result;
use std::sync::Arc;

fn code_hash(code: &[u8]) -> Hash {
    SMTNodeHash::tag_sha256(code)
}

/// Read capability shared by every mutation layer.
pub trait WorldStateRead {
    fn get_asset_opt(&self, output_ref: TxOutputRef) -> Result<Option<TxOutput>>;
    fn get_contract_opt(&self, id: ContractId) -> Result<Option<ContractState>>;
    fn get_code_opt(&self, hash: Hash) -> Result<Option<CodeRecord>>;

    /// Fetches an asset output. Fails with [`WorldStateError::InvariantViolation`] if the
    /// output under `output_ref` exists but is a contract output, not an asset.
    fn get_asset(&self, output_ref: TxOutputRef) -> Result<AssetOutput> {
        match self.get_asset_opt(output_ref)? {
            Some(TxOutput::Asset(asset)) => Ok(asset),
            Some(TxOutput::Contract(_)) => Err(WorldStateError::invariant(format!(
                "expected asset output at {:x}, found contract output",
                H256Display(output_ref)
            ))
            .into()),
            None => Err(WorldStateError::key_not_found(format!("{:x}", H256Display(output_ref))).into()),
        }
    }

    fn get_contract(&self, id: ContractId) -> Result<ContractState> {
        self.get_contract_opt(id)?
            .ok_or_else(|| WorldStateError::key_not_found(format!("{:x}", H256Display(id))).into())
    }
}

/// Write capability, available only on `Cached`/`Staging` layers. Checked/unchecked pairs follow
/// §9's convention: `_unchecked` elides a precondition check the caller has already established
/// (no `unsafe` keyword is involved — this is documentation-by-naming, as in the original repo).
pub trait WorldStateWrite: WorldStateRead {
    fn add_asset(&mut self, output_ref: TxOutputRef, output: AssetOutput) -> Result<()>;

    fn remove_asset(&mut self, output_ref: TxOutputRef) -> Result<()>;

    /// Creates a contract without checking whether `contract_id` already exists.
    fn create_contract_unchecked(
        &mut self,
        code: Vec<u8>,
        fields: Vec<u8>,
        contract_id: ContractId,
        output_ref: TxOutputRef,
    ) -> Result<()>;

    /// Creates a contract, failing with `InvariantViolation` if `contract_id` already has state.
    fn create_contract(
        &mut self,
        code: Vec<u8>,
        fields: Vec<u8>,
        contract_id: ContractId,
        output_ref: TxOutputRef,
    ) -> Result<()> {
        if self.get_contract_opt(contract_id)?.is_some() {
            return Err(WorldStateError::invariant(format!(
                "contract {:x} already exists",
                H256Display(contract_id)
            ))
            .into());
        }
        self.create_contract_unchecked(code, fields, contract_id, output_ref)
    }

    fn update_contract_fields(&mut self, id: ContractId, fields: Vec<u8>) -> Result<()>;

    fn update_contract_output(
        &mut self,
        id: ContractId,
        output_ref: TxOutputRef,
        output: TxOutput,
    ) -> Result<()>;

    /// Removes a contract's state and its asset output, decrementing the code's ref count
    /// (deleting the code entry when it reaches zero). `InvariantViolation` if the ref count is
    /// already zero (double-remove) or the code entry is missing entirely.
    fn remove_contract(&mut self, id: ContractId) -> Result<()>;
}

/// Wraps a key so it can be hex-formatted through `SMTHash::merkle_hash` without requiring every
/// entity key type to implement `LowerHex` directly.
struct H256Display<K>(K);

impl<K: crate::Key> std::fmt::LowerHex for H256Display<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use crate::jellyfish_merkle::hash::SMTHash;
        write!(f, "{:x}", self.0.merkle_hash())
    }
}

/// An immutable, persisted world state. Shared read use is safe without locking (§5): nodes are
/// content-addressed and this value never mutates in place.
pub struct PersistedWorldState<S> {
    outputs: SparseMerkleTrie<TxOutputRef, TxOutput, S>,
    contracts: SparseMerkleTrie<ContractId, ContractState, S>,
    code: SparseMerkleTrie<Hash, CodeRecord, S>,
}

impl<S: NodeStore> PersistedWorldState<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            outputs: SparseMerkleTrie::new(store.clone()),
            contracts: SparseMerkleTrie::new(store.clone()),
            code: SparseMerkleTrie::new(store),
        }
    }

    pub fn outputs_root(&self) -> SMTNodeHash {
        self.outputs.root_hash()
    }

    pub fn contracts_root(&self) -> SMTNodeHash {
        self.contracts.root_hash()
    }

    pub fn code_root(&self) -> SMTNodeHash {
        self.code.root_hash()
    }

    /// `H(outRoot ‖ contractRoot)` — the code root is deliberately excluded since code is
    /// content-addressed and authenticated by reference from each contract state, not by its
    /// position in the code trie (§4.G).
    pub fn block_state_hash(&self) -> SMTNodeHash {
        SMTNodeHash::from_node_hashes(self.outputs_root(), self.contracts_root())
    }

    pub fn scan_assets(&self, start: Option<TxOutputRef>, limit: usize) -> Result<Vec<(TxOutputRef, AssetOutput)>> {
        Ok(self
            .outputs
            .scan(start, limit)?
            .into_iter()
            .filter_map(|(k, v)| match v {
                TxOutput::Asset(asset) => Some((k, asset)),
                TxOutput::Contract(_) => None,
            })
            .collect())
    }

    pub fn to_cached(&self, config: WorldStateConfig) -> CachedWorldState<S> {
        CachedWorldState {
            outputs: CachedSMT::new(self.outputs.clone()),
            contracts: CachedSMT::new(self.contracts.clone()),
            code: CachedSMT::new(self.code.clone()),
            config,
        }
    }
}

impl<S: NodeStore> WorldStateRead for PersistedWorldState<S> {
    fn get_asset_opt(&self, output_ref: TxOutputRef) -> Result<Option<TxOutput>> {
        self.outputs.get_opt(output_ref)
    }

    fn get_contract_opt(&self, id: ContractId) -> Result<Option<ContractState>> {
        self.contracts.get_opt(id)
    }

    fn get_code_opt(&self, hash: Hash) -> Result<Option<CodeRecord>> {
        self.code.get_opt(hash)
    }
}

/// A write-buffered world state. One validator task owns this while validating a block, opening
/// a [`StagingWorldState`] per transaction.
pub struct CachedWorldState<S> {
    outputs: CachedSMT<TxOutputRef, TxOutput, S>,
    contracts: CachedSMT<ContractId, ContractState, S>,
    code: CachedSMT<Hash, CodeRecord, S>,
    config: WorldStateConfig,
}

impl<S: NodeStore> CachedWorldState<S> {
    /// Folds all three pending maps into the underlying tries, returning a new persisted world
    /// state whose roots enter the block header.
    pub fn persist(self) -> Result<PersistedWorldState<S>> {
        Ok(PersistedWorldState {
            outputs: self.outputs.persist()?,
            contracts: self.contracts.persist()?,
            code: self.code.persist()?,
        })
    }

    /// Advisory only: this crate never triggers `persist()` on its own.
    pub fn should_flush(&self) -> bool {
        let total = self.outputs.pending_len() + self.contracts.pending_len() + self.code.pending_len();
        total >= self.config.cache_flush_threshold
    }

    pub fn scan_assets(
        &self,
        start: Option<TxOutputRef>,
        limit: Option<usize>,
    ) -> Result<Vec<(TxOutputRef, AssetOutput)>> {
        let limit = limit.unwrap_or(self.config.scan_default_limit);
        Ok(self
            .outputs
            .scan(start, limit)?
            .into_iter()
            .filter_map(|(k, v)| match v {
                TxOutput::Asset(asset) => Some((k, asset)),
                TxOutput::Contract(_) => None,
            })
            .collect())
    }
}

impl<S: NodeStore> WorldStateRead for CachedWorldState<S> {
    fn get_asset_opt(&self, output_ref: TxOutputRef) -> Result<Option<TxOutput>> {
        self.outputs.get_opt(output_ref)
    }

    fn get_contract_opt(&self, id: ContractId) -> Result<Option<ContractState>> {
        self.contracts.get_opt(id)
    }

    fn get_code_opt(&self, hash: Hash) -> Result<Option<CodeRecord>> {
        self.code.get_opt(hash)
    }
}

impl<S: NodeStore> WorldStateWrite for CachedWorldState<S> {
    fn add_asset(&mut self, output_ref: TxOutputRef, output: AssetOutput) -> Result<()> {
        self.outputs.put(output_ref, TxOutput::Asset(output));
        Ok(())
    }

    fn remove_asset(&mut self, output_ref: TxOutputRef) -> Result<()> {
        self.outputs.get(output_ref)?;
        self.outputs.remove(output_ref);
        Ok(())
    }

    fn create_contract_unchecked(
        &mut self,
        code: Vec<u8>,
        fields: Vec<u8>,
        contract_id: ContractId,
        output_ref: TxOutputRef,
    ) -> Result<()> {
        let hash = code_hash(&code);
        let record = match self.code.get_opt(hash)? {
            Some(mut existing) => {
                existing.ref_count += 1;
                existing
            }
            None => CodeRecord::new(code),
        };
        if let Some(metrics) = crate::metrics::get() {
            metrics
                .code_ref_count
                .with_label_values(&[&format!("{:x}", hash)])
                .set(record.ref_count as i64);
        }
        self.code.put(hash, record);
        self.contracts.put(
            contract_id,
            ContractState {
                fields,
                output_ref,
                code_hash: hash,
            },
        );
        self.outputs
            .put(output_ref, TxOutput::Contract(crate::types::ContractOutput { contract_id }));
        tracing::debug!(?contract_id, "contract created");
        Ok(())
    }

    fn update_contract_fields(&mut self, id: ContractId, fields: Vec<u8>) -> Result<()> {
        let mut state = self.contracts.get(id)?;
        state.fields = fields;
        self.contracts.put(id, state);
        Ok(())
    }

    fn update_contract_output(
        &mut self,
        id: ContractId,
        output_ref: TxOutputRef,
        output: TxOutput,
    ) -> Result<()> {
        let mut state = self.contracts.get(id)?;
        state.output_ref = output_ref;
        self.contracts.put(id, state);
        self.outputs.put(output_ref, output);
        Ok(())
    }

    fn remove_contract(&mut self, id: ContractId) -> Result<()> {
        let state = self.contracts.get(id)?;
        self.contracts.remove(id);
        self.outputs.remove(state.output_ref);

        let mut record = self
            .code
            .get_opt(state.code_hash)?
            .ok_or_else(|| WorldStateError::invariant("code record missing for live contract"))?;
        if record.ref_count == 0 {
            return Err(WorldStateError::invariant("code ref count underflow on remove").into());
        }
        record.ref_count -= 1;
        if record.ref_count == 0 {
            self.code.remove(state.code_hash);
        } else {
            self.code.put(state.code_hash, record.clone());
        }
        if let Some(metrics) = crate::metrics::get() {
            metrics
                .code_ref_count
                .with_label_values(&[&format!("{:x}", state.code_hash)])
                .set(record.ref_count as i64);
        }
        tracing::debug!(?id, "contract removed");
        Ok(())
    }
}

/// A rollbackable speculative layer over a [`CachedWorldState`], one per transaction.
pub struct StagingWorldState<'a, S> {
    outputs: StagingSMT<'a, TxOutputRef, TxOutput, S>,
    contracts: StagingSMT<'a, ContractId, ContractState, S>,
    code: StagingSMT<'a, Hash, CodeRecord, S>,
}

impl<'a, S: NodeStore> StagingWorldState<'a, S> {
    pub fn new(cache: &'a mut CachedWorldState<S>) -> Self {
        Self {
            outputs: StagingSMT::new(&mut cache.outputs),
            contracts: StagingSMT::new(&mut cache.contracts),
            code: StagingSMT::new(&mut cache.code),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.outputs.commit()?;
        self.contracts.commit()?;
        self.code.commit()?;
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.outputs.rollback()?;
        self.contracts.rollback()?;
        self.code.rollback()?;
        Ok(())
    }
}

impl<'a, S: NodeStore> WorldStateRead for StagingWorldState<'a, S> {
    fn get_asset_opt(&self, output_ref: TxOutputRef) -> Result<Option<TxOutput>> {
        self.outputs.get_opt(output_ref)
    }

    fn get_contract_opt(&self, id: ContractId) -> Result<Option<ContractState>> {
        self.contracts.get_opt(id)
    }

    fn get_code_opt(&self, hash: Hash) -> Result<Option<CodeRecord>> {
        self.code.get_opt(hash)
    }
}

impl<'a, S: NodeStore> WorldStateWrite for StagingWorldState<'a, S> {
    fn add_asset(&mut self, output_ref: TxOutputRef, output: AssetOutput) -> Result<()> {
        self.outputs.put(output_ref, TxOutput::Asset(output))
    }

    fn remove_asset(&mut self, output_ref: TxOutputRef) -> Result<()> {
        self.outputs.get(output_ref)?;
        self.outputs.remove(output_ref)
    }

    fn create_contract_unchecked(
        &mut self,
        code: Vec<u8>,
        fields: Vec<u8>,
        contract_id: ContractId,
        output_ref: TxOutputRef,
    ) -> Result<()> {
        let hash = code_hash(&code);
        let record = match self.code.get_opt(hash)? {
            Some(mut existing) => {
                existing.ref_count += 1;
                existing
            }
            None => CodeRecord::new(code),
        };
        self.code.put(hash, record)?;
        self.contracts.put(
            contract_id,
            ContractState {
                fields,
                output_ref,
                code_hash: hash,
            },
        )?;
        self.outputs
            .put(output_ref, TxOutput::Contract(crate::types::ContractOutput { contract_id }))
    }

    fn update_contract_fields(&mut self, id: ContractId, fields: Vec<u8>) -> Result<()> {
        let mut state = self.contracts.get(id)?;
        state.fields = fields;
        self.contracts.put(id, state)
    }

    fn update_contract_output(
        &mut self,
        id: ContractId,
        output_ref: TxOutputRef,
        output: TxOutput,
    ) -> Result<()> {
        let mut state = self.contracts.get(id)?;
        state.output_ref = output_ref;
        self.contracts.put(id, state)?;
        self.outputs.put(output_ref, output)
    }

    fn remove_contract(&mut self, id: ContractId) -> Result<()> {
        let state = self.contracts.get(id)?;
        self.contracts.remove(id)?;
        self.outputs.remove(state.output_ref)?;

        let mut record = self
            .code
            .get_opt(state.code_hash)?
            .ok_or_else(|| WorldStateError::invariant("code record missing for live contract"))?;
        if record.ref_count == 0 {
            return Err(WorldStateError::invariant("code ref count underflow on remove").into());
        }
        record.ref_count -= 1;
        if record.ref_count == 0 {
            self.code.remove(state.code_hash)?;
        } else {
            self.code.put(state.code_hash, record)?;
        }
        Ok(())
    }
}
