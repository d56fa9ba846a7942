//! In-memory chain backend holding copy-on-write state snapshots per block.

use core::convert::Infallible;
use std::{collections::HashMap, sync::Arc};

use alloy_consensus::Header;
use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::{Address, Bytes, B256, U256};
use delegate::delegate;
use revm::{
    database::{AccountState, CacheDB, DbAccount, EmptyDB},
    primitives::{StorageKey, StorageValue},
    state::{AccountInfo, Bytecode},
    DatabaseRef,
};

use crate::{
    BackendError, CancelToken, CanonicalMessage, ChainConfig, RevmEngine, SimBackend, WorkingState,
};

/// Block gas limit of headers produced by [`InMemoryBackend`].
const BLOCK_GAS_LIMIT: u64 = 30_000_000;

/// A cheaply cloneable state snapshot. Clones share storage until one of them is written to.
#[derive(Debug, Default, Clone, derive_more::Deref)]
pub struct MemoryDatabase {
    #[deref]
    db: Arc<CacheDB<EmptyDB>>,
}

impl MemoryDatabase {
    /// Creates a snapshot from a `CacheDB`.
    pub fn from_cache_db(db: CacheDB<EmptyDB>) -> Self {
        Self { db: Arc::new(db) }
    }

    fn db_mut(&mut self) -> &mut CacheDB<EmptyDB> {
        Arc::make_mut(&mut self.db)
    }

    fn account_mut(&mut self, address: Address) -> &mut DbAccount {
        let account = self.db_mut().load_account(address).unwrap_or_else(|never| match never {});
        account.account_state = AccountState::None;
        account
    }

    /// Sets the code for an account.
    pub fn set_account_code(&mut self, address: Address, code: Bytes) {
        let bytecode = Bytecode::new_legacy(code);
        let account = self.account_mut(address);
        account.info.code_hash = bytecode.hash_slow();
        account.info.code = Some(bytecode);
    }

    /// Sets the code for an account.
    pub fn account_code(mut self, address: Address, code: Bytes) -> Self {
        self.set_account_code(address, code);
        self
    }

    /// Sets the balance for an account.
    pub fn set_account_balance(&mut self, address: Address, balance: U256) {
        self.account_mut(address).info.balance = balance;
    }

    /// Sets the balance for an account.
    pub fn account_balance(mut self, address: Address, balance: U256) -> Self {
        self.set_account_balance(address, balance);
        self
    }

    /// Sets the nonce for an account.
    pub fn set_account_nonce(&mut self, address: Address, nonce: u64) {
        self.account_mut(address).info.nonce = nonce;
    }

    /// Sets the nonce for an account.
    pub fn account_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.set_account_nonce(address, nonce);
        self
    }

    /// Sets a storage slot of an account.
    pub fn set_account_storage(&mut self, address: Address, slot: StorageKey, value: StorageValue) {
        self.account_mut(address).storage.insert(slot, value);
    }

    /// Sets a storage slot of an account.
    pub fn account_storage(
        mut self,
        address: Address,
        slot: StorageKey,
        value: StorageValue,
    ) -> Self {
        self.set_account_storage(address, slot, value);
        self
    }

    /// Sets the hash served by `BLOCKHASH` for `number`.
    pub fn set_block_hash(&mut self, number: u64, hash: B256) {
        self.db_mut().cache.block_hashes.insert(U256::from(number), hash);
    }
}

impl DatabaseRef for MemoryDatabase {
    type Error = Infallible;

    delegate! {
        to self.db {
            fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error>;
            fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error>;
            fn storage_ref(
                &self,
                address: Address,
                index: StorageKey,
            ) -> Result<StorageValue, Self::Error>;
            fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error>;
        }
    }
}

/// A [`SimBackend`] over a list of in-memory blocks.
///
/// Block `n` is the `n`-th pushed snapshot; the last one is `latest`. `pending` is a separate
/// snapshot on top of `latest` when set, otherwise `latest` itself.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    chain: ChainConfig,
    blocks: Vec<(Header, MemoryDatabase)>,
    pending: Option<MemoryDatabase>,
    pool_nonces: HashMap<Address, u64>,
    gas_price: U256,
    gas_cap: Option<u64>,
}

impl InMemoryBackend {
    /// Creates a backend whose genesis state is `genesis`.
    pub fn new(chain: ChainConfig, genesis: MemoryDatabase) -> Self {
        let mut backend = Self {
            chain,
            blocks: Vec::new(),
            pending: None,
            pool_nonces: HashMap::new(),
            gas_price: U256::ZERO,
            gas_cap: None,
        };
        backend.push_block(genesis);
        backend
    }

    /// Appends a block with the given post-state and makes it `latest`. Returns its number.
    pub fn push_block(&mut self, state: MemoryDatabase) -> u64 {
        let number = self.blocks.len() as u64;
        let parent_hash =
            self.blocks.last().map(|(header, _)| header.hash_slow()).unwrap_or_default();
        let header = Header {
            parent_hash,
            number,
            timestamp: number * 12,
            gas_limit: BLOCK_GAS_LIMIT,
            base_fee_per_gas: self.chain.is_london(number).then_some(self.chain.base_fee),
            ..Default::default()
        };
        self.blocks.push((header, state));
        number
    }

    /// Sets the `pending` state.
    pub fn with_pending(mut self, state: MemoryDatabase) -> Self {
        self.pending = Some(state);
        self
    }

    /// Sets the price returned by the fee suggestion oracle.
    pub fn with_gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = gas_price;
        self
    }

    /// Sets the global gas cap.
    pub fn with_gas_cap(mut self, gas_cap: u64) -> Self {
        self.gas_cap = (gas_cap != 0).then_some(gas_cap);
        self
    }

    /// Sets the pool nonce of `address`.
    pub fn with_pool_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.pool_nonces.insert(address, nonce);
        self
    }

    fn latest(&self) -> Option<&(Header, MemoryDatabase)> {
        self.blocks.last()
    }

    fn resolve(&self, at: BlockId) -> Option<(MemoryDatabase, Header)> {
        let (header, state) = match at {
            BlockId::Hash(hash) => {
                self.blocks.iter().find(|(header, _)| header.hash_slow() == hash.block_hash)?
            }
            BlockId::Number(BlockNumberOrTag::Number(number)) => {
                self.blocks.get(usize::try_from(number).ok()?)?
            }
            BlockId::Number(BlockNumberOrTag::Earliest) => self.blocks.first()?,
            BlockId::Number(BlockNumberOrTag::Pending) => {
                let (header, latest) = self.latest()?;
                let state = self.pending.as_ref().unwrap_or(latest);
                return Some((state.clone(), header.clone()));
            }
            BlockId::Number(
                BlockNumberOrTag::Latest | BlockNumberOrTag::Safe | BlockNumberOrTag::Finalized,
            ) => self.latest()?,
        };
        Some((state.clone(), header.clone()))
    }
}

impl SimBackend for InMemoryBackend {
    type State = MemoryDatabase;
    type Engine = RevmEngine<WorkingState<MemoryDatabase>>;

    fn state_and_header(&self, at: BlockId) -> Result<(Self::State, Header), BackendError> {
        self.resolve(at).ok_or(BackendError::HeaderNotFound(at))
    }

    fn new_engine(
        &self,
        message: &CanonicalMessage,
        state: WorkingState<Self::State>,
        header: &Header,
        cancel: CancelToken,
    ) -> Result<Self::Engine, BackendError> {
        Ok(RevmEngine::new(message, state, header, &self.chain, cancel)?)
    }

    fn suggest_price(&self) -> Result<U256, BackendError> {
        Ok(self.gas_price)
    }

    fn pool_nonce(&self, address: Address) -> Result<u64, BackendError> {
        if let Some(nonce) = self.pool_nonces.get(&address) {
            return Ok(*nonce);
        }
        let (state, _) = self.state_and_header(BlockId::pending())?;
        let info = state.basic_ref(address).unwrap_or_else(|never| match never {});
        Ok(info.map(|info| info.nonce).unwrap_or_default())
    }

    fn chain_config(&self) -> &ChainConfig {
        &self.chain
    }

    fn rpc_gas_cap(&self) -> Option<u64> {
        self.gas_cap
    }

    fn current_header(&self) -> Header {
        self.latest().map(|(header, _)| header.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    const ALICE: Address = address!("0000000000000000000000000000000000a11ce0");

    #[test]
    fn test_snapshots_are_copy_on_write() {
        let genesis = MemoryDatabase::default().account_balance(ALICE, U256::from(1));
        let mut next = genesis.clone();
        next.set_account_balance(ALICE, U256::from(2));

        assert_eq!(genesis.basic_ref(ALICE).unwrap().unwrap().balance, U256::from(1));
        assert_eq!(next.basic_ref(ALICE).unwrap().unwrap().balance, U256::from(2));
    }

    #[test]
    fn test_block_resolution() {
        let genesis = MemoryDatabase::default().account_nonce(ALICE, 1);
        let mut backend = InMemoryBackend::new(ChainConfig::default(), genesis.clone());
        backend.push_block(genesis.clone().account_nonce(ALICE, 2));
        let backend = backend.with_pending(genesis.account_nonce(ALICE, 3));

        let nonce_at = |at: BlockId| {
            let (state, _) = backend.state_and_header(at).unwrap();
            state.basic_ref(ALICE).unwrap().unwrap().nonce
        };
        assert_eq!(nonce_at(BlockId::number(0)), 1);
        assert_eq!(nonce_at(BlockId::latest()), 2);
        assert_eq!(nonce_at(BlockId::pending()), 3);
        assert_eq!(nonce_at(BlockId::earliest()), 1);

        let latest = backend.current_header();
        assert_eq!(latest.number, 1);
        assert_eq!(nonce_at(BlockId::hash(latest.hash_slow())), 2);

        assert_eq!(
            backend.state_and_header(BlockId::number(7)).unwrap_err(),
            BackendError::HeaderNotFound(BlockId::number(7))
        );
    }

    #[test]
    fn test_pool_nonce_falls_back_to_pending_state() {
        let genesis = MemoryDatabase::default().account_nonce(ALICE, 4);
        let backend = InMemoryBackend::new(ChainConfig::default(), genesis);
        assert_eq!(backend.pool_nonce(ALICE).unwrap(), 4);

        let backend = backend.with_pool_nonce(ALICE, 9);
        assert_eq!(backend.pool_nonce(ALICE).unwrap(), 9);
    }
}
