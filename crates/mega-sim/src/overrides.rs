//! Request-scoped state overrides applied to a private working copy of a state snapshot.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, B256, U256};
use revm::{database::CacheDB, state::Bytecode, DatabaseRef};
use serde::{Deserialize, Serialize};

use crate::ArgsError;

/// A private, discardable view over a shared state snapshot. Writes land in the cache layer and
/// never reach the snapshot.
pub type WorkingState<S> = CacheDB<S>;

/// How an override replaces an account's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOverride {
    /// Replace the whole storage; slots not listed read as zero.
    Replace(BTreeMap<B256, B256>),
    /// Patch the listed slots, keeping every other slot.
    Diff(BTreeMap<B256, B256>),
}

/// Temporary modification of a single account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountOverride {
    /// Replacement nonce.
    pub nonce: Option<u64>,
    /// Replacement code.
    pub code: Option<Bytes>,
    /// Replacement balance.
    pub balance: Option<U256>,
    /// Storage replacement or patch.
    pub storage: Option<StorageOverride>,
}

impl AccountOverride {
    /// Overrides the nonce.
    pub const fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Overrides the code.
    pub fn with_code(mut self, code: impl Into<Bytes>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Overrides the balance.
    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = Some(balance);
        self
    }

    /// Replaces the whole storage with `slots`.
    pub fn with_state(mut self, slots: BTreeMap<B256, B256>) -> Self {
        self.storage = Some(StorageOverride::Replace(slots));
        self
    }

    /// Patches the storage with `slots`.
    pub fn with_state_diff(mut self, slots: BTreeMap<B256, B256>) -> Self {
        self.storage = Some(StorageOverride::Diff(slots));
        self
    }

    /// Applies the override in the order nonce, code, balance, storage.
    fn apply<S: DatabaseRef>(
        &self,
        address: Address,
        state: &mut WorkingState<S>,
    ) -> Result<(), S::Error> {
        let mut info = state.basic_ref(address)?.unwrap_or_default();
        if let Some(nonce) = self.nonce {
            info.nonce = nonce;
        }
        if let Some(code) = &self.code {
            let bytecode = Bytecode::new_legacy(code.clone());
            info.code_hash = bytecode.hash_slow();
            info.code = Some(bytecode);
        }
        if let Some(balance) = self.balance {
            info.balance = balance;
        }
        state.insert_account_info(address, info);

        match &self.storage {
            Some(StorageOverride::Replace(slots)) => state.replace_account_storage(
                address,
                slots.iter().map(|(slot, value)| (slot_key(slot), slot_key(value))).collect(),
            )?,
            Some(StorageOverride::Diff(slots)) => {
                for (slot, value) in slots {
                    state.insert_account_storage(address, slot_key(slot), slot_key(value))?;
                }
            }
            None => {}
        }
        Ok(())
    }
}

fn slot_key(word: &B256) -> U256 {
    U256::from_be_bytes(word.0)
}

/// Per-account overrides of a single request, keyed by address.
///
/// Deserialization rejects an account carrying both `state` and `stateDiff`, so a constructed set
/// is always applicable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Address, AccountOverrideRepr>",
    into = "BTreeMap<Address, AccountOverrideRepr>"
)]
pub struct StateOverride {
    accounts: BTreeMap<Address, AccountOverride>,
}

impl StateOverride {
    /// Creates an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the override of `address`.
    pub fn with_account(mut self, address: Address, account: AccountOverride) -> Self {
        self.accounts.insert(address, account);
        self
    }

    /// Returns the override of `address`.
    pub fn get(&self, address: &Address) -> Option<&AccountOverride> {
        self.accounts.get(address)
    }

    /// Returns `true` if no account is overridden.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Applies every account override to `state`, stopping at the first error.
    pub fn apply<S: DatabaseRef>(&self, state: &mut WorkingState<S>) -> Result<(), S::Error> {
        for (address, account) in &self.accounts {
            tracing::trace!(%address, ?account, "Applying state override");
            account.apply(*address, state)?;
        }
        Ok(())
    }
}

/// Wire shape of an [`AccountOverride`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountOverrideRepr {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    balance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<BTreeMap<B256, B256>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state_diff: Option<BTreeMap<B256, B256>>,
}

impl TryFrom<BTreeMap<Address, AccountOverrideRepr>> for StateOverride {
    type Error = ArgsError;

    fn try_from(repr: BTreeMap<Address, AccountOverrideRepr>) -> Result<Self, Self::Error> {
        let accounts = repr
            .into_iter()
            .map(|(address, account)| {
                let storage = match (account.state, account.state_diff) {
                    (Some(_), Some(_)) => {
                        return Err(ArgsError::ConflictingStorageOverride(address))
                    }
                    (Some(slots), None) => Some(StorageOverride::Replace(slots)),
                    (None, Some(slots)) => Some(StorageOverride::Diff(slots)),
                    (None, None) => None,
                };
                let account = AccountOverride {
                    nonce: account.nonce,
                    code: account.code,
                    balance: account.balance,
                    storage,
                };
                Ok((address, account))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { accounts })
    }
}

impl From<StateOverride> for BTreeMap<Address, AccountOverrideRepr> {
    fn from(overrides: StateOverride) -> Self {
        overrides
            .accounts
            .into_iter()
            .map(|(address, account)| {
                let (state, state_diff) = match account.storage {
                    Some(StorageOverride::Replace(slots)) => (Some(slots), None),
                    Some(StorageOverride::Diff(slots)) => (None, Some(slots)),
                    None => (None, None),
                };
                let repr = AccountOverrideRepr {
                    nonce: account.nonce,
                    code: account.code,
                    balance: account.balance,
                    state,
                    state_diff,
                };
                (address, repr)
            })
            .collect()
    }
}
