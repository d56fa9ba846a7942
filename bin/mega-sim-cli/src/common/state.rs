//! Prestate loading for the in-memory chain.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_primitives::{utils::parse_units, Address, Bytes, U256};
use clap::Parser;
use mega_sim::{InMemoryBackend, MemoryDatabase};
use tracing::{debug, info, trace};

use super::{ChainArgs, CliError, Result};

/// Pre-execution state configuration arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "State Options")]
pub struct PreStateArgs {
    /// JSON file with the genesis state: a map from address to `balance`, `nonce`, `code` and
    /// `storage`
    #[arg(long = "prestate", visible_aliases = ["pre-state"])]
    pub prestate: Option<PathBuf>,

    /// JSON file with the state of the `pending` block. Defaults to the genesis state.
    #[arg(long = "pending-state")]
    pub pending_state: Option<PathBuf>,

    /// Override balance for specified addresses. Each entry format: `ADDRESS=VALUE`
    /// VALUE can be: plain number (wei), or number with suffix (ether, gwei, wei).
    /// Examples: `--balance 0x1234=100ether`
    #[arg(long = "balance")]
    pub balance: Vec<String>,
}

/// Parse ether value string into wei (U256).
/// Supports: plain number (wei), or number with suffix (ether, gwei, wei, etc).
fn parse_ether_value(s: &str) -> Result<U256> {
    let s = s.trim();
    let split_pos = s.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(s.len());
    let (num_str, unit) = s.split_at(split_pos);
    let unit = if unit.is_empty() { "wei" } else { unit };

    let parsed = parse_units(num_str, unit)
        .map_err(|e| CliError::InvalidInput(format!("Invalid ether value '{s}': {e}")))?;
    Ok(parsed.into())
}

impl PreStateArgs {
    /// Parse balance override entries from CLI arguments.
    pub fn parse_balance(&self) -> Result<Vec<(Address, U256)>> {
        let mut entries = Vec::new();
        for entry in &self.balance {
            let (addr_str, value_str) = entry.split_once('=').ok_or_else(|| {
                CliError::InvalidInput(format!(
                    "Invalid balance entry '{entry}': expected format 'ADDRESS=VALUE'"
                ))
            })?;
            let address = Address::from_str(addr_str.trim()).map_err(|e| {
                CliError::InvalidInput(format!(
                    "Invalid address '{addr_str}' in balance entry '{entry}': {e}"
                ))
            })?;
            entries.push((address, parse_ether_value(value_str)?));
        }
        Ok(entries)
    }

    /// Loads the genesis state, with balance overrides applied.
    pub fn load_prestate(&self) -> Result<MemoryDatabase> {
        let mut db = match &self.prestate {
            Some(path) => {
                info!(prestate_path = ?path, "Loading prestate from file");
                load_state_file(path)?
            }
            None => {
                debug!("No prestate file provided");
                MemoryDatabase::default()
            }
        };
        for (address, balance) in self.parse_balance()? {
            info!(%address, %balance, "Overriding balance");
            db.set_account_balance(address, balance);
        }
        Ok(db)
    }

    /// Builds the in-memory chain: genesis as `latest`, plus the optional pending state.
    pub fn create_backend(&self, chain: &ChainArgs) -> Result<InMemoryBackend> {
        let genesis = self.load_prestate()?;
        let backend = InMemoryBackend::new(chain.chain_config(), genesis)
            .with_gas_price(chain.gas_price)
            .with_gas_cap(chain.gas_cap);
        match &self.pending_state {
            Some(path) => {
                info!(pending_state_path = ?path, "Loading pending state from file");
                Ok(backend.with_pending(load_state_file(path)?))
            }
            None => Ok(backend),
        }
    }
}

fn load_state_file(path: &Path) -> Result<MemoryDatabase> {
    let content = std::fs::read_to_string(path)?;
    parse_state(&content)
}

/// Parses a JSON state dump into a [`MemoryDatabase`].
pub fn parse_state(json: &str) -> Result<MemoryDatabase> {
    let accounts: HashMap<Address, AccountState> =
        serde_json::from_str(json).map_err(|source| CliError::Json { what: "prestate", source })?;
    trace!(accounts = accounts.len(), "Prestate parsed");

    let mut db = MemoryDatabase::default();
    for (address, account) in accounts {
        account.write_into(address, &mut db);
    }
    Ok(db)
}

/// Account state information
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    /// Account balance
    pub balance: Option<U256>,
    /// Account nonce
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub nonce: Option<u64>,
    /// Account code (hex string with 0x prefix)
    pub code: Option<Bytes>,
    /// Storage slots (quantity format for keys and values)
    pub storage: Option<HashMap<U256, U256>>,
}

impl AccountState {
    fn write_into(self, address: Address, db: &mut MemoryDatabase) {
        if let Some(balance) = self.balance {
            db.set_account_balance(address, balance);
        }
        if let Some(nonce) = self.nonce {
            db.set_account_nonce(address, nonce);
        }
        if let Some(code) = self.code.filter(|code| !code.is_empty()) {
            db.set_account_code(address, code);
        }
        for (slot, value) in self.storage.unwrap_or_default() {
            db.set_account_storage(address, slot, value);
        }
    }
}
