use std::time::Duration;

use alloy_primitives::U256;
use clap::Parser;
use mega_sim::{ChainConfig, SimConfig};

/// Chain and node configuration arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Chain Options")]
pub struct ChainArgs {
    /// Chain id
    #[arg(long = "chain-id", default_value = "1")]
    pub chain_id: u64,

    /// Fixed base fee per gas of every block
    #[arg(long = "base-fee", default_value = "0")]
    pub base_fee: u64,

    /// Activation height of dynamic fees
    #[arg(long = "london-block", default_value = "0", conflicts_with = "legacy")]
    pub london_block: u64,

    /// Keep the chain in legacy-fee mode (no London, Shanghai or Cancun)
    #[arg(long = "legacy")]
    pub legacy: bool,

    /// Price returned by the fee suggestion oracle
    #[arg(long = "gas-price", visible_aliases = ["suggested-price"], default_value = "0")]
    pub gas_price: U256,

    /// Global gas cap for simulated calls (0 = uncapped)
    #[arg(long = "gas-cap", default_value = "0")]
    pub gas_cap: u64,

    /// Wall-clock budget of a call, e.g. `5s` or `250ms` (0s = no timeout)
    #[arg(long = "timeout", default_value = "5s")]
    pub timeout: humantime::Duration,
}

impl ChainArgs {
    /// Builds the chain configuration.
    pub fn chain_config(&self) -> ChainConfig {
        let chain =
            ChainConfig::default().with_chain_id(self.chain_id).with_base_fee(self.base_fee);
        if self.legacy {
            ChainConfig { london_block: None, shanghai_block: None, cancun_block: None, ..chain }
        } else {
            chain.with_london_block(Some(self.london_block))
        }
    }

    /// Builds the simulation configuration.
    pub fn sim_config(&self) -> SimConfig {
        SimConfig { call_timeout: Duration::from(self.timeout) }
    }
}
