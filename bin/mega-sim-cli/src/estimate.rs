use alloy_eips::BlockId;
use clap::Parser;
use mega_sim::EthSimApi;
use tracing::info;

use crate::common::{parse_block_id, ChainArgs, LogArgs, PreStateArgs, RequestArgs, Result};

/// Estimate the smallest gas limit for which a call succeeds
#[derive(Parser, Debug)]
pub struct Cmd {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Block whose state bounds the search by the sender's funds (default: latest)
    #[arg(long = "block", value_parser = parse_block_id)]
    pub block: Option<BlockId>,

    #[command(flatten)]
    pub chain: ChainArgs,

    #[command(flatten)]
    pub prestate: PreStateArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Cmd {
    /// Execute the command
    pub fn run(&self) -> Result<()> {
        self.log.init()?;

        let backend = self.prestate.create_backend(&self.chain)?;
        let api = EthSimApi::with_config(backend, self.chain.sim_config());
        let args = self.request.call_args()?;

        let gas = api.estimate_gas(&args, self.block)?;
        info!(gas, "Gas estimated");
        println!("{gas}");
        Ok(())
    }
}
