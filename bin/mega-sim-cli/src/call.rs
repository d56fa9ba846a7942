use std::{path::PathBuf, time::Instant};

use alloy_eips::BlockId;
use clap::Parser;
use mega_sim::{EthSimApi, StateOverride};
use tracing::{debug, info};

use crate::common::{
    parse_block_id, parse_json, ChainArgs, LogArgs, PreStateArgs, RequestArgs, Result,
};

/// Execute a call on a private copy of the state and print its return data
#[derive(Parser, Debug)]
pub struct Cmd {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Block to execute on: a tag, a number or a block hash
    #[arg(long = "block", default_value = "latest", value_parser = parse_block_id)]
    pub block: BlockId,

    /// JSON file with per-account state overrides
    #[arg(long = "overrides")]
    pub overrides: Option<PathBuf>,

    #[command(flatten)]
    pub chain: ChainArgs,

    #[command(flatten)]
    pub prestate: PreStateArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

impl Cmd {
    /// Loads the state overrides, if a file was given.
    fn state_override(&self) -> Result<Option<StateOverride>> {
        let Some(path) = &self.overrides else {
            return Ok(None);
        };
        debug!(overrides = ?path, "Loading state overrides from file");
        let overrides = parse_json(&std::fs::read_to_string(path)?, "state overrides")?;
        Ok(Some(overrides))
    }

    /// Execute the command
    pub fn run(&self) -> Result<()> {
        self.log.init()?;

        let backend = self.prestate.create_backend(&self.chain)?;
        let api = EthSimApi::with_config(backend, self.chain.sim_config());
        let args = self.request.call_args()?;
        let overrides = self.state_override()?;

        let start = Instant::now();
        let result = api.call(&args, self.block, overrides.as_ref());
        info!(elapsed = ?start.elapsed(), ok = result.is_ok(), "Call finished");

        match result {
            Ok(output) => {
                println!("{output}");
                Ok(())
            }
            Err(err) => {
                if let Some(data) = err.revert_data() {
                    println!("{data}");
                }
                Err(err.into())
            }
        }
    }
}
