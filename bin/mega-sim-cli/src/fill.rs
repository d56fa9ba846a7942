use clap::Parser;
use mega_sim::EthSimApi;

use crate::common::{ChainArgs, CliError, LogArgs, PreStateArgs, RequestArgs, Result};

/// Fill in fees, value, nonce, gas and chain id of a call and print it as JSON
#[derive(Parser, Debug)]
pub struct Cmd {
    #[command(flatten)]
    pub request: RequestArgs,

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
        let api = EthSimApi::new(backend);
        let filled = api.fill_transaction(&self.request.call_args()?)?;

        let json = serde_json::to_string_pretty(&filled)
            .map_err(|source| CliError::Json { what: "filled call arguments", source })?;
        println!("{json}");
        Ok(())
    }
}
