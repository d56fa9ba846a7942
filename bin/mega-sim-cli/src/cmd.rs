use clap::Parser;

use crate::common::CliError;

/// Main command enumeration for the mega-sim CLI tool
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version)]
pub enum MainCmd {
    /// Execute a call without committing it and print its return data
    Call(crate::call::Cmd),
    /// Estimate the gas a call needs to succeed
    Estimate(crate::estimate::Cmd),
    /// Fill in every missing field of a call
    Fill(crate::fill::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command failed
    #[error("{0}")]
    Cli(#[from] CliError),
}

impl MainCmd {
    /// Execute the main command
    pub fn run(&self) -> Result<(), Error> {
        match self {
            Self::Call(cmd) => cmd.run()?,
            Self::Estimate(cmd) => cmd.run()?,
            Self::Fill(cmd) => cmd.run()?,
        }
        Ok(())
    }
}
