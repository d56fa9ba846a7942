//! Call request arguments shared by every subcommand.

use std::{path::PathBuf, str::FromStr};

use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::{Address, Bytes, B256, U256};
use clap::Parser;
use mega_sim::{CallArgs, CallFees, CallInput, SimError};
use tracing::{debug, trace};

use super::{CliError, Result};

/// Call request arguments
#[derive(Parser, Debug, Clone)]
#[command(next_help_heading = "Request Options")]
pub struct RequestArgs {
    /// Call arguments as JSON (`eth_call` request object)
    #[arg(long = "args", conflicts_with = "args_file")]
    pub args: Option<String>,

    /// File containing the call arguments as JSON
    #[arg(long = "args-file")]
    pub args_file: Option<PathBuf>,

    /// The transaction origin
    #[arg(long = "from", visible_aliases = ["sender"])]
    pub from: Option<Address>,

    /// The transaction receiver. Omit to create a contract.
    #[arg(long = "to", visible_aliases = ["receiver"])]
    pub to: Option<Address>,

    /// Call data (hex string)
    #[arg(long = "input", visible_aliases = ["data"])]
    pub input: Option<Bytes>,

    /// Value to transfer (wei)
    #[arg(long = "value")]
    pub value: Option<U256>,

    /// Gas limit
    #[arg(long = "gas")]
    pub gas: Option<u64>,

    /// Legacy gas price
    #[arg(long = "price")]
    pub price: Option<U256>,

    /// Max fee per gas (EIP-1559)
    #[arg(long = "max-fee")]
    pub max_fee: Option<U256>,

    /// Max priority fee per gas (EIP-1559)
    #[arg(long = "priority-fee", visible_aliases = ["priorityfee"])]
    pub priority_fee: Option<U256>,
}

impl RequestArgs {
    /// Builds the call arguments: the JSON request, if any, with the individual flags on top.
    pub fn call_args(&self) -> Result<CallArgs> {
        let mut args = match (&self.args, &self.args_file) {
            (Some(json), _) => parse_json::<CallArgs>(json, "call arguments")?,
            (None, Some(path)) => {
                debug!(args_file = ?path, "Loading call arguments from file");
                parse_json::<CallArgs>(&std::fs::read_to_string(path)?, "call arguments")?
            }
            (None, None) => CallArgs::default(),
        };

        if self.from.is_some() {
            args.from = self.from;
        }
        if self.to.is_some() {
            args.to = self.to;
        }
        if let Some(input) = &self.input {
            args.input = CallInput::new(input.clone());
        }
        if self.value.is_some() {
            args.value = self.value;
        }
        if self.gas.is_some() {
            args.gas = self.gas;
        }
        if self.price.is_some() || self.max_fee.is_some() || self.priority_fee.is_some() {
            args.fees = CallFees::from_parts(self.price, self.max_fee, self.priority_fee)
                .map_err(SimError::from)?;
        }
        trace!(?args, "Call arguments");
        Ok(args)
    }
}

/// Parses `json` as `T`, naming `what` in the error.
pub fn parse_json<T: serde::de::DeserializeOwned>(json: &str, what: &'static str) -> Result<T> {
    serde_json::from_str(json).map_err(|source| CliError::Json { what, source })
}

/// Parses a block reference: a tag (`latest`, `pending`, ...), a decimal or `0x` number, or a
/// block hash.
pub fn parse_block_id(s: &str) -> std::result::Result<BlockId, String> {
    let s = s.trim();
    let tag = match s {
        "latest" => Some(BlockNumberOrTag::Latest),
        "pending" => Some(BlockNumberOrTag::Pending),
        "earliest" => Some(BlockNumberOrTag::Earliest),
        "safe" => Some(BlockNumberOrTag::Safe),
        "finalized" => Some(BlockNumberOrTag::Finalized),
        _ => None,
    };
    if let Some(tag) = tag {
        return Ok(BlockId::Number(tag));
    }
    if let Some(hex) = s.strip_prefix("0x") {
        if hex.len() == 64 {
            return B256::from_str(s).map(BlockId::hash).map_err(|e| e.to_string());
        }
        return u64::from_str_radix(hex, 16).map(BlockId::number).map_err(|e| e.to_string());
    }
    s.parse::<u64>().map(BlockId::number).map_err(|e| format!("invalid block '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256};
    use mega_sim::ArgsError;
    use rstest::rstest;

    use super::*;

    #[derive(Parser, Debug)]
    struct Wrapper {
        #[command(flatten)]
        request: RequestArgs,
    }

    fn request(args: &[&str]) -> RequestArgs {
        Wrapper::parse_from(std::iter::once("mega-sim").chain(args.iter().copied())).request
    }

    #[rstest]
    #[case("latest", BlockId::latest())]
    #[case("pending", BlockId::pending())]
    #[case("12", BlockId::number(12))]
    #[case("0x10", BlockId::number(16))]
    #[case(
        "0x0101010101010101010101010101010101010101010101010101010101010101",
        BlockId::hash(b256!("0101010101010101010101010101010101010101010101010101010101010101"))
    )]
    fn test_parse_block_id(#[case] input: &str, #[case] expected: BlockId) {
        assert_eq!(parse_block_id(input).unwrap(), expected);
    }

    #[test]
    fn test_flags_override_json() {
        let args = request(&[
            "--args",
            r#"{"from":"0x0000000000000000000000000000000000000001","gas":"0x5208","value":"0x1"}"#,
            "--value",
            "7",
            "--to",
            "0x0000000000000000000000000000000000000002",
        ])
        .call_args()
        .unwrap();

        assert_eq!(args.from, Some(address!("0000000000000000000000000000000000000001")));
        assert_eq!(args.to, Some(address!("0000000000000000000000000000000000000002")));
        assert_eq!(args.gas, Some(21_000));
        assert_eq!(args.value, Some(U256::from(7)));
    }

    #[test]
    fn test_conflicting_fee_flags() {
        let err = request(&["--price", "1", "--max-fee", "2"]).call_args().unwrap_err();
        assert!(matches!(
            err,
            CliError::Sim(SimError::InvalidArgs(ArgsError::ConflictingFeeFields))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let err = request(&["--args", "{"]).call_args().unwrap_err();
        assert!(matches!(err, CliError::Json { what: "call arguments", .. }));
    }
}
