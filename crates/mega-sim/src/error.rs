//! Error types of the simulation core.

use core::{error::Error, fmt, time::Duration};
use std::sync::Arc;

use alloy_eips::BlockId;
use alloy_primitives::{Address, Bytes, U256};

/// Result type of simulation and estimation requests.
pub type SimResult<T> = Result<T, SimError>;

/// Contradictory or malformed request arguments. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgsError {
    /// A legacy gas price was supplied together with a dynamic-fee field.
    #[error("both gasPrice and (maxFeePerGas or maxPriorityFeePerGas) specified")]
    ConflictingFeeFields,
    /// The max fee per gas is below the max priority fee per gas.
    #[error("maxFeePerGas ({max_fee_per_gas}) < maxPriorityFeePerGas ({max_priority_fee_per_gas})")]
    TipAboveFeeCap {
        /// The max fee per gas.
        max_fee_per_gas: U256,
        /// The max priority fee per gas.
        max_priority_fee_per_gas: U256,
    },
    /// Dynamic-fee fields were supplied before the dynamic-fee fork.
    #[error("maxFeePerGas or maxPriorityFeePerGas specified but london is not active yet")]
    DynamicFeeBeforeLondon,
    /// `data` and `input` are both set with different bytes.
    #[error(
        r#"both "data" and "input" are set and not equal. Please use "input" to pass transaction call data"#
    )]
    InputMismatch,
    /// No recipient and no payload.
    #[error("contract creation without any data provided")]
    EmptyCreation,
    /// An account override carries both `state` and `stateDiff`.
    #[error("account {0} has both 'state' and 'stateDiff'")]
    ConflictingStorageOverride(Address),
}

/// Failures of the chain backend. Surfaced verbatim and fatal to the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The block reference did not resolve to a known header.
    #[error("header not found for block {0}")]
    HeaderNotFound(BlockId),
    /// Reading from the state failed.
    #[error("state access failed: {0}")]
    State(#[source] StateError),
    /// The fee suggestion oracle failed.
    #[error("fee oracle failed: {0}")]
    FeeOracle(String),
    /// The execution engine could not be built.
    #[error("execution engine setup failed: {0}")]
    Engine(#[from] EngineError),
}

/// A failed state read, carrying the error reported by the state implementation as is.
///
/// Display and source chain are those of the wrapped error.
#[derive(Debug, Clone)]
pub struct StateError(Arc<dyn Error + Send + Sync + 'static>);

impl StateError {
    /// Wraps the error returned by a state read.
    pub fn new<E: Error + Send + Sync + 'static>(err: E) -> Self {
        Self(Arc::new(err))
    }

    /// The wrapped error.
    pub fn get_ref(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.0
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for StateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl PartialEq for StateError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.to_string() == other.0.to_string()
    }
}

impl Eq for StateError {}

/// Errors reported by an execution engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The message was rejected before execution, e.g. the sender cannot pay for gas.
    #[error("{0}")]
    InvalidTransaction(String),
    /// The engine failed for reasons unrelated to the message.
    #[error("{0}")]
    Fatal(String),
}

/// Errors returned by the simulation API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// Invalid request arguments.
    #[error(transparent)]
    InvalidArgs(#[from] ArgsError),
    /// The call value alone exceeds the sender balance.
    #[error("insufficient funds for transfer")]
    InsufficientFunds {
        /// Sender balance at the target state.
        balance: U256,
        /// Value carried by the call.
        value: U256,
    },
    /// Execution finished with a revert.
    #[error("execution reverted{}", revert_reason_suffix(.output))]
    Reverted {
        /// The revert payload.
        output: Bytes,
        /// Gas consumed before reverting.
        gas_used: u64,
    },
    /// Execution halted with an exceptional status (out of gas, invalid opcode, ...).
    #[error("{reason} (supplied gas {gas_limit})")]
    Halted {
        /// Halt reason reported by the engine.
        reason: String,
        /// Gas consumed.
        gas_used: u64,
        /// Gas limit of the message.
        gas_limit: u64,
    },
    /// The engine rejected the message before execution.
    #[error("err: {reason} (supplied gas {gas_limit})")]
    InvalidTransaction {
        /// Rejection reason reported by the engine.
        reason: String,
        /// Gas limit of the message.
        gas_limit: u64,
    },
    /// No gas limit up to `cap` made the call succeed.
    #[error("gas required exceeds allowance ({cap}) or always failing transaction")]
    GasExhausted {
        /// Upper bound of the estimation search.
        cap: u64,
    },
    /// Execution was cancelled by timeout or by the caller.
    #[error("execution aborted (timeout = {timeout:?})")]
    Aborted {
        /// The configured timeout of the aborted call. Zero when no timeout was set.
        timeout: Duration,
    },
    /// Intrinsic gas does not fit into 64 bits.
    #[error("gas uint64 overflow")]
    GasUintOverflow,
    /// Backend or engine infrastructure failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SimError {
    /// Returns `true` if the error means "the message ran (or was attempted) and did not
    /// succeed", as opposed to a malformed request or a broken backend.
    pub const fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Self::Reverted { .. } |
                Self::Halted { .. } |
                Self::InvalidTransaction { .. } |
                Self::Aborted { .. }
        )
    }

    /// Returns `true` for argument validation errors.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }

    /// Returns the revert payload if execution reverted.
    pub const fn revert_data(&self) -> Option<&Bytes> {
        match self {
            Self::Reverted { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Returns the ABI-decoded revert reason, if any.
    pub fn revert_reason(&self) -> Option<String> {
        self.revert_data().and_then(|output| alloy_sol_types::decode_revert_reason(output))
    }
}

impl From<EngineError> for SimError {
    fn from(err: EngineError) -> Self {
        Self::Backend(err.into())
    }
}

fn revert_reason_suffix(output: &Bytes) -> String {
    alloy_sol_types::decode_revert_reason(output)
        .map(|reason| format!(": {reason}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::{Revert, SolError};

    use super::*;

    #[test]
    fn test_revert_message_includes_decoded_reason() {
        let output = Bytes::from(Revert { reason: "not enough tokens".into() }.abi_encode());
        let err = SimError::Reverted { output, gas_used: 100 };
        assert_eq!(err.to_string(), "execution reverted: not enough tokens");
        assert_eq!(err.revert_reason().as_deref(), Some("not enough tokens"));
        assert!(err.is_execution_failure());
    }

    #[test]
    fn test_revert_message_without_payload() {
        let err = SimError::Reverted { output: Bytes::new(), gas_used: 0 };
        assert_eq!(err.to_string(), "execution reverted");
    }

    #[test]
    fn test_infrastructure_errors_are_not_execution_failures() {
        let err = SimError::from(BackendError::State(StateError::new(fmt::Error)));
        assert!(!err.is_execution_failure());
        assert!(!SimError::GasExhausted { cap: 1 }.is_execution_failure());
        assert!(SimError::from(ArgsError::EmptyCreation).is_validation());
    }

    #[test]
    fn test_state_error_keeps_original_error() {
        let err = BackendError::State(StateError::new(fmt::Error));
        assert_eq!(err.to_string(), format!("state access failed: {}", fmt::Error));

        let BackendError::State(state) = &err else { unreachable!() };
        assert!(state.downcast_ref::<fmt::Error>().is_some());
        assert!(state.downcast_ref::<ArgsError>().is_none());
        assert_eq!(state.get_ref().to_string(), fmt::Error.to_string());
        assert!(err.source().is_some());
    }
}
