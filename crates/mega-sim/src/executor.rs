//! Call Executor: runs a call against a private, optionally overridden view of a block's state.

use core::time::Duration;
use std::time::Instant;

use alloy_eips::BlockId;
use alloy_primitives::{Bytes, U256};
use revm::DatabaseRef;
use tracing::debug;

use crate::{
    intrinsic_gas, BackendError, CallArgs, CancelScope, CancelToken, EngineError, ExecutionEngine,
    ExecutionStatus, SimBackend, SimError, SimResult, StateError, StateOverride, WorkingState,
};

/// How a call that ran to completion ended.
///
/// Infrastructure failures, cancellations and engine rejections are reported as [`SimError`]
/// instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The call succeeded.
    Success {
        /// Return data.
        output: Bytes,
        /// Gas consumed.
        gas_used: u64,
    },
    /// The call reverted.
    Revert {
        /// Revert payload.
        output: Bytes,
        /// Gas consumed.
        gas_used: u64,
    },
    /// The call halted exceptionally, e.g. out of gas.
    Halt {
        /// Halt reason.
        reason: String,
        /// Gas consumed.
        gas_used: u64,
        /// Gas limit of the message.
        gas_limit: u64,
    },
}

impl ExecutionOutcome {
    /// Returns `true` for [`ExecutionOutcome::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Gas consumed by the call.
    pub const fn gas_used(&self) -> u64 {
        match self {
            Self::Success { gas_used, .. } |
            Self::Revert { gas_used, .. } |
            Self::Halt { gas_used, .. } => *gas_used,
        }
    }

    /// Converts a failed outcome into the matching [`SimError`].
    pub fn into_result(self) -> SimResult<CallOutput> {
        match self {
            Self::Success { output, gas_used } => Ok(CallOutput { output, gas_used }),
            Self::Revert { output, gas_used } => Err(SimError::Reverted { output, gas_used }),
            Self::Halt { reason, gas_used, gas_limit } => {
                Err(SimError::Halted { reason, gas_used, gas_limit })
            }
        }
    }
}

/// Output of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    /// Return data.
    pub output: Bytes,
    /// Gas consumed.
    pub gas_used: u64,
}

/// Executes `args` on the state of block `at`, with `overrides` applied to a private copy.
///
/// A non-zero `timeout` bounds the execution in wall-clock time; `cancel` aborts it at any time.
/// `gas_cap` of zero means no global cap. Canonical state is never written.
pub fn do_call<B: SimBackend>(
    backend: &B,
    args: &CallArgs,
    at: BlockId,
    overrides: Option<&StateOverride>,
    timeout: Duration,
    gas_cap: u64,
    cancel: &CancelToken,
) -> SimResult<ExecutionOutcome>
where
    <B::State as DatabaseRef>::Error: 'static,
{
    let start = Instant::now();

    let (state, header) = backend.state_and_header(at)?;
    let mut working = WorkingState::new(state);
    if let Some(overrides) = overrides {
        overrides
            .apply(&mut working)
            .map_err(|err| BackendError::State(StateError::new(err)))?;
    }

    let scope = CancelScope::new(cancel, timeout);

    let chain = backend.chain_config();
    let rules = chain.rules(header.number);
    let intrinsic = intrinsic_gas(args.input.as_slice(), args.to.is_none(), &rules)?;
    let base_fee = rules.is_london.then(|| U256::from(chain.base_fee));
    let message = args.to_message(gas_cap, base_fee, intrinsic);
    let gas_limit = message.gas_limit();

    if scope.token().poll() {
        return Err(SimError::Aborted { timeout: scope.timeout() });
    }

    let mut engine = backend.new_engine(&message, working, &header, scope.token().clone())?;
    let result = engine.run();

    debug!(
        target: "mega_sim::executor",
        runtime = ?start.elapsed(),
        gas_limit,
        "Executing EVM call finished"
    );

    let output = match result {
        Err(EngineError::Fatal(reason)) => {
            return Err(BackendError::Engine(EngineError::Fatal(reason)).into())
        }
        _ if engine.cancelled() => return Err(SimError::Aborted { timeout: scope.timeout() }),
        Err(EngineError::InvalidTransaction(reason)) => {
            return Err(SimError::InvalidTransaction { reason, gas_limit })
        }
        Ok(output) => output,
    };

    Ok(match output.status {
        ExecutionStatus::Success => {
            ExecutionOutcome::Success { output: output.output, gas_used: output.gas_used }
        }
        ExecutionStatus::Reverted => {
            ExecutionOutcome::Revert { output: output.output, gas_used: output.gas_used }
        }
        ExecutionStatus::Halted(reason) => {
            ExecutionOutcome::Halt { reason, gas_used: output.gas_used, gas_limit }
        }
    })
}
