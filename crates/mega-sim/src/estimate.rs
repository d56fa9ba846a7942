//! Gas Estimator: binary search for the smallest gas limit that lets a call succeed.

use core::time::Duration;

use alloy_eips::BlockId;
use alloy_primitives::U256;
use revm::DatabaseRef;
use tracing::{trace, warn};

use crate::{
    constants::{TX_GAS, UPPER_GAS_LIMIT},
    do_call, BackendError, CallArgs, CancelToken, SimBackend, SimError, SimResult, StateError,
};

/// Returns the smallest gas limit for which `args` executes successfully.
///
/// The search range starts at `(TX_GAS - 1, hi]`, where `hi` is the caller's gas limit when it is
/// at least [`TX_GAS`] and [`UPPER_GAS_LIMIT`] otherwise. `hi` is then bounded by the gas the
/// sender can pay for at block `at` and by `gas_cap` (zero for none). Trial executions always run
/// against the latest block without overrides or timeout. When the search ends at the unchanged
/// upper bound, that bound is executed once more and any infrastructure error from it is
/// returned.
pub fn estimate_gas<B: SimBackend>(
    backend: &B,
    args: &CallArgs,
    at: BlockId,
    gas_cap: u64,
    cancel: &CancelToken,
) -> SimResult<u64>
where
    <B::State as DatabaseRef>::Error: 'static,
{
    let mut lo = TX_GAS - 1;
    let mut hi = match args.gas {
        Some(gas) if gas >= TX_GAS => gas,
        _ => UPPER_GAS_LIMIT,
    };

    let fee_cap = args.fees.fee_cap();
    let value = args.value.unwrap_or_default();
    if !fee_cap.is_zero() || !value.is_zero() {
        let balance = sender_balance(backend, args, at)?;
        if value > balance {
            return Err(SimError::InsufficientFunds { balance, value });
        }
        if !fee_cap.is_zero() {
            let allowance = (balance - value) / fee_cap;
            if allowance < U256::from(hi) {
                warn!(
                    target: "mega_sim::estimate",
                    original = hi,
                    %balance,
                    sent = %value,
                    %fee_cap,
                    fundable = %allowance,
                    "Gas estimation capped by limited funds"
                );
                hi = allowance.to::<u64>();
            }
        }
    }
    if gas_cap != 0 && hi > gas_cap {
        warn!(
            target: "mega_sim::estimate",
            requested = hi,
            cap = gas_cap,
            "Caller gas above allowance, capping"
        );
        hi = gas_cap;
    }
    let cap = hi;

    let mut trial_args = args.clone();
    let mut executable = |gas: u64| -> SimResult<bool> {
        trial_args.gas = Some(gas);
        let result = do_call(
            backend,
            &trial_args,
            BlockId::latest(),
            None,
            Duration::ZERO,
            gas_cap,
            cancel,
        )
        .and_then(|outcome| outcome.into_result());
        trace!(target: "mega_sim::estimate", gas, ok = result.is_ok(), "Tried gas limit");
        match result {
            Ok(_) => Ok(true),
            Err(err) if err.is_execution_failure() => Ok(false),
            Err(err) => Err(err),
        }
    };

    while lo + 1 < hi {
        if cancel.is_cancelled() {
            return Err(SimError::Aborted { timeout: Duration::ZERO });
        }
        let mid = lo + (hi - lo) / 2;
        if executable(mid).unwrap_or(false) {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    if hi == cap {
        if cancel.is_cancelled() {
            return Err(SimError::Aborted { timeout: Duration::ZERO });
        }
        if !executable(hi)? {
            return Err(SimError::GasExhausted { cap });
        }
    }
    Ok(hi)
}

fn sender_balance<B: SimBackend>(backend: &B, args: &CallArgs, at: BlockId) -> SimResult<U256>
where
    <B::State as DatabaseRef>::Error: 'static,
{
    let (state, _) = backend.state_and_header(at)?;
    let info = state
        .basic_ref(args.sender())
        .map_err(|err| BackendError::State(StateError::new(err)))?;
    Ok(info.map(|info| info.balance).unwrap_or_default())
}
