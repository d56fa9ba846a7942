//! Argument Normalizer: fills every missing field of a [`CallArgs`] or rejects it.

use alloy_eips::BlockId;
use alloy_primitives::U256;
use revm::DatabaseRef;
use tracing::trace;

use crate::{
    estimate_gas, ArgsError, CallArgs, CallFees, CallInput, CancelToken, SimBackend, SimResult,
};

impl CallArgs {
    /// Returns a copy of the arguments with fees, value, nonce, gas and chain id filled in.
    ///
    /// Dynamic-fee mode is decided at the current head. A missing gas limit is estimated against
    /// the pending block. Nothing is returned unless every step succeeds.
    pub fn fill_defaults<B: SimBackend>(
        &self,
        backend: &B,
        cancel: &CancelToken,
    ) -> SimResult<Self>
    where
        <B::State as DatabaseRef>::Error: 'static,
    {
        let mut args = self.clone();
        let chain = backend.chain_config();
        let head = backend.current_header();

        let fees = args.fees;
        args.fees = match fees {
            CallFees::Legacy { .. } => fees,
            CallFees::Dynamic {
                max_fee_per_gas: Some(max_fee_per_gas),
                max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
            } => {
                check_tip(max_fee_per_gas, max_priority_fee_per_gas)?;
                fees
            }
            CallFees::Dynamic { max_fee_per_gas, max_priority_fee_per_gas }
                if chain.is_london(head.number) =>
            {
                let max_priority_fee_per_gas = match max_priority_fee_per_gas {
                    Some(tip) => tip,
                    None => backend.suggest_price()?,
                };
                let max_fee_per_gas = max_fee_per_gas.unwrap_or_else(|| {
                    max_priority_fee_per_gas
                        .saturating_add(U256::from(chain.base_fee).saturating_mul(U256::from(2)))
                });
                check_tip(max_fee_per_gas, max_priority_fee_per_gas)?;
                CallFees::Dynamic {
                    max_fee_per_gas: Some(max_fee_per_gas),
                    max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
                }
            }
            CallFees::Dynamic { .. } => return Err(ArgsError::DynamicFeeBeforeLondon.into()),
            CallFees::Unspecified if chain.is_london(head.number) => {
                let tip = backend.suggest_price()?;
                let max_fee_per_gas =
                    tip.saturating_add(U256::from(chain.base_fee).saturating_mul(U256::from(2)));
                check_tip(max_fee_per_gas, tip)?;
                CallFees::Dynamic {
                    max_fee_per_gas: Some(max_fee_per_gas),
                    max_priority_fee_per_gas: Some(tip),
                }
            }
            CallFees::Unspecified => CallFees::Legacy { gas_price: backend.suggest_price()? },
        };

        if args.value.is_none() {
            args.value = Some(U256::ZERO);
        }
        if args.nonce.is_none() {
            args.nonce = Some(backend.pool_nonce(args.sender())?);
        }

        args.input.check()?;
        if args.to.is_none() && args.input.as_slice().is_empty() {
            return Err(ArgsError::EmptyCreation.into());
        }

        if args.gas.is_none() {
            let request = Self {
                from: args.from,
                to: args.to,
                gas: None,
                fees: args.fees,
                value: args.value,
                nonce: None,
                input: args.input.bytes().cloned().map(CallInput::new).unwrap_or_default(),
                chain_id: None,
            };
            let gas_cap = backend.rpc_gas_cap().unwrap_or_default();
            let estimated = estimate_gas(backend, &request, BlockId::pending(), gas_cap, cancel)?;
            trace!(target: "mega_sim::fill", estimated, "Estimated gas limit for call");
            args.gas = Some(estimated);
        }

        if args.chain_id.is_none() {
            args.chain_id = Some(chain.chain_id);
        }
        Ok(args)
    }
}

fn check_tip(max_fee_per_gas: U256, max_priority_fee_per_gas: U256) -> Result<(), ArgsError> {
    if max_fee_per_gas < max_priority_fee_per_gas {
        return Err(ArgsError::TipAboveFeeCap { max_fee_per_gas, max_priority_fee_per_gas });
    }
    Ok(())
}
