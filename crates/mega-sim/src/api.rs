//! The produced RPC-shaped surface over a [`SimBackend`].

use alloy_eips::BlockId;
use alloy_primitives::{Bytes, U256};
use revm::DatabaseRef;

use crate::{
    do_call, estimate_gas, CallArgs, CancelToken, SimBackend, SimConfig, SimResult, StateOverride,
};

/// `eth_call`, `eth_estimateGas` and friends over a backend.
#[derive(Debug, Clone)]
pub struct EthSimApi<B> {
    backend: B,
    config: SimConfig,
}

impl<B: SimBackend> EthSimApi<B>
where
    <B::State as DatabaseRef>::Error: 'static,
{
    /// Creates the API with the default [`SimConfig`].
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SimConfig::default())
    }

    /// Creates the API with `config`.
    pub const fn with_config(backend: B, config: SimConfig) -> Self {
        Self { backend, config }
    }

    /// The underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    fn gas_cap(&self) -> u64 {
        self.backend.rpc_gas_cap().unwrap_or_default()
    }

    /// Executes `args` at `block` and returns the raw output. Reverts, halts and timeouts are
    /// errors.
    pub fn call(
        &self,
        args: &CallArgs,
        block: BlockId,
        overrides: Option<&StateOverride>,
    ) -> SimResult<Bytes> {
        self.call_with_cancel(args, block, overrides, &CancelToken::new())
    }

    /// Like [`Self::call`], aborting when `cancel` is cancelled.
    pub fn call_with_cancel(
        &self,
        args: &CallArgs,
        block: BlockId,
        overrides: Option<&StateOverride>,
        cancel: &CancelToken,
    ) -> SimResult<Bytes> {
        let outcome = do_call(
            &self.backend,
            args,
            block,
            overrides,
            self.config.call_timeout,
            self.gas_cap(),
            cancel,
        )?;
        Ok(outcome.into_result()?.output)
    }

    /// Estimates the gas `args` needs at `block`, defaulting to the latest block.
    pub fn estimate_gas(&self, args: &CallArgs, block: Option<BlockId>) -> SimResult<u64> {
        estimate_gas(
            &self.backend,
            args,
            block.unwrap_or_else(BlockId::latest),
            self.gas_cap(),
            &CancelToken::new(),
        )
    }

    /// Returns `args` with every missing field filled in.
    pub fn fill_transaction(&self, args: &CallArgs) -> SimResult<CallArgs> {
        args.fill_defaults(&self.backend, &CancelToken::new())
    }

    /// Suggested legacy gas price.
    pub fn gas_price(&self) -> SimResult<U256> {
        Ok(self.backend.suggest_price()?)
    }

    /// Suggested priority fee.
    pub fn max_priority_fee_per_gas(&self) -> SimResult<U256> {
        Ok(self.backend.suggest_price()?)
    }

    /// Configured chain id.
    pub fn chain_id(&self) -> u64 {
        self.backend.chain_config().chain_id
    }
}
