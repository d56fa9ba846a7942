//! The chain backend consumed by the simulator.

use core::fmt::Debug;

use alloy_consensus::Header;
use alloy_eips::BlockId;
use alloy_primitives::{Address, U256};
use revm::DatabaseRef;

use crate::{
    BackendError, CancelToken, CanonicalMessage, ChainConfig, ExecutionEngine, WorkingState,
};

/// Everything the simulator needs from the surrounding node. All other chain subsystems stay
/// behind this boundary.
///
/// `State` is a shareable snapshot. The simulator only reads it through a private
/// [`WorkingState`] layer, so implementations may hand out the same snapshot to concurrent
/// requests.
pub trait SimBackend {
    /// Read-only state snapshot.
    type State: DatabaseRef<Error: core::error::Error + Send + Sync + 'static> + Debug;

    /// Execution engine bound to one message.
    type Engine: ExecutionEngine;

    /// Resolves a block reference to its state and header.
    fn state_and_header(&self, at: BlockId) -> Result<(Self::State, Header), BackendError>;

    /// Builds an engine that runs `message` on `state` in the context of `header`, observing
    /// `cancel`.
    fn new_engine(
        &self,
        message: &CanonicalMessage,
        state: WorkingState<Self::State>,
        header: &Header,
        cancel: CancelToken,
    ) -> Result<Self::Engine, BackendError>;

    /// Suggested gas price (or priority fee, in dynamic-fee mode).
    fn suggest_price(&self) -> Result<U256, BackendError>;

    /// Next nonce of `address` as seen by the transaction pool.
    fn pool_nonce(&self, address: Address) -> Result<u64, BackendError>;

    /// Chain configuration.
    fn chain_config(&self) -> &ChainConfig;

    /// Globally configured gas cap for simulated calls, if any.
    fn rpc_gas_cap(&self) -> Option<u64>;

    /// Header of the current head block.
    fn current_header(&self) -> Header;
}
