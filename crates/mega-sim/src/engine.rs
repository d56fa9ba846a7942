//! Execution engines that run a [`CanonicalMessage`] without committing state.

use alloy_consensus::Header;
use alloy_evm::{Database, EthEvmFactory, Evm, EvmEnv, EvmFactory};
use alloy_primitives::{Bytes, U256};
use revm::{
    context::{
        result::{EVMError, ExecutionResult, HaltReason, OutOfGasError},
        BlockEnv, CfgEnv, TxEnv,
    },
    inspector::Inspector,
    interpreter::{interpreter::EthInterpreter, InstructionResult, Interpreter},
};

use crate::{
    constants::CANCEL_POLL_INTERVAL, CancelReason, CancelToken, CanonicalMessage, ChainConfig,
    EngineError,
};

/// How a completed execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The message executed successfully.
    Success,
    /// The message reverted; the output is the revert payload.
    Reverted,
    /// The message halted exceptionally.
    Halted(String),
}

/// Result of a completed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    /// Return or revert data.
    pub output: Bytes,
    /// Gas consumed, refunds applied.
    pub gas_used: u64,
    /// Execution status.
    pub status: ExecutionStatus,
}

impl From<ExecutionResult<HaltReason>> for EngineOutput {
    fn from(result: ExecutionResult<HaltReason>) -> Self {
        match result {
            ExecutionResult::Success { gas_used, output, .. } => {
                Self { output: output.into_data(), gas_used, status: ExecutionStatus::Success }
            }
            ExecutionResult::Revert { gas_used, output } => {
                Self { output, gas_used, status: ExecutionStatus::Reverted }
            }
            ExecutionResult::Halt { reason, gas_used } => Self {
                output: Bytes::new(),
                gas_used,
                status: ExecutionStatus::Halted(halt_reason_message(&reason)),
            },
        }
    }
}

fn halt_reason_message(reason: &HaltReason) -> String {
    match reason {
        HaltReason::OutOfGas(OutOfGasError::Basic) => "out of gas".to_string(),
        HaltReason::OutOfGas(kind) => format!("out of gas: {kind:?}"),
        other => format!("{other:?}"),
    }
}

/// A single-use engine bound to one message, one working state and one header.
pub trait ExecutionEngine {
    /// Runs the message. An engine runs at most once.
    fn run(&mut self) -> Result<EngineOutput, EngineError>;

    /// Asks a running or not yet started execution to stop.
    fn cancel(&self, reason: CancelReason);

    /// Returns `true` if the engine was asked to stop.
    fn cancelled(&self) -> bool;
}

/// Inspector that halts the interpreter once its token is cancelled or its deadline passes.
#[derive(Debug, Clone)]
pub struct CancelInspector {
    cancel: CancelToken,
    steps: u32,
}

impl CancelInspector {
    /// Creates an inspector watching `cancel`.
    pub const fn new(cancel: CancelToken) -> Self {
        Self { cancel, steps: 0 }
    }

    fn should_halt(&mut self) -> bool {
        self.steps = self.steps.wrapping_add(1);
        if self.steps % CANCEL_POLL_INTERVAL == 0 {
            self.cancel.poll()
        } else {
            self.cancel.is_cancelled()
        }
    }
}

impl<CTX> Inspector<CTX> for CancelInspector {
    fn step(&mut self, interp: &mut Interpreter<EthInterpreter>, _context: &mut CTX) {
        if self.should_halt() {
            interp.halt(InstructionResult::OutOfGas);
        }
    }
}

/// [`ExecutionEngine`] backed by revm through the alloy-evm Ethereum factory.
#[derive(Debug)]
pub struct RevmEngine<DB> {
    db: Option<DB>,
    env: EvmEnv,
    tx: TxEnv,
    intrinsic_gas: u64,
    cancel: CancelToken,
}

impl<DB: Database> RevmEngine<DB> {
    /// Prepares an engine for `message`.
    ///
    /// Nonce checks and the block gas limit are disabled, as is the base fee check when the
    /// message is free. The base fee comes from the chain configuration while dynamic fees are
    /// active at the header height.
    pub fn new(
        message: &CanonicalMessage,
        db: DB,
        header: &Header,
        chain: &ChainConfig,
        cancel: CancelToken,
    ) -> Result<Self, EngineError> {
        let rules = chain.rules(header.number);
        let gas_price = u128::try_from(message.gas_price()).map_err(|_| {
            EngineError::InvalidTransaction(format!(
                "gas price {} exceeds 128 bits",
                message.gas_price()
            ))
        })?;

        let mut cfg_env = CfgEnv::new_with_spec(rules.spec_id());
        cfg_env.chain_id = chain.chain_id;
        cfg_env.disable_nonce_check = true;
        cfg_env.disable_block_gas_limit = true;
        cfg_env.disable_base_fee = gas_price == 0;

        let block_env = BlockEnv {
            number: U256::from(header.number),
            beneficiary: header.beneficiary,
            timestamp: U256::from(header.timestamp),
            gas_limit: header.gas_limit,
            basefee: if rules.is_london { chain.base_fee } else { 0 },
            difficulty: header.difficulty,
            prevrandao: Some(header.mix_hash),
            ..Default::default()
        };

        let tx = TxEnv {
            caller: message.sender(),
            kind: message.kind(),
            value: message.value(),
            data: message.input().clone(),
            gas_limit: message.gas_limit(),
            gas_price,
            gas_priority_fee: None,
            chain_id: None,
            nonce: 0,
            ..Default::default()
        };

        Ok(Self {
            db: Some(db),
            env: EvmEnv { cfg_env, block_env },
            tx,
            intrinsic_gas: message.intrinsic_gas(),
            cancel,
        })
    }
}

impl<DB: Database> ExecutionEngine for RevmEngine<DB> {
    fn run(&mut self) -> Result<EngineOutput, EngineError> {
        let db = self.db.take().ok_or_else(|| EngineError::Fatal("engine already ran".into()))?;
        if self.tx.gas_limit < self.intrinsic_gas {
            return Err(EngineError::InvalidTransaction(format!(
                "intrinsic gas too low: have {}, want {}",
                self.tx.gas_limit, self.intrinsic_gas
            )));
        }

        let mut evm = EthEvmFactory::default().create_evm_with_inspector(
            db,
            self.env.clone(),
            CancelInspector::new(self.cancel.clone()),
        );
        match evm.transact_raw(self.tx.clone()) {
            Ok(result) => Ok(result.result.into()),
            Err(EVMError::Transaction(err)) => {
                Err(EngineError::InvalidTransaction(err.to_string()))
            }
            Err(EVMError::Header(err)) => Err(EngineError::InvalidTransaction(err.to_string())),
            Err(err) => Err(EngineError::Fatal(err.to_string())),
        }
    }

    fn cancel(&self, reason: CancelReason) {
        self.cancel.cancel(reason);
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
