//! Tests for direct call simulation: outcomes, overrides, isolation and cancellation.

use std::{
    thread,
    time::{Duration, Instant},
};

use alloy_consensus::Header;
use alloy_eips::BlockId;
use alloy_primitives::{address, b256, Address, Bytes, B256, U256};
use mega_sim::{
    constants::DEFAULT_CALL_TIMEOUT,
    do_call,
    revm::{
        bytecode::opcode::*,
        database::DBErrorMarker,
        state::{AccountInfo, Bytecode},
        DatabaseRef,
    },
    test_utils::BytecodeBuilder,
    AccountOverride, BackendError, CallArgs, CancelReason, CancelToken, CanonicalMessage,
    ChainConfig, ExecutionOutcome, InMemoryBackend, MemoryDatabase, RevmEngine, SimBackend,
    SimError, SimResult, StateOverride, WorkingState,
};

const CALLER: Address = address!("0000000000000000000000000000000000100000");
const CONTRACT: Address = address!("0000000000000000000000000000000000100002");
const EOA: Address = address!("0000000000000000000000000000000000100003");

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn backend(db: MemoryDatabase) -> InMemoryBackend {
    InMemoryBackend::new(ChainConfig::default(), db)
}

fn call(
    backend: &InMemoryBackend,
    args: &CallArgs,
    overrides: Option<&StateOverride>,
) -> SimResult<ExecutionOutcome> {
    do_call(
        backend,
        args,
        BlockId::latest(),
        overrides,
        DEFAULT_CALL_TIMEOUT,
        0,
        &CancelToken::new(),
    )
}

fn call_contract() -> CallArgs {
    CallArgs::default().with_from(CALLER).with_to(CONTRACT)
}

/// Contract returning the word stored at slot 0.
fn slot_reader() -> Bytes {
    BytecodeBuilder::default()
        .sload(0)
        .push_number(0)
        .append(MSTORE)
        .push_number(32)
        .push_number(0)
        .append(RETURN)
        .build()
}

fn output_word(outcome: ExecutionOutcome) -> U256 {
    match outcome {
        ExecutionOutcome::Success { output, .. } => U256::from_be_slice(&output),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

/// Read failure reported by [`FailingState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("account {0} is unreadable")]
struct UnreadableAccount(Address);

impl DBErrorMarker for UnreadableAccount {}

/// State whose account reads fail for one address.
#[derive(Debug, Clone)]
struct FailingState {
    inner: MemoryDatabase,
    unreadable: Address,
}

impl DatabaseRef for FailingState {
    type Error = UnreadableAccount;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        if address == self.unreadable {
            return Err(UnreadableAccount(address));
        }
        Ok(self.inner.basic_ref(address).unwrap_or_else(|never| match never {}))
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        Ok(self.inner.code_by_hash_ref(code_hash).unwrap_or_else(|never| match never {}))
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        Ok(self.inner.storage_ref(address, index).unwrap_or_else(|never| match never {}))
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        Ok(self.inner.block_hash_ref(number).unwrap_or_else(|never| match never {}))
    }
}

/// Backend serving [`FailingState`] on top of an [`InMemoryBackend`].
#[derive(Debug)]
struct FailingBackend {
    inner: InMemoryBackend,
    unreadable: Address,
}

impl SimBackend for FailingBackend {
    type State = FailingState;
    type Engine = RevmEngine<WorkingState<FailingState>>;

    fn state_and_header(&self, at: BlockId) -> Result<(Self::State, Header), BackendError> {
        let (inner, header) = self.inner.state_and_header(at)?;
        Ok((FailingState { inner, unreadable: self.unreadable }, header))
    }

    fn new_engine(
        &self,
        message: &CanonicalMessage,
        state: WorkingState<Self::State>,
        header: &Header,
        cancel: CancelToken,
    ) -> Result<Self::Engine, BackendError> {
        Ok(RevmEngine::new(message, state, header, self.inner.chain_config(), cancel)?)
    }

    fn suggest_price(&self) -> Result<U256, BackendError> {
        self.inner.suggest_price()
    }

    fn pool_nonce(&self, address: Address) -> Result<u64, BackendError> {
        self.inner.pool_nonce(address)
    }

    fn chain_config(&self) -> &ChainConfig {
        self.inner.chain_config()
    }

    fn rpc_gas_cap(&self) -> Option<u64> {
        self.inner.rpc_gas_cap()
    }

    fn current_header(&self) -> Header {
        self.inner.current_header()
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[test]
fn test_successful_call_returns_output() {
    let code =
        BytecodeBuilder::default().return_with_data(U256::from(42).to_be_bytes::<32>()).build();
    let backend = backend(MemoryDatabase::default().account_code(CONTRACT, code));

    let outcome = call(&backend, &call_contract(), None).unwrap();
    assert!(outcome.is_success());
    assert!(outcome.gas_used() > 21_000);
    assert_eq!(output_word(outcome), U256::from(42));
}

#[test]
fn test_revert_is_an_outcome_not_a_failure() {
    let code = BytecodeBuilder::default().revert_with_data(b"nope").build();
    let backend = backend(MemoryDatabase::default().account_code(CONTRACT, code));

    let outcome = call(&backend, &call_contract(), None).unwrap();
    let ExecutionOutcome::Revert { output, .. } = &outcome else {
        panic!("expected revert, got {outcome:?}");
    };
    assert_eq!(output.as_ref(), b"nope");

    let err = outcome.into_result().unwrap_err();
    assert!(err.is_execution_failure());
    assert_eq!(err.revert_data().map(|data| data.as_ref()), Some(&b"nope"[..]));
    assert!(err.to_string().starts_with("execution reverted"));
}

#[test]
fn test_invalid_opcode_halts() {
    let code = BytecodeBuilder::default().append(INVALID).build();
    let backend = backend(MemoryDatabase::default().account_code(CONTRACT, code));

    let outcome = call(&backend, &call_contract().with_gas(100_000), None).unwrap();
    assert!(matches!(outcome, ExecutionOutcome::Halt { gas_limit: 100_000, .. }));
    let err = outcome.into_result().unwrap_err();
    assert!(err.to_string().ends_with("(supplied gas 100000)"), "{err}");
}

#[test]
fn test_contract_creation_returns_runtime_code() {
    let runtime = BytecodeBuilder::default().stop().build();
    let init_code = BytecodeBuilder::default().return_with_data(&runtime).build();
    let backend = backend(MemoryDatabase::default());

    let args = CallArgs::default().with_from(CALLER).with_input(init_code);
    let outcome = call(&backend, &args, None).unwrap();
    let ExecutionOutcome::Success { output, .. } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(output, runtime);
}

#[test]
fn test_gas_below_intrinsic_is_rejected() {
    let backend = backend(MemoryDatabase::default());
    let args = CallArgs::default().with_from(CALLER).with_to(EOA).with_gas(20_000);

    let err = call(&backend, &args, None).unwrap_err();
    assert!(matches!(err, SimError::InvalidTransaction { gas_limit: 20_000, .. }), "{err}");
    assert!(err.is_execution_failure());
}

#[test]
fn test_unknown_block_is_an_infrastructure_failure() {
    let backend = backend(MemoryDatabase::default());
    let err = do_call(
        &backend,
        &call_contract(),
        BlockId::number(5),
        None,
        Duration::ZERO,
        0,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert_eq!(err, SimError::Backend(BackendError::HeaderNotFound(BlockId::number(5))));
    assert!(!err.is_execution_failure());
}

#[test]
fn test_override_read_failure_keeps_state_error() {
    let backend = FailingBackend { inner: backend(MemoryDatabase::default()), unreadable: EOA };
    let overrides = StateOverride::new()
        .with_account(EOA, AccountOverride::default().with_balance(U256::from(1)));
    let args = CallArgs::default().with_from(CALLER).with_to(EOA);

    let err = do_call(
        &backend,
        &args,
        BlockId::latest(),
        Some(&overrides),
        DEFAULT_CALL_TIMEOUT,
        0,
        &CancelToken::new(),
    )
    .unwrap_err();
    let SimError::Backend(BackendError::State(state)) = &err else {
        panic!("expected state error, got {err:?}");
    };
    assert_eq!(state.downcast_ref::<UnreadableAccount>(), Some(&UnreadableAccount(EOA)));
    assert_eq!(err.to_string(), format!("state access failed: account {EOA} is unreadable"));
    assert!(!err.is_execution_failure());

    // Without an override touching the account, the call runs.
    assert!(do_call(
        &backend,
        &CallArgs::default().with_from(CALLER).with_to(CONTRACT),
        BlockId::latest(),
        None,
        DEFAULT_CALL_TIMEOUT,
        0,
        &CancelToken::new(),
    )
    .unwrap()
    .is_success());
}

// ============================================================================
// ISOLATION
// ============================================================================

#[test]
fn test_repeated_calls_are_deterministic_and_side_effect_free() {
    let code = BytecodeBuilder::default().sstore(0, U256::from(7)).stop().build();
    let backend = backend(MemoryDatabase::default().account_code(CONTRACT, code));

    let first = call(&backend, &call_contract(), None).unwrap();
    let second = call(&backend, &call_contract(), None).unwrap();
    assert!(first.is_success());
    assert_eq!(first, second);

    let (state, _) = backend.state_and_header(BlockId::latest()).unwrap();
    assert_eq!(state.storage_ref(CONTRACT, U256::ZERO).unwrap(), U256::ZERO);
}

#[test]
fn test_balance_override_funds_the_sender_only_for_the_call() {
    let backend = backend(MemoryDatabase::default());
    let args = CallArgs::default()
        .with_from(CALLER)
        .with_to(EOA)
        .with_gas(100_000)
        .with_gas_price(U256::from(1));

    let err = call(&backend, &args, None).unwrap_err();
    assert!(matches!(err, SimError::InvalidTransaction { .. }), "{err}");

    let one_ether = U256::from(10).pow(U256::from(18));
    let overrides = StateOverride::new()
        .with_account(CALLER, AccountOverride::default().with_balance(one_ether));
    let outcome = call(&backend, &args, Some(&overrides)).unwrap();
    assert!(outcome.is_success());

    let (state, _) = backend.state_and_header(BlockId::latest()).unwrap();
    assert!(state.basic_ref(CALLER).unwrap().is_none_or(|info| info.balance.is_zero()));
}

#[test]
fn test_storage_overrides() {
    let db = MemoryDatabase::default()
        .account_code(CONTRACT, slot_reader())
        .account_storage(CONTRACT, U256::ZERO, U256::from(1));
    let backend = backend(db);
    assert_eq!(output_word(call(&backend, &call_contract(), None).unwrap()), U256::from(1));

    let slot0 = b256!("0000000000000000000000000000000000000000000000000000000000000000");
    let slot1 = b256!("0000000000000000000000000000000000000000000000000000000000000001");
    let five = b256!("0000000000000000000000000000000000000000000000000000000000000005");

    let diff = StateOverride::new()
        .with_account(CONTRACT, AccountOverride::default().with_state_diff([(slot0, five)].into()));
    assert_eq!(output_word(call(&backend, &call_contract(), Some(&diff)).unwrap()), U256::from(5));

    let replace = StateOverride::new()
        .with_account(CONTRACT, AccountOverride::default().with_state([(slot1, five)].into()));
    assert_eq!(output_word(call(&backend, &call_contract(), Some(&replace)).unwrap()), U256::ZERO);

    assert_eq!(output_word(call(&backend, &call_contract(), None).unwrap()), U256::from(1));
}

#[test]
fn test_code_override_turns_account_into_contract() {
    let backend = backend(MemoryDatabase::default());
    let code =
        BytecodeBuilder::default().return_with_data(U256::from(9).to_be_bytes::<32>()).build();
    let overrides =
        StateOverride::new().with_account(EOA, AccountOverride::default().with_code(code));

    let args = CallArgs::default().with_from(CALLER).with_to(EOA);
    assert_eq!(output_word(call(&backend, &args, Some(&overrides)).unwrap()), U256::from(9));
    assert_eq!(call(&backend, &args, None).unwrap().gas_used(), 21_000);
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn test_timeout_aborts_endless_execution() {
    let code = BytecodeBuilder::default().infinite_loop().build();
    let backend = backend(MemoryDatabase::default().account_code(CONTRACT, code));
    let timeout = Duration::from_millis(50);

    let start = Instant::now();
    let err = do_call(
        &backend,
        &call_contract(),
        BlockId::latest(),
        None,
        timeout,
        0,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert_eq!(err, SimError::Aborted { timeout });
    assert_eq!(err.to_string(), "execution aborted (timeout = 50ms)");
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_outer_cancellation_aborts_without_timeout() {
    let code = BytecodeBuilder::default().infinite_loop().build();
    let backend = backend(MemoryDatabase::default().account_code(CONTRACT, code));
    let cancel = CancelToken::new();

    let canceller = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel(CancelReason::Requested);
        })
    };
    let err =
        do_call(&backend, &call_contract(), BlockId::latest(), None, Duration::ZERO, 0, &cancel)
            .unwrap_err();
    canceller.join().unwrap();
    assert_eq!(err, SimError::Aborted { timeout: Duration::ZERO });
}

#[test]
fn test_already_cancelled_call_does_not_run() {
    let backend = backend(MemoryDatabase::default());
    let cancel = CancelToken::new();
    cancel.cancel(CancelReason::Requested);

    let args = CallArgs::default().with_from(CALLER).with_to(EOA);
    let err = do_call(&backend, &args, BlockId::latest(), None, DEFAULT_CALL_TIMEOUT, 0, &cancel)
        .unwrap_err();
    assert_eq!(err, SimError::Aborted { timeout: DEFAULT_CALL_TIMEOUT });
}

#[test]
fn test_global_gas_cap_bounds_endless_execution() {
    let code = BytecodeBuilder::default().infinite_loop().build();
    let backend = backend(MemoryDatabase::default().account_code(CONTRACT, code));

    let outcome = do_call(
        &backend,
        &call_contract(),
        BlockId::latest(),
        None,
        Duration::ZERO,
        1_000_000,
        &CancelToken::new(),
    )
    .unwrap();
    let ExecutionOutcome::Halt { reason, gas_used, gas_limit } = outcome else {
        panic!("expected halt, got {outcome:?}");
    };
    assert_eq!(reason, "out of gas");
    assert_eq!(gas_used, 1_000_000);
    assert_eq!(gas_limit, 1_000_000);
}
