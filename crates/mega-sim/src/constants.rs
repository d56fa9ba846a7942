//! Protocol constants used by intrinsic gas calculation and gas estimation.

use core::time::Duration;

/// Gas charged for every message call before execution starts.
pub const TX_GAS: u64 = 21_000;

/// Gas charged for every contract-creation message before execution starts.
pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;

/// Gas per zero byte of payload.
pub const TX_DATA_ZERO_GAS: u64 = 4;

/// Gas per non-zero byte of payload before Istanbul.
pub const TX_DATA_NON_ZERO_GAS_FRONTIER: u64 = 68;

/// Gas per non-zero byte of payload from Istanbul onward (EIP-2028).
pub const TX_DATA_NON_ZERO_GAS_EIP2028: u64 = 16;

/// Gas per 32-byte word of init code from Shanghai onward (EIP-3860).
pub const INIT_CODE_WORD_GAS: u64 = 2;

/// Protocol-wide gas ceiling used as the upper bound of the gas estimation search when the caller
/// does not provide a usable gas limit.
pub const UPPER_GAS_LIMIT: u64 = 999_999_999_999;

/// Gas limit given to a simulated message when neither the caller nor a global gas cap provides
/// one.
pub const UNCAPPED_CALL_GAS: u64 = u64::MAX / 2;

/// Default wall-clock budget of a single simulated call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of interpreter steps between two deadline checks of a running execution.
pub const CANCEL_POLL_INTERVAL: u32 = 1024;
