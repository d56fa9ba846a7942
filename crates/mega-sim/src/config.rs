//! Chain and simulation configuration.

use core::time::Duration;

use revm::primitives::hardfork::SpecId;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CALL_TIMEOUT;

/// Chain parameters the simulator needs: identity, the fixed base fee and fork activation
/// heights.
///
/// A fork set to `None` is never active. The default configuration activates every fork at
/// genesis with a zero base fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChainConfig {
    /// Chain identifier used to default `chainId` and to configure the engine.
    pub chain_id: u64,
    /// Base fee per gas. Fixed by configuration rather than derived from parent blocks.
    pub base_fee: u64,
    /// Istanbul activation height (EIP-2028 calldata pricing).
    pub istanbul_block: Option<u64>,
    /// London activation height. The chain is in dynamic-fee mode from this height.
    pub london_block: Option<u64>,
    /// Shanghai activation height (EIP-3860 init code pricing, `PUSH0`).
    pub shanghai_block: Option<u64>,
    /// Cancun activation height.
    pub cancun_block: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            base_fee: 0,
            istanbul_block: Some(0),
            london_block: Some(0),
            shanghai_block: Some(0),
            cancun_block: Some(0),
        }
    }
}

impl ChainConfig {
    /// Sets the chain id.
    pub const fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the fixed base fee.
    pub const fn with_base_fee(mut self, base_fee: u64) -> Self {
        self.base_fee = base_fee;
        self
    }

    /// Sets the London activation height. `None` keeps the chain in legacy-fee mode.
    pub const fn with_london_block(mut self, london_block: Option<u64>) -> Self {
        self.london_block = london_block;
        self
    }

    /// Returns whether dynamic fees are active at the given height.
    pub fn is_london(&self, height: u64) -> bool {
        is_active(self.london_block, height)
    }

    /// Returns the protocol rules in force at the given height.
    pub fn rules(&self, height: u64) -> Rules {
        Rules {
            is_istanbul: is_active(self.istanbul_block, height),
            is_london: is_active(self.london_block, height),
            is_shanghai: is_active(self.shanghai_block, height),
            is_cancun: is_active(self.cancun_block, height),
        }
    }
}

fn is_active(activation: Option<u64>, height: u64) -> bool {
    activation.is_some_and(|block| block <= height)
}

/// Fork flags in force at a particular block height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rules {
    /// Istanbul is active.
    pub is_istanbul: bool,
    /// London is active; the chain is in dynamic-fee mode.
    pub is_london: bool,
    /// Shanghai is active.
    pub is_shanghai: bool,
    /// Cancun is active.
    pub is_cancun: bool,
}

impl Rules {
    /// Maps the rules to the newest matching revm [`SpecId`].
    pub const fn spec_id(&self) -> SpecId {
        if self.is_cancun {
            SpecId::CANCUN
        } else if self.is_shanghai {
            SpecId::SHANGHAI
        } else if self.is_london {
            SpecId::LONDON
        } else if self.is_istanbul {
            SpecId::ISTANBUL
        } else {
            SpecId::PETERSBURG
        }
    }
}

/// Knobs of the simulation API itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimConfig {
    /// Wall-clock budget of a direct `call`. Zero disables the timeout.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { call_timeout: DEFAULT_CALL_TIMEOUT }
    }
}
