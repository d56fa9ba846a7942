//! Call arguments as supplied by the user and the canonical message built from them.

use alloy_primitives::{Address, Bytes, TxKind, U256};
use serde::{Deserialize, Serialize};

use crate::{constants::UNCAPPED_CALL_GAS, ArgsError};

/// Fee parameters of a call. Legacy and dynamic pricing are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallFees {
    /// No fee field supplied.
    #[default]
    Unspecified,
    /// Legacy pricing.
    Legacy {
        /// Gas price.
        gas_price: U256,
    },
    /// Dynamic-fee pricing. At least one field is set.
    Dynamic {
        /// Max fee per gas.
        max_fee_per_gas: Option<U256>,
        /// Max priority fee per gas.
        max_priority_fee_per_gas: Option<U256>,
    },
}

impl CallFees {
    /// Builds the fee shape from the three raw request fields.
    pub fn from_parts(
        gas_price: Option<U256>,
        max_fee_per_gas: Option<U256>,
        max_priority_fee_per_gas: Option<U256>,
    ) -> Result<Self, ArgsError> {
        match (gas_price, max_fee_per_gas, max_priority_fee_per_gas) {
            (None, None, None) => Ok(Self::Unspecified),
            (Some(gas_price), None, None) => Ok(Self::Legacy { gas_price }),
            (None, max_fee_per_gas, max_priority_fee_per_gas) => {
                Ok(Self::Dynamic { max_fee_per_gas, max_priority_fee_per_gas })
            }
            (Some(_), _, _) => Err(ArgsError::ConflictingFeeFields),
        }
    }

    /// Legacy gas price, if set.
    pub const fn gas_price(&self) -> Option<U256> {
        match self {
            Self::Legacy { gas_price } => Some(*gas_price),
            _ => None,
        }
    }

    /// Max fee per gas, if set.
    pub const fn max_fee_per_gas(&self) -> Option<U256> {
        match self {
            Self::Dynamic { max_fee_per_gas, .. } => *max_fee_per_gas,
            _ => None,
        }
    }

    /// Max priority fee per gas, if set.
    pub const fn max_priority_fee_per_gas(&self) -> Option<U256> {
        match self {
            Self::Dynamic { max_priority_fee_per_gas, .. } => *max_priority_fee_per_gas,
            _ => None,
        }
    }

    /// The most the sender pays per unit of gas: the legacy gas price or the max fee per gas.
    /// Zero when neither is set.
    pub fn fee_cap(&self) -> U256 {
        self.gas_price().or_else(|| self.max_fee_per_gas()).unwrap_or_default()
    }

    /// The price per gas the engine charges, given the base fee of the block if dynamic fees are
    /// active there.
    pub fn effective_gas_price(&self, base_fee: Option<U256>) -> U256 {
        let Some(base_fee) = base_fee else {
            return self.gas_price().unwrap_or_default();
        };
        match *self {
            Self::Legacy { gas_price } => gas_price,
            Self::Unspecified => U256::ZERO,
            Self::Dynamic { max_fee_per_gas, max_priority_fee_per_gas } => {
                let fee_cap = max_fee_per_gas.unwrap_or_default();
                let tip = max_priority_fee_per_gas.unwrap_or_default();
                if fee_cap.is_zero() && tip.is_zero() {
                    U256::ZERO
                } else {
                    tip.saturating_add(base_fee).min(fee_cap)
                }
            }
        }
    }
}

/// Call payload, accepted under either the `input` or the legacy `data` name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInput {
    /// Preferred payload field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
    /// Legacy payload field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl CallInput {
    /// Payload carried under `input`.
    pub const fn new(input: Bytes) -> Self {
        Self { input: Some(input), data: None }
    }

    /// Rejects a request whose `data` and `input` both exist and differ.
    pub fn check(&self) -> Result<(), ArgsError> {
        match (&self.input, &self.data) {
            (Some(input), Some(data)) if input != data => Err(ArgsError::InputMismatch),
            _ => Ok(()),
        }
    }

    /// The resolved payload: `input` if present, otherwise `data`.
    pub fn bytes(&self) -> Option<&Bytes> {
        self.input.as_ref().or(self.data.as_ref())
    }

    /// The resolved payload, empty when neither alias is set.
    pub fn as_slice(&self) -> &[u8] {
        self.bytes().map(|bytes| &bytes[..]).unwrap_or_default()
    }
}

/// A partially specified call, as received from the user.
///
/// Deserialization rejects requests carrying both legacy and dynamic fee fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CallArgsRepr", into = "CallArgsRepr")]
pub struct CallArgs {
    /// Sender. Defaults to the zero address.
    pub from: Option<Address>,
    /// Recipient. `None` creates a contract.
    pub to: Option<Address>,
    /// Gas limit.
    pub gas: Option<u64>,
    /// Fee parameters.
    pub fees: CallFees,
    /// Transferred value.
    pub value: Option<U256>,
    /// Sender nonce.
    pub nonce: Option<u64>,
    /// Payload.
    pub input: CallInput,
    /// Chain id.
    pub chain_id: Option<u64>,
}

impl CallArgs {
    /// Sets the sender.
    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the recipient.
    pub fn with_to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the gas limit.
    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    /// Sets the value.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the fee parameters.
    pub fn with_fees(mut self, fees: CallFees) -> Self {
        self.fees = fees;
        self
    }

    /// Uses legacy pricing with the given gas price.
    pub fn with_gas_price(self, gas_price: U256) -> Self {
        self.with_fees(CallFees::Legacy { gas_price })
    }

    /// Sets the payload under `input`.
    pub fn with_input(mut self, input: impl Into<Bytes>) -> Self {
        self.input = CallInput::new(input.into());
        self
    }

    /// The sender, or the zero address.
    pub fn sender(&self) -> Address {
        self.from.unwrap_or_default()
    }

    /// Builds the canonical message.
    ///
    /// The gas limit defaults to `global_gas_cap` (or [`UNCAPPED_CALL_GAS`] when the cap is zero)
    /// and is clamped to a non-zero cap. `base_fee` is the block base fee when dynamic fees are
    /// active.
    pub fn to_message(
        &self,
        global_gas_cap: u64,
        base_fee: Option<U256>,
        intrinsic_gas: u64,
    ) -> CanonicalMessage {
        let mut gas_limit = self.gas.unwrap_or(if global_gas_cap == 0 {
            UNCAPPED_CALL_GAS
        } else {
            global_gas_cap
        });
        if global_gas_cap != 0 && global_gas_cap < gas_limit {
            tracing::warn!(
                requested = gas_limit,
                cap = global_gas_cap,
                "Caller gas above allowance, capping"
            );
            gas_limit = global_gas_cap;
        }

        CanonicalMessage {
            from: self.sender(),
            to: self.to,
            value: self.value.unwrap_or_default(),
            gas_limit,
            gas_price: self.fees.effective_gas_price(base_fee),
            input: self.input.bytes().cloned().unwrap_or_default(),
            intrinsic_gas,
        }
    }
}

/// The only input accepted by an execution engine. Built fresh per execution and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    from: Address,
    to: Option<Address>,
    value: U256,
    gas_limit: u64,
    gas_price: U256,
    input: Bytes,
    intrinsic_gas: u64,
}

impl CanonicalMessage {
    /// Sender.
    pub const fn sender(&self) -> Address {
        self.from
    }

    /// Recipient, `None` for creation.
    pub const fn to(&self) -> Option<Address> {
        self.to
    }

    /// Call or create.
    pub fn kind(&self) -> TxKind {
        self.to.map_or(TxKind::Create, TxKind::Call)
    }

    /// Transferred value.
    pub const fn value(&self) -> U256 {
        self.value
    }

    /// Gas limit.
    pub const fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Effective price per unit of gas.
    pub const fn gas_price(&self) -> U256 {
        self.gas_price
    }

    /// Payload.
    pub const fn input(&self) -> &Bytes {
        &self.input
    }

    /// Precomputed intrinsic gas.
    pub const fn intrinsic_gas(&self) -> u64 {
        self.intrinsic_gas
    }
}

/// Wire shape of [`CallArgs`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallArgsRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_priority_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    nonce: Option<u64>,
    #[serde(flatten)]
    input: CallInput,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    chain_id: Option<u64>,
}

impl TryFrom<CallArgsRepr> for CallArgs {
    type Error = ArgsError;

    fn try_from(repr: CallArgsRepr) -> Result<Self, Self::Error> {
        Ok(Self {
            from: repr.from,
            to: repr.to,
            gas: repr.gas,
            fees: CallFees::from_parts(
                repr.gas_price,
                repr.max_fee_per_gas,
                repr.max_priority_fee_per_gas,
            )?,
            value: repr.value,
            nonce: repr.nonce,
            input: repr.input,
            chain_id: repr.chain_id,
        })
    }
}

impl From<CallArgs> for CallArgsRepr {
    fn from(args: CallArgs) -> Self {
        Self {
            from: args.from,
            to: args.to,
            gas: args.gas,
            gas_price: args.fees.gas_price(),
            max_fee_per_gas: args.fees.max_fee_per_gas(),
            max_priority_fee_per_gas: args.fees.max_priority_fee_per_gas(),
            value: args.value,
            nonce: args.nonce,
            input: args.input,
            chain_id: args.chain_id,
        }
    }
}
