//! Intrinsic gas calculation.

use crate::{
    constants::{
        INIT_CODE_WORD_GAS, TX_DATA_NON_ZERO_GAS_EIP2028, TX_DATA_NON_ZERO_GAS_FRONTIER,
        TX_DATA_ZERO_GAS, TX_GAS, TX_GAS_CONTRACT_CREATION,
    },
    Rules, SimError,
};

/// Computes the gas a message is charged before execution starts, given its payload and whether
/// it creates a contract.
pub fn intrinsic_gas(data: &[u8], is_create: bool, rules: &Rules) -> Result<u64, SimError> {
    let mut gas = if is_create { TX_GAS_CONTRACT_CREATION } else { TX_GAS };
    if data.is_empty() {
        return Ok(gas);
    }

    let non_zero = data.iter().filter(|byte| **byte != 0).count() as u64;
    let zero = data.len() as u64 - non_zero;
    let non_zero_gas = if rules.is_istanbul {
        TX_DATA_NON_ZERO_GAS_EIP2028
    } else {
        TX_DATA_NON_ZERO_GAS_FRONTIER
    };

    let non_zero_cost = non_zero.checked_mul(non_zero_gas).ok_or(SimError::GasUintOverflow)?;
    let zero_cost = zero.checked_mul(TX_DATA_ZERO_GAS).ok_or(SimError::GasUintOverflow)?;
    gas = gas
        .checked_add(non_zero_cost)
        .and_then(|gas| gas.checked_add(zero_cost))
        .ok_or(SimError::GasUintOverflow)?;

    if is_create && rules.is_shanghai {
        let words = (data.len() as u64).div_ceil(32);
        let init_code_cost =
            words.checked_mul(INIT_CODE_WORD_GAS).ok_or(SimError::GasUintOverflow)?;
        gas = gas.checked_add(init_code_cost).ok_or(SimError::GasUintOverflow)?;
    }

    Ok(gas)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const ISTANBUL: Rules =
        Rules { is_istanbul: true, is_london: false, is_shanghai: false, is_cancun: false };
    const SHANGHAI: Rules =
        Rules { is_istanbul: true, is_london: true, is_shanghai: true, is_cancun: false };

    #[rstest]
    #[case::empty_call(&[], false, Rules::default(), 21_000)]
    #[case::empty_create(&[], true, Rules::default(), 53_000)]
    #[case::frontier_bytes(&[0, 1, 2], false, Rules::default(), 21_000 + 4 + 68 * 2)]
    #[case::istanbul_bytes(&[0, 1, 2], false, ISTANBUL, 21_000 + 4 + 16 * 2)]
    #[case::shanghai_init_code(&[1; 33], true, SHANGHAI, 53_000 + 16 * 33 + 2 * 2)]
    #[case::pre_shanghai_init_code(&[1; 33], true, ISTANBUL, 53_000 + 16 * 33)]
    fn test_intrinsic_gas(
        #[case] data: &[u8],
        #[case] is_create: bool,
        #[case] rules: Rules,
        #[case] expected: u64,
    ) {
        assert_eq!(intrinsic_gas(data, is_create, &rules).unwrap(), expected);
    }
}
