//! A small assembler for test contracts.

use alloy_primitives::{Bytes, U256};
use revm::bytecode::opcode::{
    JUMP, JUMPDEST, MSTORE, PUSH0, RETURN, REVERT, SLOAD, SSTORE, STOP,
};

use crate::test_utils::right_pad_bytes;

/// Builder for EVM bytecode.
#[derive(Debug, Default)]
pub struct BytecodeBuilder {
    code: Vec<u8>,
}

impl BytecodeBuilder {
    /// Finishes the bytecode.
    pub fn build(self) -> Bytes {
        self.code.into()
    }

    /// Current length, i.e. the offset of the next opcode.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Returns `true` if nothing was emitted yet.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Appends a raw opcode or byte.
    pub fn append(mut self, opcode: u8) -> Self {
        self.code.push(opcode);
        self
    }

    /// Appends raw opcodes or bytes.
    pub fn append_many(mut self, items: impl IntoIterator<Item = u8>) -> Self {
        self.code.extend(items);
        self
    }

    /// Pushes up to 32 bytes with the shortest `PUSHn`.
    pub fn push_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        assert!(bytes.len() <= 32, "cannot push more than 32 bytes");
        self.code.push(PUSH0 + bytes.len() as u8);
        self.code.extend_from_slice(bytes);
        self
    }

    /// Pushes `number` without leading zero bytes. Zero is pushed with `PUSH0`.
    pub fn push_number(self, number: u64) -> Self {
        let bytes = number.to_be_bytes();
        let start = bytes.iter().position(|byte| *byte != 0).unwrap_or(bytes.len());
        self.push_bytes(&bytes[start..])
    }

    /// Pushes a full 32-byte word.
    pub fn push_u256(self, value: U256) -> Self {
        self.push_bytes(value.to_be_bytes::<32>())
    }

    /// Writes `bytes` to memory at `offset`, one 32-byte word at a time.
    pub fn mstore(mut self, offset: usize, bytes: impl AsRef<[u8]>) -> Self {
        for (i, word) in right_pad_bytes(bytes, 32).chunks(32).enumerate() {
            self = self.push_bytes(word).push_number((offset + i * 32) as u64).append(MSTORE);
        }
        self
    }

    /// Stores `value` at `slot`.
    pub fn sstore(self, slot: u64, value: U256) -> Self {
        self.push_u256(value).push_number(slot).append(SSTORE)
    }

    /// Loads `slot` onto the stack.
    pub fn sload(self, slot: u64) -> Self {
        self.push_number(slot).append(SLOAD)
    }

    /// Stops execution.
    pub fn stop(self) -> Self {
        self.append(STOP)
    }

    /// Returns `data`.
    pub fn return_with_data(self, data: impl AsRef<[u8]>) -> Self {
        let len = data.as_ref().len() as u64;
        self.mstore(0, data).push_number(len).push_number(0).append(RETURN)
    }

    /// Reverts with empty data.
    pub fn revert(self) -> Self {
        self.append_many([PUSH0, PUSH0, REVERT])
    }

    /// Reverts with `data`.
    pub fn revert_with_data(self, data: impl AsRef<[u8]>) -> Self {
        let len = data.as_ref().len() as u64;
        self.mstore(0, data).push_number(len).push_number(0).append(REVERT)
    }

    /// Jumps back to the current offset forever.
    pub fn infinite_loop(self) -> Self {
        let target = self.len() as u64;
        self.append(JUMPDEST).push_number(target).append(JUMP)
    }
}
