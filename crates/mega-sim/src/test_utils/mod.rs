//! Helpers for building contracts and fixtures in tests.

mod bytes;
mod opcode_gen;

pub use bytes::*;
pub use opcode_gen::*;
