//! Read-only call simulation and gas estimation.
//!
//! Calls run on a private copy of a block's state, optionally patched by per-account overrides,
//! and are never committed. Gas estimation binary-searches the smallest gas limit for which the
//! call succeeds, using the executor as an oracle.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod api;
pub use api::*;

mod args;
pub use args::*;

mod backend;
pub use backend::*;

mod cancel;
pub use cancel::*;

mod config;
pub use config::*;

mod engine;
pub use engine::*;

mod error;
pub use error::*;

mod estimate;
pub use estimate::*;

mod executor;
pub use executor::*;

mod fill;

mod gas;
pub use gas::*;

mod memory;
pub use memory::*;

mod overrides;
pub use overrides::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use alloy_evm;
pub use revm;
