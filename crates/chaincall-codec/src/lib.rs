//! chaincall-codec — EVM ABI codec for ChainCall.
//!
//! Implements the [`chaincall_core::Codec`] trait on top of `alloy-dyn-abi`:
//! - calldata encoding with per-parameter width and length checks
//! - return-data decoding into [`chaincall_core::Value`]
//! - revert payload rendering (`Error(string)`, `Panic(uint256)`, custom errors)

pub mod codec;
pub mod convert;
pub mod revert;

pub use codec::{find_function, AbiCodec};
pub use convert::{from_dyn_value, to_dyn_value};
