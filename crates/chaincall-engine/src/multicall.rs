//! Multicall3 bindings.
//!
//! Only `tryBlockAndAggregate` is used: it reports the block the batch was
//! evaluated at together with a per-call success flag, which is exactly what
//! a [`BatchResult`] needs.

use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};
use chaincall_core::{BatchResult, BlockHeight, EncodedCall, RawCallResult, TransportError};

// From https://github.com/mds1/multicall
sol! {
    interface IMulticall3 {
        struct Call {
            address target;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function tryBlockAndAggregate(bool requireSuccess, Call[] calldata calls)
            external
            payable
            returns (uint256 blockNumber, bytes32 blockHash, Result[] memory returnData);
    }
}

/// Call-data for `tryBlockAndAggregate(requireSuccess, calls)`.
pub fn encode_aggregate(calls: &[EncodedCall], require_success: bool) -> Bytes {
    let calls = calls
        .iter()
        .map(|c| IMulticall3::Call {
            target: c.target,
            callData: c.data.clone(),
        })
        .collect();
    IMulticall3::tryBlockAndAggregateCall {
        requireSuccess: require_success,
        calls,
    }
    .abi_encode()
    .into()
}

/// Decode `tryBlockAndAggregate` return data, checking it holds exactly
/// `expected` results.
pub fn decode_aggregate(data: &[u8], expected: usize) -> Result<BatchResult, TransportError> {
    let ret = IMulticall3::tryBlockAndAggregateCall::abi_decode_returns(data, true)
        .map_err(|e| TransportError::Malformed(format!("tryBlockAndAggregate returns: {e}")))?;

    if ret.returnData.len() != expected {
        return Err(TransportError::LengthMismatch {
            expected,
            got: ret.returnData.len(),
        });
    }

    let block_number = u64::try_from(ret.blockNumber).map_err(|_| {
        TransportError::Malformed(format!("block number {} out of range", ret.blockNumber))
    })?;

    let results = ret
        .returnData
        .into_iter()
        .map(|r| RawCallResult {
            success: r.success,
            return_data: r.returnData,
        })
        .collect();

    Ok(BatchResult {
        block_number,
        results,
    })
}

/// Return data a Multicall3 deployment would produce for `results` at `block`.
///
/// Used by in-process nodes in tests and local tooling.
pub fn encode_aggregate_return(block: BlockHeight, results: &[RawCallResult]) -> Bytes {
    let return_data: Vec<IMulticall3::Result> = results
        .iter()
        .map(|r| IMulticall3::Result {
            success: r.success,
            returnData: r.return_data.clone(),
        })
        .collect();
    IMulticall3::tryBlockAndAggregateCall::abi_encode_returns(&(
        U256::from(block),
        B256::ZERO,
        return_data,
    ))
    .into()
}
