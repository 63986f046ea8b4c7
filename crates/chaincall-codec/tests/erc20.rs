//! Golden ERC-20 vectors for the ABI codec.

use alloy_json_abi::JsonAbi;
use alloy_primitives::{address, Address, U256};
use chaincall_codec::AbiCodec;
use chaincall_core::{Codec, DecodingError, EncodingError, Value};

const ERC20_ABI: &str = r#"[
    {"type":"function","name":"balanceOf","stateMutability":"view",
     "inputs":[{"name":"owner","type":"address"}],
     "outputs":[{"name":"","type":"uint256"}]},
    {"type":"function","name":"transfer","stateMutability":"nonpayable",
     "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
     "outputs":[{"name":"","type":"bool"}]},
    {"type":"function","name":"decimals","stateMutability":"view",
     "inputs":[],"outputs":[{"name":"","type":"uint8"}]},
    {"type":"function","name":"symbol","stateMutability":"view",
     "inputs":[],"outputs":[{"name":"","type":"string"}]}
]"#;

const VITALIK: Address = address!("d8dA6BF26964aF9D7eEd9e03E53415D37aA96045");

fn erc20() -> JsonAbi {
    serde_json::from_str(ERC20_ABI).unwrap()
}

#[test]
fn balance_of_calldata() {
    let data = AbiCodec
        .encode(&erc20(), "balanceOf", &[Value::Address(VITALIK)])
        .unwrap();
    assert_eq!(
        hex::encode(&data),
        "70a08231000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045"
    );
}

#[test]
fn transfer_calldata() {
    let data = AbiCodec
        .encode(
            &erc20(),
            "transfer(address,uint256)",
            &[Value::Address(VITALIK), Value::uint(1_000_000)],
        )
        .unwrap();
    assert_eq!(&data[..4], &hex::decode("a9059cbb").unwrap()[..]);
    assert_eq!(data.len(), 4 + 64);
    assert_eq!(U256::from_be_slice(&data[36..68]), U256::from(1_000_000u64));
}

#[test]
fn balance_of_return_values() {
    let mut word = [0u8; 32];
    word[31] = 100;
    let out = AbiCodec.decode(&erc20(), "balanceOf", &word).unwrap();
    assert_eq!(out, vec![Value::uint(100)]);

    let out = AbiCodec.decode(&erc20(), "balanceOf", &[0u8; 32]).unwrap();
    assert_eq!(out, vec![Value::uint(0)]);
}

#[test]
fn symbol_return_value() {
    let raw = hex::decode(concat!(
        "0000000000000000000000000000000000000000000000000000000000000020",
        "0000000000000000000000000000000000000000000000000000000000000004",
        "5553444300000000000000000000000000000000000000000000000000000000",
    ))
    .unwrap();
    let out = AbiCodec.decode(&erc20(), "symbol", &raw).unwrap();
    assert_eq!(out, vec![Value::Str("USDC".into())]);
}

#[test]
fn uint8_width_is_checked() {
    let abi: JsonAbi = serde_json::from_str(
        r#"[{"type":"function","name":"setDecimals","stateMutability":"nonpayable",
             "inputs":[{"name":"d","type":"uint8"}],"outputs":[]}]"#,
    )
    .unwrap();
    let err = AbiCodec
        .encode(&abi, "setDecimals", &[Value::uint(300)])
        .unwrap_err();
    assert!(matches!(err, EncodingError::TypeMismatch { index: 0, .. }));
}

#[test]
fn wrong_argument_kind() {
    let err = AbiCodec
        .encode(&erc20(), "balanceOf", &[Value::Bool(true)])
        .unwrap_err();
    assert!(err.to_string().contains("cannot convert bool to address"));
}

#[test]
fn empty_return_is_not_zero() {
    let err = AbiCodec.decode(&erc20(), "decimals", &[]).unwrap_err();
    assert!(matches!(err, DecodingError::Empty { .. }));
}

#[test]
fn revert_reason_is_described() {
    let data = hex::decode(concat!(
        "08c379a0",
        "0000000000000000000000000000000000000000000000000000000000000020",
        "000000000000000000000000000000000000000000000000000000000000001a",
        "45524332303a207472616e7366657220616d6f756e7420657863000000000000",
    ))
    .unwrap();
    let msg = AbiCodec.describe_revert(&erc20(), &data).unwrap();
    assert_eq!(msg, "execution reverted: ERC20: transfer amount exc");
}
