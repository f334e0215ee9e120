mod common;

use alloy_primitives::{Address, Bytes};

use common::{token_code, word, Chain, Contract, TOKEN_ABI};
use statecodec_core::config::DecodingMode;
use statecodec_core::types::ContractKind;
use statecodec_core::values::Value;
use statecodec_decode::{CalldataDecoding, DecoderOptions, Decoding, DefaultingProvider, EvmState};

const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

fn chain() -> Chain {
    Chain::new(&[Contract::new("Token", ContractKind::Contract, TOKEN_ABI, token_code())])
}

fn state(calldata: Vec<u8>) -> EvmState {
    EvmState {
        calldata: Bytes::from(calldata),
        ..EvmState::default()
    }
}

fn transfer_calldata(to: Address, amount: u64) -> Vec<u8> {
    let mut data = TRANSFER_SELECTOR.to_vec();
    data.extend_from_slice(to.into_word().as_slice());
    data.extend(word(amount));
    data
}

#[test]
fn transfer_call() {
    let chain = chain();
    let to = Address::repeat_byte(0x42);
    let state = state(transfer_calldata(to, 250));
    let info = chain.info().in_context(chain.deployed[0]);

    let decoded = Decoding::calldata(info, &state, DecoderOptions::default())
        .drive(&mut DefaultingProvider::new())
        .unwrap();
    let CalldataDecoding::Function {
        name,
        contract_name,
        selector,
        arguments,
        mode,
    } = &decoded
    else {
        panic!("expected a function call, got {decoded:?}");
    };
    assert_eq!(name, "transfer");
    assert_eq!(contract_name, "Token");
    assert_eq!(*selector, TRANSFER_SELECTOR);
    assert_eq!(*mode, DecodingMode::Abi);
    assert_eq!(arguments[0].name, "to");
    assert_eq!(arguments[0].value.as_value(), Some(&Value::Address(to)));
    assert_eq!(arguments[1].value.to_string(), "250");
}

#[test]
fn string_argument_follows_its_offset() {
    let chain = chain();
    // setName("gm")
    let selector = alloy_primitives::keccak256("setName(string)");
    let mut data = selector[..4].to_vec();
    data.extend(word(32));
    data.extend(word(2));
    let mut content = [0u8; 32];
    content[..2].copy_from_slice(b"gm");
    data.extend(content);
    let state = state(data);

    let decoded = Decoding::calldata(
        chain.info().in_context(chain.deployed[0]),
        &state,
        DecoderOptions::default(),
    )
    .drive(&mut DefaultingProvider::new())
    .unwrap();
    assert_eq!(decoded.arguments().len(), 1);
    assert_eq!(decoded.arguments()[0].value.to_string(), r#""gm""#);
}

#[test]
fn constructor_arguments_follow_the_init_code() {
    let chain = chain();
    let token = Contract::new("Token", ContractKind::Contract, TOKEN_ABI, token_code());
    let mut data = token.init_code();
    data.extend(word(1_000_000));
    let state = state(data);

    let decoded = Decoding::calldata(
        chain.info().in_context(chain.constructors[0]),
        &state,
        DecoderOptions::default(),
    )
    .drive(&mut DefaultingProvider::new())
    .unwrap();
    let CalldataDecoding::Constructor { contract_name, arguments, .. } = &decoded else {
        panic!("expected a constructor, got {decoded:?}");
    };
    assert_eq!(contract_name, "Token");
    assert_eq!(arguments[0].name, "supply");
    assert_eq!(arguments[0].value.to_string(), "1000000");
}

#[test]
fn unknown_selector_is_a_message() {
    let chain = chain();
    let state = state(vec![0xde, 0xad, 0xbe, 0xef, 0x01]);
    let decoded = Decoding::calldata(
        chain.info().in_context(chain.deployed[0]),
        &state,
        DecoderOptions::default(),
    )
    .drive(&mut DefaultingProvider::new())
    .unwrap();
    assert_eq!(
        decoded,
        CalldataDecoding::Message {
            contract_name: "Token".into(),
            data: vec![0xde, 0xad, 0xbe, 0xef, 0x01],
        }
    );
    assert!(decoded.arguments().is_empty());
}

#[test]
fn short_calldata_is_a_message() {
    let chain = chain();
    let state = state(vec![0xa9, 0x05]);
    let decoded = Decoding::calldata(
        chain.info().in_context(chain.deployed[0]),
        &state,
        DecoderOptions::default(),
    )
    .drive(&mut DefaultingProvider::new())
    .unwrap();
    assert!(matches!(decoded, CalldataDecoding::Message { .. }));
}

#[test]
fn no_context_is_unknown() {
    let chain = chain();
    let state = state(transfer_calldata(Address::ZERO, 1));
    let decoded = Decoding::calldata(chain.info(), &state, DecoderOptions::default())
        .drive(&mut DefaultingProvider::new())
        .unwrap();
    assert!(matches!(decoded, CalldataDecoding::Unknown { .. }));
}

#[test]
fn decoding_serializes_with_hex_data() {
    let decoded = CalldataDecoding::Unknown { data: vec![0x01, 0x02] };
    let json = serde_json::to_value(&decoded).unwrap();
    assert_eq!(json["kind"], "unknown");
    assert_eq!(json["data"], "0x0102");
}
