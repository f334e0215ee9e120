//! # encode_tuple
//!
//! Builds decoded values by hand, ABI-encodes them as calldata for
//! `transfer(address,uint256)` and `setName(string)`, then decodes the
//! calldata again against the token's JSON ABI.
//!
//! Run with:
//! ```sh
//! cargo run --bin encode_tuple
//! ```

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, U256};
use anyhow::{anyhow, Result};
use statecodec_allocate::{Allocations, ContractAllocationInfo};
use statecodec_core::context::{Context, Contexts};
use statecodec_core::conversion::selector;
use statecodec_core::definitions::UserDefinedTypes;
use statecodec_core::types::{ContractKind, Type};
use statecodec_core::values::{Decoded, StringValue, Value};
use statecodec_decode::{DecoderOptions, Decoding, DecodingInfo, DefaultingProvider, EvmState};
use statecodec_encode::{encode_tuple, encode_with_selector};
use statecodec_observability::{init_tracing, LogConfig};

const TOKEN_ABI: &str = r#"[
  {"type":"function","name":"transfer","stateMutability":"nonpayable",
   "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
   "outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"setName","stateMutability":"nonpayable",
   "inputs":[{"name":"name","type":"string"}],"outputs":[]}
]"#;

fn hex_words(data: &[u8]) -> String {
    data.chunks(32).map(hex::encode).collect::<Vec<_>>().join("\n    ")
}

fn main() -> Result<()> {
    init_tracing(&LogConfig::default())?;

    // ── 1. Values ────────────────────────────────────────────────────────────
    let recipient = Address::repeat_byte(0xb0);
    let to = Decoded::value(Type::address(), Value::Address(recipient));
    let amount = Decoded::value(Type::uint256(), Value::Uint(U256::from(1_000_000u64)));
    let name = Decoded::value(
        Type::string(),
        Value::String(StringValue::from_bytes(b"StateCodec Token".to_vec())),
    );

    // ── 2. Encode ────────────────────────────────────────────────────────────
    let allocations = Allocations::default();
    let transfer = encode_with_selector(
        selector("transfer(address,uint256)"),
        &[to, amount],
        &allocations.abi,
    )
    .ok_or_else(|| anyhow!("transfer arguments have no ABI encoding"))?;
    println!(
        "✓ transfer calldata ({} bytes):\n    {}",
        transfer.len(),
        hex::encode(&transfer[..4])
    );
    println!("    {}", hex_words(&transfer[4..]));

    let set_name =
        encode_with_selector(selector("setName(string)"), &[name.clone()], &allocations.abi)
            .ok_or_else(|| anyhow!("setName arguments have no ABI encoding"))?;
    let bare = encode_tuple(&[name], &allocations.abi).ok_or_else(|| anyhow!("unencodable"))?;
    println!(
        "✓ setName calldata ({} bytes), tuple body:\n    {}",
        set_name.len(),
        hex_words(&bare)
    );

    // ── 3. Decode against the ABI ────────────────────────────────────────────
    let abi: JsonAbi = serde_json::from_str(TOKEN_ABI)?;
    let code = vec![0x60, 0x80, 0x60, 0x40, 0x52, 0x00];
    let mut contexts = Contexts::new();
    let deployed =
        contexts.insert(Context::new("Token", ContractKind::Contract, false, code, vec![]));
    let contract = ContractAllocationInfo {
        contract_name: "Token".into(),
        contract_kind: ContractKind::Contract,
        abi,
        deployed_context: Some(deployed),
        constructor_context: None,
        definition_id: None,
    };
    let allocations = Allocations::from_abis(&[contract])?;
    let types = UserDefinedTypes::new();
    let info = DecodingInfo::new(&types, &allocations, &contexts).in_context(deployed);

    for calldata in [transfer, set_name] {
        let state = EvmState {
            calldata: Bytes::from(calldata),
            ..EvmState::default()
        };
        let decoded = Decoding::calldata(info, &state, DecoderOptions::default())
            .drive(&mut DefaultingProvider::new())?;

        println!("✓ {}", serde_json::to_string(&decoded)?);
        for argument in decoded.arguments() {
            println!("    {} = {}", argument.name, argument.value);
        }
    }
    Ok(())
}
