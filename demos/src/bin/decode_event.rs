//! # decode_event
//!
//! Decodes a batch of ERC-20 logs in parallel. The emitter's code is looked
//! up to pick the right contract; a log no allocation matches decodes to
//! nothing, and a log whose data does not re-encode is discarded.
//!
//! Run with:
//! ```sh
//! cargo run --bin decode_event
//! ```

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, B256, U256};
use anyhow::Result;
use statecodec_allocate::{Allocations, ContractAllocationInfo};
use statecodec_core::context::{Context, Contexts};
use statecodec_core::definitions::UserDefinedTypes;
use statecodec_core::types::ContractKind;
use statecodec_decode::{
    decode_logs_par, DecoderOptions, DecoderRequest, DecodingInfo, DefaultingProvider, EvmState,
    Log,
};
use statecodec_observability::{init_tracing, LogConfig};

const ERC20_ABI: &str = r#"[
  {"type":"event","name":"Transfer","anonymous":false,"inputs":[
    {"name":"from","type":"address","indexed":true},
    {"name":"to","type":"address","indexed":true},
    {"name":"value","type":"uint256","indexed":false}]},
  {"type":"event","name":"Approval","anonymous":false,"inputs":[
    {"name":"owner","type":"address","indexed":true},
    {"name":"spender","type":"address","indexed":true},
    {"name":"value","type":"uint256","indexed":false}]}
]"#;

const TRANSFER: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
const APPROVAL: &str = "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";

fn amount(value: U256) -> Bytes {
    Bytes::from(value.to_be_bytes::<32>().to_vec())
}

fn main() -> Result<()> {
    init_tracing(&LogConfig::default())?;

    // ── 1. One deployed token ────────────────────────────────────────────────
    let usdc = Address::repeat_byte(0xa0);
    let code = vec![0x60, 0x80, 0x60, 0x40, 0x52, 0x36, 0x15];
    let mut contexts = Contexts::new();
    let context = Context::new("StableToken", ContractKind::Contract, false, code.clone(), vec![]);
    let deployed = contexts.insert(context);
    let abi: JsonAbi = serde_json::from_str(ERC20_ABI)?;
    let allocations = Allocations::from_abis(&[ContractAllocationInfo {
        contract_name: "StableToken".into(),
        contract_kind: ContractKind::Contract,
        abi,
        deployed_context: Some(deployed),
        constructor_context: None,
        definition_id: None,
    }])?;
    let types = UserDefinedTypes::new();
    let info = DecodingInfo::new(&types, &allocations, &contexts);
    println!("✓ {} event allocations", allocations.events.len());

    // ── 2. Logs ──────────────────────────────────────────────────────────────
    let alice = Address::repeat_byte(0xa1).into_word();
    let bob = Address::repeat_byte(0xb0).into_word();
    let mut overlong = amount(U256::from(5_000_000u64)).to_vec();
    overlong.extend([0u8; 32]);
    let logs = vec![
        Log {
            address: usdc,
            topics: vec![TRANSFER.parse()?, alice, bob],
            data: amount(U256::from(1_000_000u64)),
        },
        Log {
            address: usdc,
            topics: vec![APPROVAL.parse()?, alice, bob],
            data: amount(U256::MAX),
        },
        // unknown event
        Log {
            address: usdc,
            topics: vec![B256::repeat_byte(0xde)],
            data: Bytes::new(),
        },
        // trailing data: does not re-encode
        Log {
            address: usdc,
            topics: vec![TRANSFER.parse()?, alice, bob],
            data: Bytes::from(overlong),
        },
    ];

    // ── 3. Decode in parallel ────────────────────────────────────────────────
    let node = DefaultingProvider::new().with_code(usdc, code);
    let provider = |request: &DecoderRequest| node.lookup(request);
    let state = EvmState::new();
    let (decoded, failures) =
        decode_logs_par(info, &state, &logs, DecoderOptions::default(), &provider);

    for (idx, decodings) in &decoded {
        if decodings.is_empty() {
            println!("  log {idx}: no decoding");
        }
        for decoding in decodings {
            let arguments: Vec<String> = decoding
                .arguments
                .iter()
                .map(|a| format!("{}={}", a.name, a.value))
                .collect();
            println!(
                "  log {idx}: {}.{}({})",
                decoding.contract_name,
                decoding.name,
                arguments.join(", ")
            );
        }
    }
    for (idx, failure) in &failures {
        println!("  log {idx}: failed: {failure}");
    }
    println!("✓ {} logs, {} failures", decoded.len(), failures.len());
    Ok(())
}
