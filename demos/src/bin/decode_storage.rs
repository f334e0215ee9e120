//! # decode_storage
//!
//! Decodes every state variable of a small vault contract from its solc AST,
//! answering storage requests from an in-memory "node" and printing each
//! request as it is made.
//!
//! Run with:
//! ```sh
//! cargo run --bin decode_storage
//! ```

use alloy_primitives::{Address, U256};
use anyhow::{anyhow, Result};
use statecodec_allocate::Allocations;
use statecodec_core::ast::translate_json;
use statecodec_core::context::Contexts;
use statecodec_core::conversion::{keccak256_u256, u256_to_word, ZERO_WORD};
use statecodec_core::types::{Type, TypeId};
use statecodec_core::values::{Decoded, Value};
use statecodec_core::CodecConfig;
use statecodec_decode::{
    DecoderOptions, DecoderRequest, Decoding, DecodingInfo, DefaultingProvider, EvmState, Step,
};
use statecodec_encode::mapping_value_slot;
use statecodec_observability::{init_tracing, LogConfig};

const VAULT_AST: &str = r#"{
  "nodeType": "SourceUnit", "id": 1, "absolutePath": "Vault.sol",
  "nodes": [
    { "nodeType": "ContractDefinition", "id": 2, "name": "Vault",
      "contractKind": "contract", "linearizedBaseContracts": [2],
      "nodes": [
        { "nodeType": "EnumDefinition", "id": 3, "name": "Status",
          "members": [{"name": "Open"}, {"name": "Paused"}, {"name": "Closed"}] },
        { "nodeType": "VariableDeclaration", "id": 4, "name": "status", "stateVariable": true,
          "typeName": { "nodeType": "UserDefinedTypeName", "referencedDeclaration": 3 } },
        { "nodeType": "VariableDeclaration", "id": 5, "name": "owner", "stateVariable": true,
          "typeName": { "nodeType": "ElementaryTypeName", "name": "address" } },
        { "nodeType": "VariableDeclaration", "id": 6, "name": "label", "stateVariable": true,
          "typeName": { "nodeType": "ElementaryTypeName", "name": "string" } },
        { "nodeType": "VariableDeclaration", "id": 7, "name": "balances", "stateVariable": true,
          "typeName": { "nodeType": "Mapping",
            "keyType": { "nodeType": "ElementaryTypeName", "name": "address" },
            "valueType": { "nodeType": "ElementaryTypeName", "name": "uint256" } } },
        { "nodeType": "VariableDeclaration", "id": 8, "name": "FEE", "stateVariable": true,
          "constant": true, "mutability": "constant",
          "typeName": { "nodeType": "ElementaryTypeName", "name": "uint256" } }
      ] }
  ]
}"#;

const LABEL: &str = "community treasury, multisig controlled";

fn main() -> Result<()> {
    init_tracing(&LogConfig::default().with_component("statecodec-decode", "debug"))?;

    // ── 1. Definitions and allocation tables ─────────────────────────────────
    let types = translate_json("vault", VAULT_AST)?;
    let allocations = Allocations::build(&types, &[])?;
    let contexts = Contexts::new();
    let info = DecodingInfo::new(&types, &allocations, &contexts);
    let vault = TypeId::ast("vault", 2);
    println!(
        "✓ Translated {} definitions, {} storage layouts",
        types.len(),
        allocations.storage.len()
    );

    // ── 2. What the "node" holds ─────────────────────────────────────────────
    // slot 0: status (1 byte) packed below owner (20 bytes)
    let owner = Address::repeat_byte(0x5e);
    let holder = Address::repeat_byte(0xa1);
    let mut packed = ZERO_WORD;
    packed[31] = 1;
    packed[11..31].copy_from_slice(owner.as_slice());

    let mut node = DefaultingProvider::new()
        .with_storage(U256::ZERO, packed)
        .with_storage(U256::from(1), u256_to_word(U256::from(LABEL.len() * 2 + 1)));
    let label_start = keccak256_u256(&u256_to_word(U256::from(1)));
    for (i, chunk) in LABEL.as_bytes().chunks(32).enumerate() {
        let mut word = ZERO_WORD;
        word[..chunk.len()].copy_from_slice(chunk);
        node.insert_storage(label_start + U256::from(i), word);
    }
    let key = Decoded::value(Type::address(), Value::Address(holder));
    let balance_slot =
        mapping_value_slot(&key, U256::from(2)).ok_or_else(|| anyhow!("unencodable key"))?;
    node.insert_storage(balance_slot, u256_to_word(U256::from(42_000_000u64)));

    // ── 3. Decode, answering requests one at a time ──────────────────────────
    // the snapshot carries the mapping keys we want to see
    let state = EvmState::new().with_mapping_key(U256::from(2), key);
    let options = DecoderOptions::from(&CodecConfig::default());
    let mut decoding = Decoding::state_variables(info, &state, vault, options);
    let mut response = None;
    let variables = loop {
        match decoding.advance(response.take())? {
            Step::Done(result) => break result?,
            Step::Request(request) => {
                match &request {
                    DecoderRequest::Storage { slot } => {
                        println!("  → node: storage slot {slot:#x}")
                    }
                    DecoderRequest::Code { address } => println!("  → node: code at {address}"),
                }
                response = Some(node.lookup(&request));
            }
        }
    };
    println!(
        "✓ Decoded {} variables after {} requests",
        variables.len(),
        decoding.session().len()
    );

    // ── 4. Results ───────────────────────────────────────────────────────────
    for variable in &variables {
        println!("  {:<10} = {}", variable.name, variable.value);
    }
    println!("{}", serde_json::to_string_pretty(&variables)?);
    Ok(())
}
