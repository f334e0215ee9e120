//! Snapshots of raw EVM state handed to the decoder.
//!
//! Everything here is plain data and loads straight from JSON. Storage is
//! sparse: a slot missing from the snapshot is requested from the caller
//! rather than assumed to be zero.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use statecodec_core::conversion::Word;
use statecodec_core::values::Decoded;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvironment {
    #[serde(default)]
    pub sender: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvironment {
    #[serde(default)]
    pub origin: Address,
    #[serde(default)]
    pub gasprice: U256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEnvironment {
    #[serde(default)]
    pub coinbase: Address,
    #[serde(default)]
    pub difficulty: U256,
    #[serde(default)]
    pub gaslimit: U256,
    #[serde(default)]
    pub number: U256,
    #[serde(default)]
    pub timestamp: U256,
    #[serde(default)]
    pub chainid: U256,
    #[serde(default)]
    pub basefee: U256,
}

/// Values behind the `msg`, `tx` and `block` pseudo-variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub message: MessageEnvironment,
    #[serde(default)]
    pub transaction: TransactionEnvironment,
    #[serde(default)]
    pub block: BlockEnvironment,
}

/// A key the caller wants looked up in the mapping rooted at `slot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingKey {
    pub slot: U256,
    pub key: Decoded,
}

/// An emitted log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmState {
    /// Known storage words of the contract being decoded.
    #[serde(default)]
    pub storage: BTreeMap<U256, B256>,
    #[serde(default)]
    pub memory: Bytes,
    #[serde(default)]
    pub calldata: Bytes,
    /// Stack words, bottom first.
    #[serde(default)]
    pub stack: Vec<B256>,
    /// Known bytecode by address.
    #[serde(default)]
    pub code: BTreeMap<Address, Bytes>,
    /// Address of the executing contract, used for reads from its code.
    #[serde(default)]
    pub this: Option<Address>,
    #[serde(default)]
    pub environment: Option<Environment>,
    #[serde(default)]
    pub mapping_keys: Vec<MappingKey>,
}

impl EvmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, slot: U256, word: Word) -> Self {
        self.storage.insert(slot, B256::from(word));
        self
    }

    pub fn with_code(mut self, address: Address, code: Vec<u8>) -> Self {
        self.code.insert(address, Bytes::from(code));
        self
    }

    pub fn with_mapping_key(mut self, slot: U256, key: Decoded) -> Self {
        self.mapping_keys.push(MappingKey { slot, key });
        self
    }

    pub fn storage_word(&self, slot: &U256) -> Option<Word> {
        self.storage.get(slot).map(|w| w.0)
    }

    /// Keys registered for the mapping at `slot`, in insertion order.
    pub fn keys_for<'s>(&'s self, slot: &'s U256) -> impl Iterator<Item = &'s Decoded> + 's {
        self.mapping_keys.iter().filter(move |k| k.slot == *slot).map(|k| &k.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_loads_from_json() {
        let json = r#"{
            "storage": {
                "0x0": "0x000000000000000000000000000000000000000000000000000000000000002a"
            },
            "calldata": "0xa9059cbb",
            "stack": ["0x0000000000000000000000000000000000000000000000000000000000000001"],
            "this": "0x1111111111111111111111111111111111111111"
        }"#;
        let state: EvmState = serde_json::from_str(json).unwrap();
        assert_eq!(state.storage_word(&U256::ZERO).unwrap()[31], 42);
        assert_eq!(state.calldata.len(), 4);
        assert_eq!(state.stack.len(), 1);
        assert!(state.environment.is_none());
    }

    #[test]
    fn mapping_keys_filter_by_slot() {
        use statecodec_core::types::Type;
        use statecodec_core::values::Value;
        let key = |n: u64| Decoded::value(Type::uint256(), Value::Uint(U256::from(n)));
        let state = EvmState::new()
            .with_mapping_key(U256::from(1), key(7))
            .with_mapping_key(U256::from(2), key(8))
            .with_mapping_key(U256::from(1), key(9));
        let slot = U256::from(1);
        let keys: Vec<_> = state.keys_for(&slot).collect();
        assert_eq!(keys, vec![&key(7), &key(9)]);
    }
}
