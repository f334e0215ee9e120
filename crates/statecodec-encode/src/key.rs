//! Storage mapping keys.
//!
//! A mapping's value for `key` lives at `keccak256(preimage(key) ++ slot)`,
//! where the preimage is the key's padded word for value types and its raw
//! bytes for `string` and `bytes`.

use alloy_primitives::U256;

use statecodec_core::conversion::{i256_to_word, keccak256_u256, pad_left, u256_to_word, WORD_SIZE};
use statecodec_core::values::{Decoded, Value};

/// Preimage of a mapping key, or `None` for values that cannot be keys.
pub fn encode_mapping_key(key: &Decoded) -> Option<Vec<u8>> {
    let Decoded::Value { value, .. } = key else {
        return None;
    };
    let out = match value {
        Value::Bool(b) => u256_to_word(U256::from(u8::from(*b))).to_vec(),
        Value::Uint(v) | Value::Ufixed(v) => u256_to_word(*v).to_vec(),
        Value::Int(v) | Value::Fixed(v) => i256_to_word(*v).to_vec(),
        Value::Enum { index, .. } => u256_to_word(U256::from(*index)).to_vec(),
        Value::Address(a) => pad_left(a.as_slice(), WORD_SIZE),
        Value::Contract(c) => pad_left(c.address().as_slice(), WORD_SIZE),
        Value::FixedBytes(b) if b.len() <= WORD_SIZE => {
            let mut word = b.clone();
            word.resize(WORD_SIZE, 0);
            word
        }
        Value::Bytes(b) => b.clone(),
        Value::String(s) => s.as_bytes().to_vec(),
        _ => return None,
    };
    Some(out)
}

/// Slot holding the value for `key` in the mapping at `slot`.
pub fn mapping_value_slot(key: &Decoded, slot: U256) -> Option<U256> {
    let mut preimage = encode_mapping_key(key)?;
    preimage.extend(u256_to_word(slot));
    Some(keccak256_u256(&preimage))
}
