//! ABI head/tail encoding of decoded values.

use alloy_primitives::U256;
use tracing::trace;

use statecodec_allocate::{abi_size_info, AbiAllocations};
use statecodec_core::conversion::{
    i256_to_word, pad_left, pad_right_to_multiple, u256_to_word, WORD_SIZE,
};
use statecodec_core::types::{ArrayLength, Type};
use statecodec_core::values::{Decoded, ExternalFunctionValue, Value};

/// ABI encoding of one value, or `None` if it has none: errors, mappings,
/// internal functions, magic values and circular markers.
pub fn encode_value(value: &Decoded, allocations: &AbiAllocations) -> Option<Vec<u8>> {
    let Decoded::Value { ty, value } = value else {
        return None;
    };
    let bytes = match value {
        Value::Bool(b) => u256_to_word(U256::from(u8::from(*b))).to_vec(),
        Value::Uint(v) | Value::Ufixed(v) => u256_to_word(*v).to_vec(),
        Value::Int(v) | Value::Fixed(v) => i256_to_word(*v).to_vec(),
        Value::Enum { index, .. } => u256_to_word(U256::from(*index)).to_vec(),
        Value::Address(a) => pad_left(a.as_slice(), WORD_SIZE),
        Value::Contract(c) => pad_left(c.address().as_slice(), WORD_SIZE),
        Value::FixedBytes(b) => {
            if b.len() > WORD_SIZE {
                return None;
            }
            let mut word = b.clone();
            word.resize(WORD_SIZE, 0);
            word
        }
        Value::Bytes(b) => encode_bytes(b),
        Value::String(s) => encode_bytes(s.as_bytes()),
        Value::FunctionExternal(f) => external_function_word(f).to_vec(),
        Value::Array(items) => {
            let elements = encode_tuple(items, allocations)?;
            match ty {
                Type::Array(a) if a.length == ArrayLength::Dynamic => {
                    let mut out = u256_to_word(U256::from(items.len())).to_vec();
                    out.extend(elements);
                    out
                }
                _ => elements,
            }
        }
        Value::Struct(members) | Value::Tuple(members) => {
            let values: Vec<Decoded> = members.iter().map(|m| m.value.clone()).collect();
            encode_tuple(&values, allocations)?
        }
        Value::Mapping(_)
        | Value::FunctionInternal(_)
        | Value::Magic(_)
        | Value::Circular { .. } => {
            trace!(ty = %ty, "value has no ABI encoding");
            return None;
        }
    };
    Some(bytes)
}

/// Length word followed by the content right-padded to whole words.
fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    let mut out = u256_to_word(U256::from(bytes.len())).to_vec();
    out.extend(pad_right_to_multiple(bytes, WORD_SIZE));
    out
}

/// Address then selector, right-padded.
fn external_function_word(f: &ExternalFunctionValue) -> [u8; WORD_SIZE] {
    let mut word = [0u8; WORD_SIZE];
    word[..20].copy_from_slice(f.contract().address().as_slice());
    word[20..24].copy_from_slice(&f.selector());
    word
}

/// Encode values as a tuple: static values and offsets in the head, dynamic
/// encodings in the tail in element order. Fails if any element fails.
pub fn encode_tuple(values: &[Decoded], allocations: &AbiAllocations) -> Option<Vec<u8>> {
    let mut parts = Vec::with_capacity(values.len());
    for value in values {
        let info = abi_size_info(value.ty(), allocations)?;
        let encoded = encode_value(value, allocations)?;
        parts.push((info, encoded));
    }
    let head_size: u64 = parts.iter().map(|(info, _)| info.size).sum();

    let mut head = Vec::with_capacity(head_size as usize);
    let mut tail = Vec::new();
    let mut next_offset = head_size;
    for (info, encoded) in parts {
        if info.dynamic {
            head.extend(u256_to_word(U256::from(next_offset)));
            next_offset += encoded.len() as u64;
            tail.extend(encoded);
        } else {
            head.extend(encoded);
        }
    }
    head.extend(tail);
    Some(head)
}

/// A 4-byte selector followed by the encoded arguments.
pub fn encode_with_selector(
    selector: [u8; 4],
    values: &[Decoded],
    allocations: &AbiAllocations,
) -> Option<Vec<u8>> {
    let mut out = selector.to_vec();
    out.extend(encode_tuple(values, allocations)?);
    Some(out)
}
