//! Primitive conversions between raw EVM bytes and typed numbers.
//!
//! Everything the decoder reads arrives as big-endian byte strings; everything
//! the encoder writes leaves as one. These helpers are the only place where
//! that translation happens.

use alloy_primitives::{Address, B256, I256, U256};
use tiny_keccak::{Hasher, Keccak};

/// Size of an EVM word in bytes.
pub const WORD_SIZE: usize = 32;
/// Size of an address in bytes.
pub const ADDRESS_SIZE: usize = 20;
/// Size of a function selector in bytes.
pub const SELECTOR_SIZE: usize = 4;
/// Size of a program counter inside an internal function pointer.
pub const PC_SIZE: usize = 4;

/// One 32-byte EVM word.
pub type Word = [u8; WORD_SIZE];

/// The all-zero word, returned by convention for unknown storage.
pub const ZERO_WORD: Word = [0u8; WORD_SIZE];

/// Interpret up to 32 big-endian bytes as an unsigned integer.
///
/// Longer inputs keep only their trailing 32 bytes.
pub fn to_u256(bytes: &[u8]) -> U256 {
    let start = bytes.len().saturating_sub(WORD_SIZE);
    U256::from_be_slice(&bytes[start..])
}

/// Interpret big-endian bytes as a two's-complement signed integer of
/// `bytes.len()` bytes, sign-extending to 256 bits.
pub fn to_signed(bytes: &[u8]) -> I256 {
    let start = bytes.len().saturating_sub(WORD_SIZE);
    let bytes = &bytes[start..];
    let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);
    let mut word = if negative { [0xffu8; WORD_SIZE] } else { ZERO_WORD };
    word[WORD_SIZE - bytes.len()..].copy_from_slice(bytes);
    I256::from_raw(U256::from_be_bytes(word))
}

/// Big-endian word for an unsigned value.
pub fn u256_to_word(value: U256) -> Word {
    value.to_be_bytes::<WORD_SIZE>()
}

/// Two's-complement word for a signed value.
pub fn i256_to_word(value: I256) -> Word {
    value.into_raw().to_be_bytes::<WORD_SIZE>()
}

/// The trailing `length` bytes of a value's big-endian word.
pub fn to_bytes(value: U256, length: usize) -> Vec<u8> {
    let word = u256_to_word(value);
    let length = length.min(WORD_SIZE);
    word[WORD_SIZE - length..].to_vec()
}

/// Narrow to `u64`, or `None` if the value does not fit.
pub fn u256_to_u64(value: U256) -> Option<u64> {
    u64::try_from(value).ok()
}

/// Address held in the trailing 20 bytes of `bytes`.
pub fn to_address(bytes: &[u8]) -> Address {
    let mut raw = [0u8; ADDRESS_SIZE];
    let tail = &bytes[bytes.len().saturating_sub(ADDRESS_SIZE)..];
    raw[ADDRESS_SIZE - tail.len()..].copy_from_slice(tail);
    Address::from(raw)
}

/// EIP-55 checksummed form of an address.
pub fn checksum(address: &Address) -> String {
    address.to_checksum(None)
}

/// keccak256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    B256::from(output)
}

/// keccak256 of arbitrary bytes, read back as a slot number.
pub fn keccak256_u256(data: &[u8]) -> U256 {
    U256::from_be_bytes(keccak256(data).0)
}

/// First four bytes of the keccak256 of a signature string.
pub fn selector(signature: &str) -> [u8; SELECTOR_SIZE] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; SELECTOR_SIZE];
    out.copy_from_slice(&hash[..SELECTOR_SIZE]);
    out
}

/// Left-pad `bytes` with zeros to `length` bytes.
pub fn pad_left(bytes: &[u8], length: usize) -> Vec<u8> {
    if bytes.len() >= length {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; length - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

/// Right-pad `bytes` with zeros to the next multiple of `unit` bytes.
pub fn pad_right_to_multiple(bytes: &[u8], unit: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let rem = out.len() % unit;
    if rem != 0 {
        out.resize(out.len() + unit - rem, 0);
    }
    out
}

/// Number of words needed to hold `length` bytes.
pub fn words_for(length: u64) -> u64 {
    length.div_ceil(WORD_SIZE as u64)
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_bytes_sign_extend() {
        assert_eq!(to_signed(&[0xff]), I256::MINUS_ONE);
        assert_eq!(to_signed(&[0x7f]), I256::try_from(127).unwrap());
        assert_eq!(to_signed(&[0xff, 0x00]), I256::try_from(-256).unwrap());
    }

    #[test]
    fn words_roundtrip_through_integers() {
        let v = U256::from(0x1234u64);
        assert_eq!(to_u256(&u256_to_word(v)), v);
        assert_eq!(to_bytes(v, 2), vec![0x12, 0x34]);
        let neg = I256::try_from(-5).unwrap();
        assert_eq!(to_signed(&i256_to_word(neg)), neg);
    }

    #[test]
    fn transfer_selector() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn checksum_matches_eip55() {
        let addr = to_address(
            &hex::decode("000000000000000000000000d8da6bf26964af9d7eed9e03e53415d37aa96045")
                .unwrap(),
        );
        assert_eq!(checksum(&addr), "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
    }

    #[test]
    fn right_padding_to_words() {
        assert_eq!(pad_right_to_multiple(b"hi", 32).len(), 32);
        assert_eq!(pad_right_to_multiple(&[], 32).len(), 0);
        assert_eq!(pad_right_to_multiple(&[1u8; 33], 32).len(), 64);
        assert_eq!(words_for(33), 2);
    }
}
