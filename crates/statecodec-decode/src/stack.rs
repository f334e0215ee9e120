//! Stack decoding.
//!
//! Most values take one stack word: the value itself, or a pointer for
//! reference types. External function pointers and calldata slices
//! (`bytes`, `string`, dynamic arrays) take two.

use alloy_primitives::U256;

use statecodec_allocate::{abi_size_info, StorageLength};
use statecodec_core::conversion::{
    to_address, to_u256, Word, ADDRESS_SIZE, SELECTOR_SIZE, WORD_SIZE,
};
use statecodec_core::errors::{FunctionExternalError, ReadError};
use statecodec_core::pointer::{ByteLocation, StorageRange};
use statecodec_core::types::{ArrayLength, Location, Type, Visibility};
use statecodec_core::values::{Decoded, Value};

use crate::basic::bytes_value;
use crate::decoder::{DecodeResult, Decoder};
use crate::error::Interrupt;

impl Decoder<'_> {
    /// Decode stack words `from..=to`, counted from the bottom of the stack.
    pub(crate) fn decode_stack(&mut self, ty: &Type, from: usize, to: usize) -> DecodeResult {
        let state = self.state;
        let words = state.stack.get(from..=to).ok_or_else(|| {
            Interrupt::stop(ReadError::Stack {
                from: from as u64,
                to: to as u64,
            })
        })?;
        match words {
            [word] => self.decode_stack_literal(ty, &word.0),
            [first, second] => self.decode_stack_pair(ty, &first.0, &second.0),
            _ => self.unrepresentable(ty),
        }
    }

    /// Decode a single stack word.
    pub(crate) fn decode_stack_literal(&mut self, ty: &Type, word: &Word) -> DecodeResult {
        if !ty.is_reference() {
            return self.decode_basic(ty, word);
        }
        match ty.location() {
            Some(Location::Memory) => {
                let address = self.pointer(word)?;
                self.decode_memory_reference(ty, address)
            }
            Some(Location::Storage) => {
                let slot = to_u256(word);
                let range = match self.storage_length(ty)? {
                    Some(StorageLength::Words(words)) => StorageRange::words(slot, words),
                    _ => StorageRange::word(slot),
                };
                self.decode_storage(ty, range)
            }
            Some(Location::Calldata) => {
                let offset = self.pointer(word)?;
                self.decode_abi_reference(ty, ByteLocation::Calldata, offset)
            }
            None => self.unrepresentable(ty),
        }
    }

    fn decode_stack_pair(&mut self, ty: &Type, first: &Word, second: &Word) -> DecodeResult {
        match ty {
            Type::Function(f) if f.visibility == Visibility::External => {
                let address_ok = first[..WORD_SIZE - ADDRESS_SIZE].iter().all(|b| *b == 0);
                let selector_ok = second[..WORD_SIZE - SELECTOR_SIZE].iter().all(|b| *b == 0);
                if !(address_ok && selector_ok) && !self.options.permissive_padding {
                    return self.fail(
                        ty,
                        FunctionExternalError::StackPadding {
                            raw_address: first.to_vec(),
                            raw_selector: second.to_vec(),
                        },
                    );
                }
                let address = to_address(&first[WORD_SIZE - ADDRESS_SIZE..]);
                let mut selector = [0u8; SELECTOR_SIZE];
                selector.copy_from_slice(&second[WORD_SIZE - SELECTOR_SIZE..]);
                let value = self.external_function(address, selector)?;
                Ok(Decoded::value(ty.clone(), Value::FunctionExternal(value)))
            }
            Type::Bytes { .. } | Type::String { .. } | Type::Array(_) => {
                let offset = self.pointer(first)?;
                self.decode_calldata_slice(ty, offset, to_u256(second))
            }
            _ => self.unrepresentable(ty),
        }
    }

    /// A calldata slice given as (offset, length) with no length word in the
    /// data itself.
    fn decode_calldata_slice(&mut self, ty: &Type, offset: u64, length: U256) -> DecodeResult {
        let available = self.area_len(ByteLocation::Calldata)?.saturating_sub(offset);
        match ty {
            Type::Bytes { .. } | Type::String { .. } => {
                let length = self.checked_length(length, 1, Some(available))?;
                let data = self.read_bytes(ByteLocation::Calldata, offset, length)?;
                Ok(Decoded::value(ty.clone(), bytes_value(ty, data)))
            }
            Type::Array(array) if array.length == ArrayLength::Dynamic => {
                let info = self.info;
                let Some(element) = abi_size_info(&array.base, &info.allocations.abi) else {
                    return self.unrepresentable(ty);
                };
                let length = self.checked_length(length, element.size, Some(available))?;
                let base = array.base.with_location(Location::Calldata);
                let mut items = Vec::new();
                for i in 0..length {
                    let position = Self::element_position(offset, i, element.size)?;
                    items.push(self.decode_abi(&base, ByteLocation::Calldata, position, offset)?);
                }
                Ok(Decoded::value(ty.clone(), Value::Array(items)))
            }
            _ => self.unrepresentable(ty),
        }
    }
}
