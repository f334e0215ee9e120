//! Memory decoding. Reference types in memory are a word holding the address
//! of their content; nested reference types are pointers again.

use statecodec_core::conversion::{to_u256, WORD_SIZE};
use statecodec_core::pointer::ByteLocation;
use statecodec_core::types::{ArrayLength, ArrayType, StructType, Type};
use statecodec_core::values::{Decoded, NameValuePair, Value};

use crate::basic::bytes_value;
use crate::decoder::{DecodeResult, Decoder};

const WORD: u64 = WORD_SIZE as u64;

impl Decoder<'_> {
    pub(crate) fn decode_memory(&mut self, ty: &Type, start: u64) -> DecodeResult {
        match ty {
            Type::Mapping(_) | Type::Tuple(_) | Type::Magic { .. } => self.unrepresentable(ty),
            Type::Bytes { .. } | Type::String { .. } | Type::Array(_) | Type::Struct(_) => {
                let word = self.read_word(ByteLocation::Memory, start)?;
                let address = self.pointer(&word)?;
                self.decode_memory_reference(ty, address)
            }
            _ => {
                let word = self.read_word(ByteLocation::Memory, start)?;
                self.decode_basic(ty, &word)
            }
        }
    }

    /// Decode the content found at memory `address`.
    pub(crate) fn decode_memory_reference(&mut self, ty: &Type, address: u64) -> DecodeResult {
        let place = format!("memory:{address}");
        match ty {
            Type::Bytes { .. } | Type::String { .. } => {
                let length = self.read_word(ByteLocation::Memory, address)?;
                let length = self.checked_length(to_u256(&length), 1, None)?;
                let data =
                    self.read_bytes(ByteLocation::Memory, Self::offset(address, WORD)?, length)?;
                Ok(Decoded::value(ty.clone(), bytes_value(ty, data)))
            }
            Type::Array(array) => {
                self.guarded(ty, place, |d| d.decode_memory_array(ty, array, address))
            }
            Type::Struct(s) => self.guarded(ty, place, |d| d.decode_memory_struct(ty, s, address)),
            _ => self.unrepresentable(ty),
        }
    }

    fn decode_memory_array(&mut self, ty: &Type, array: &ArrayType, address: u64) -> DecodeResult {
        let (length, first) = match &array.length {
            ArrayLength::Dynamic => {
                let word = self.read_word(ByteLocation::Memory, address)?;
                (self.checked_length(to_u256(&word), WORD, None)?, Self::offset(address, WORD)?)
            }
            ArrayLength::Static(n) => (self.checked_length(*n, WORD, None)?, address),
        };
        let mut items = Vec::new();
        for i in 0..length {
            let position = Self::element_position(first, i, WORD)?;
            items.push(self.decode_memory(&array.base, position)?);
        }
        Ok(Decoded::value(ty.clone(), Value::Array(items)))
    }

    fn decode_memory_struct(&mut self, ty: &Type, s: &StructType, address: u64) -> DecodeResult {
        let info = self.info;
        let Some(allocation) = info.allocations.memory.get(&s.id) else {
            return Err(Self::not_found(&s.id));
        };
        let mut members = Vec::with_capacity(allocation.members.len());
        for member in &allocation.members {
            let value = self.decode_memory(&member.ty, Self::offset(address, member.start)?)?;
            members.push(NameValuePair::new(member.name.clone(), value));
        }
        Ok(Decoded::value(ty.clone(), Value::Struct(members)))
    }
}
