//! Storage decoding.
//!
//! Values are read slot by slot through [`Decoder::storage_word`], so a
//! decoding asks for exactly the slots the value occupies and nothing else.

use alloy_primitives::U256;

use statecodec_allocate::{
    element_range, storage_size, AllocationError, StorageLength, StorageMemberPointer,
};
use statecodec_core::conversion::{keccak256_u256, to_u256, u256_to_word, words_for, WORD_SIZE};
use statecodec_core::errors::{DynamicDataError, ReadError};
use statecodec_core::pointer::StorageRange;
use statecodec_core::types::{ArrayLength, ArrayType, MappingType, StructType, Type};
use statecodec_core::values::{Decoded, KeyValuePair, NameValuePair, Value};
use statecodec_encode::mapping_value_slot;
use tracing::debug;

use crate::basic::bytes_value;
use crate::decoder::{DecodeResult, Decoder};
use crate::error::Interrupt;

const LAST_INDEX: u8 = (WORD_SIZE - 1) as u8;

impl Decoder<'_> {
    pub(crate) fn decode_storage(&mut self, ty: &Type, range: StorageRange) -> DecodeResult {
        let place = format!("storage:{:#x}", range.from.slot);
        match ty {
            Type::Bytes { .. } | Type::String { .. } => {
                self.decode_storage_bytes(ty, range.from.slot)
            }
            Type::Array(array) => {
                self.guarded(ty, place, |d| d.decode_storage_array(ty, array, range))
            }
            Type::Struct(s) => self.guarded(ty, place, |d| d.decode_storage_struct(ty, s, range)),
            Type::Mapping(m) => {
                self.guarded(ty, place, |d| d.decode_storage_mapping(ty, m, range))
            }
            Type::Tuple(_) | Type::Magic { .. } => self.unrepresentable(ty),
            _ => {
                if !range.is_single_slot() {
                    return self.unrepresentable(ty);
                }
                let word = self.storage_word(range.from.slot)?;
                self.decode_basic(ty, range.extract(&word))
            }
        }
    }

    /// Storage size of `ty`. `None` when the type cannot live in storage.
    pub(crate) fn storage_length(&self, ty: &Type) -> Result<Option<StorageLength>, Interrupt> {
        let info = self.info;
        match storage_size(ty, info.user_types, &info.allocations.storage) {
            Ok(length) => Ok(Some(length)),
            Err(AllocationError::UnknownDefinition { id }) => Err(Self::not_found(&id)),
            Err(_) => Ok(None),
        }
    }

    /// Short form: content and `2 * length` share one slot. Long form: the
    /// slot holds `2 * length + 1` and the content starts at `keccak(slot)`.
    fn decode_storage_bytes(&mut self, ty: &Type, slot: U256) -> DecodeResult {
        let word = self.storage_word(slot)?;
        let last = word[WORD_SIZE - 1];
        let data = if last & 1 == 0 {
            let length = (last / 2) as usize;
            if length >= WORD_SIZE {
                let raw = word.to_vec();
                return self.fail(ty, DynamicDataError::MalformedShortStorageEncoding { raw });
            }
            word[..length].to_vec()
        } else {
            let raw_length = (to_u256(&word) - U256::from(1)) / U256::from(2);
            let length = self.checked_length(raw_length, 1, None)?;
            let start = keccak256_u256(&u256_to_word(slot));
            let mut data = Vec::new();
            for i in 0..words_for(length) {
                data.extend_from_slice(&self.storage_word(start.wrapping_add(U256::from(i)))?);
            }
            data.truncate(length as usize);
            data
        };
        Ok(Decoded::value(ty.clone(), bytes_value(ty, data)))
    }

    fn decode_storage_array(
        &mut self,
        ty: &Type,
        array: &ArrayType,
        range: StorageRange,
    ) -> DecodeResult {
        let (length, base) = match &array.length {
            ArrayLength::Dynamic => {
                let word = self.storage_word(range.from.slot)?;
                let length = self.checked_length(to_u256(&word), 1, None)?;
                (length, keccak256_u256(&u256_to_word(range.from.slot)))
            }
            ArrayLength::Static(n) => (self.checked_length(*n, 1, None)?, range.from.slot),
        };
        let Some(size) = self.storage_length(&array.base)? else {
            return self.unrepresentable(ty);
        };
        let mut items = Vec::new();
        for i in 0..length {
            let element = element_range(size, U256::from(i)).offset_by(base);
            items.push(self.decode_storage(&array.base, element)?);
        }
        Ok(Decoded::value(ty.clone(), Value::Array(items)))
    }

    fn decode_storage_struct(
        &mut self,
        ty: &Type,
        s: &StructType,
        range: StorageRange,
    ) -> DecodeResult {
        let info = self.info;
        let Some(allocation) = info.allocations.storage.get(&s.id) else {
            return Err(Self::not_found(&s.id));
        };
        let mut members = Vec::with_capacity(allocation.members.len());
        for member in &allocation.members {
            let value = match &member.pointer {
                StorageMemberPointer::Storage { range: relative } => {
                    self.decode_storage(&member.ty, relative.offset_by(range.from.slot))?
                }
                StorageMemberPointer::Constant { name } => {
                    let name = name.clone();
                    return Err(Interrupt::stop(ReadError::UnsupportedConstant { name }));
                }
            };
            members.push(NameValuePair::new(member.name.clone(), value));
        }
        Ok(Decoded::value(ty.clone(), Value::Struct(members)))
    }

    /// Entries for the keys registered against this mapping's slot. Storage
    /// cannot be enumerated, so other keys are simply absent.
    fn decode_storage_mapping(
        &mut self,
        ty: &Type,
        m: &MappingType,
        range: StorageRange,
    ) -> DecodeResult {
        let slot = range.from.slot;
        let Some(size) = self.storage_length(&m.value)? else {
            return self.unrepresentable(ty);
        };
        let state = self.state;
        let mut entries = Vec::new();
        for key in state.keys_for(&slot) {
            let Some(value_slot) = mapping_value_slot(key, slot) else {
                debug!(%slot, key = %key, "mapping key has no preimage");
                continue;
            };
            let value_range = match size {
                StorageLength::Bytes(n) => StorageRange::bytes(value_slot, LAST_INDEX, n),
                StorageLength::Words(w) => StorageRange::words(value_slot, w),
            };
            let value = self.decode_storage(&m.value, value_range)?;
            entries.push(KeyValuePair {
                key: key.clone(),
                value,
            });
        }
        Ok(Decoded::value(ty.clone(), Value::Mapping(entries)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecodec_core::conversion::ZERO_WORD;
    use statecodec_core::definitions::{StructDefinition, UserDefinedType, UserDefinedTypes};
    use statecodec_core::errors::DecodingError;
    use statecodec_core::types::{NamedType, TypeId};
    use statecodec_core::values::StringValue;

    use crate::fixtures::Fixture;
    use crate::info::DecoderOptions;
    use crate::request::DecoderRequest;
    use crate::state::EvmState;

    fn short_string(s: &str) -> [u8; 32] {
        let mut word = ZERO_WORD;
        word[..s.len()].copy_from_slice(s.as_bytes());
        word[31] = (s.len() * 2) as u8;
        word
    }

    #[test]
    fn short_strings_live_in_their_slot() {
        let state = EvmState::new().with_storage(U256::ZERO, short_string("hello"));
        let fixture = Fixture::new().with_state(state);
        let decoded = fixture
            .run(DecoderOptions::default(), |d| {
                d.decode_storage(&Type::string(), StorageRange::word(U256::ZERO))
            })
            .unwrap();
        assert_eq!(
            decoded.as_value(),
            Some(&Value::String(StringValue::Valid("hello".into())))
        );
    }

    #[test]
    fn malformed_short_encoding_is_embedded() {
        let mut word = ZERO_WORD;
        word[31] = 0x40;
        let fixture = Fixture::new().with_state(EvmState::new().with_storage(U256::ZERO, word));
        let decoded = fixture
            .run(DecoderOptions::default(), |d| {
                d.decode_storage(&Type::bytes(), StorageRange::word(U256::ZERO))
            })
            .unwrap();
        assert!(matches!(
            decoded.as_error(),
            Some(DecodingError::DynamicData(DynamicDataError::MalformedShortStorageEncoding { .. }))
        ));
    }

    #[test]
    fn long_bytes_read_from_the_hashed_slot() {
        let content: Vec<u8> = (0u8..40).collect();
        let mut header = ZERO_WORD;
        header[31] = (40 * 2 + 1) as u8;
        let start = keccak256_u256(&u256_to_word(U256::from(3)));
        let mut first = ZERO_WORD;
        first.copy_from_slice(&content[..32]);
        let mut second = ZERO_WORD;
        second[..8].copy_from_slice(&content[32..]);

        let fixture = Fixture::new();
        let pending = fixture.run(DecoderOptions::default(), |d| {
            d.decode_storage(&Type::bytes(), StorageRange::word(U256::from(3)))
        });
        assert_eq!(
            pending,
            Err(Interrupt::NeedData(DecoderRequest::Storage { slot: U256::from(3) }))
        );

        let state = EvmState::new()
            .with_storage(U256::from(3), header)
            .with_storage(start, first)
            .with_storage(start + U256::from(1), second);
        let decoded = Fixture::new()
            .with_state(state)
            .run(DecoderOptions::default(), |d| {
                d.decode_storage(&Type::bytes(), StorageRange::word(U256::from(3)))
            })
            .unwrap();
        assert_eq!(decoded.as_value(), Some(&Value::Bytes(content)));
    }

    #[test]
    fn packed_static_array_elements() {
        let mut word = ZERO_WORD;
        word[31] = 1;
        word[30] = 2;
        word[29] = 3;
        let ty = Type::static_array(Type::Uint { bits: 8 }, 3);
        let decoded = Fixture::new()
            .with_state(EvmState::new().with_storage(U256::ZERO, word))
            .run(DecoderOptions::default(), |d| {
                d.decode_storage(&ty, StorageRange::word(U256::ZERO))
            })
            .unwrap();
        assert_eq!(decoded.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn mapping_entries_follow_registered_keys() {
        let key = Decoded::value(Type::uint256(), Value::Uint(U256::from(7)));
        let value_slot = mapping_value_slot(&key, U256::from(1)).unwrap();
        let mut balance = ZERO_WORD;
        balance[31] = 42;
        let state = EvmState::new()
            .with_mapping_key(U256::from(1), key)
            .with_storage(value_slot, balance);
        let ty = Type::mapping(Type::uint256(), Type::uint256());
        let decoded = Fixture::new()
            .with_state(state)
            .run(DecoderOptions::default(), |d| {
                d.decode_storage(&ty, StorageRange::word(U256::from(1)))
            })
            .unwrap();
        assert_eq!(decoded.to_string(), "{7 => 42}");
    }

    #[test]
    fn missing_struct_definition_is_fatal() {
        let ty = Type::Struct(StructType {
            id: TypeId::new("Ghost"),
            name: "Ghost".into(),
            defining_contract: None,
            location: None,
        });
        let result = Fixture::new().run(DecoderOptions::default(), |d| {
            d.decode_storage(&ty, StorageRange::word(U256::ZERO))
        });
        let Err(Interrupt::Stop(stop)) = result else {
            panic!("expected a stop, got {result:?}");
        };
        assert!(stop.allow_retry);
    }

    #[test]
    fn struct_members_are_offset_from_the_struct_slot() {
        let types: UserDefinedTypes = [UserDefinedType::Struct(StructDefinition {
            id: TypeId::new("Pair"),
            name: "Pair".into(),
            defining_contract: None,
            members: vec![
                NamedType::new("a", Type::Uint { bits: 128 }),
                NamedType::new("b", Type::Uint { bits: 128 }),
                NamedType::new("c", Type::uint256()),
            ],
        })]
        .into_iter()
        .collect();
        let ty = types.get_struct(&TypeId::new("Pair")).unwrap().as_type();
        let mut packed = ZERO_WORD;
        packed[31] = 1;
        packed[15] = 2;
        let mut c = ZERO_WORD;
        c[31] = 3;
        let state = EvmState::new()
            .with_storage(U256::from(5), packed)
            .with_storage(U256::from(6), c);
        let decoded = Fixture::new()
            .with_types(types)
            .with_state(state)
            .run(DecoderOptions::default(), |d| {
                d.decode_storage(&ty, StorageRange::word(U256::from(5)))
            })
            .unwrap();
        assert_eq!(decoded.to_string(), "{a: 1, b: 2, c: 3}");
    }
}
