//! ABI-encoded data: calldata, event data, and indexed topics.
//!
//! Dynamic values sit behind an offset word, measured from the start of the
//! enclosing tuple (`base`). Static containers are inlined in the head.

use statecodec_allocate::abi::AbiMemberAllocation;
use statecodec_allocate::{abi_size_info, allocate_tuple};
use statecodec_core::conversion::{to_u256, WORD_SIZE};
use statecodec_core::errors::{GenericError, ReadError};
use statecodec_core::pointer::ByteLocation;
use statecodec_core::types::{ArrayLength, ArrayType, StructType, TupleType, Type};
use statecodec_core::values::{Decoded, NameValuePair, Value};

use crate::basic::bytes_value;
use crate::decoder::{DecodeResult, Decoder};
use crate::error::Interrupt;

const WORD: u64 = WORD_SIZE as u64;

impl Decoder<'_> {
    /// Decode the head entry at `start`, resolving offsets against `base`.
    pub(crate) fn decode_abi(
        &mut self,
        ty: &Type,
        area: ByteLocation,
        start: u64,
        base: u64,
    ) -> DecodeResult {
        let info = self.info;
        if let Type::Struct(s) = ty {
            let known = info.allocations.abi.contains_key(&s.id)
                || info.user_types.get_struct(&s.id).is_some();
            if !known {
                return Err(Self::not_found(&s.id));
            }
        }
        let Some(size) = abi_size_info(ty, &info.allocations.abi) else {
            return self.unrepresentable(ty);
        };
        if size.dynamic {
            let word = self.read_word(area, start)?;
            let offset = self.pointer(&word)?;
            return self.decode_abi_reference(ty, area, Self::offset(base, offset)?);
        }
        match ty {
            Type::Array(_) | Type::Struct(_) | Type::Tuple(_) => {
                self.decode_abi_reference(ty, area, start)
            }
            _ => {
                let word = self.read_word(area, start)?;
                self.decode_basic(ty, &word)
            }
        }
    }

    /// Decode the content found at `location`: a length-prefixed tail for
    /// dynamic values, the inlined head for static containers.
    pub(crate) fn decode_abi_reference(
        &mut self,
        ty: &Type,
        area: ByteLocation,
        location: u64,
    ) -> DecodeResult {
        let place = format!("{area}:{location}");
        match ty {
            Type::Bytes { .. } | Type::String { .. } => {
                let length = self.read_word(area, location)?;
                let data_start = Self::offset(location, WORD)?;
                let available = self.area_len(area)?.saturating_sub(data_start);
                let length = self.checked_length(to_u256(&length), 1, Some(available))?;
                let data = self.read_bytes(area, data_start, length)?;
                Ok(Decoded::value(ty.clone(), bytes_value(ty, data)))
            }
            Type::Array(array) => {
                self.guarded(ty, place, |d| d.decode_abi_array(ty, array, area, location))
            }
            Type::Struct(s) => {
                self.guarded(ty, place, |d| d.decode_abi_struct(ty, s, area, location))
            }
            Type::Tuple(t) => {
                self.guarded(ty, place, |d| d.decode_abi_tuple(ty, t, area, location))
            }
            _ => self.unrepresentable(ty),
        }
    }

    fn decode_abi_array(
        &mut self,
        ty: &Type,
        array: &ArrayType,
        area: ByteLocation,
        location: u64,
    ) -> DecodeResult {
        let info = self.info;
        let Some(element) = abi_size_info(&array.base, &info.allocations.abi) else {
            return self.unrepresentable(ty);
        };
        let (length, first) = match &array.length {
            ArrayLength::Dynamic => {
                let word = self.read_word(area, location)?;
                let first = Self::offset(location, WORD)?;
                let available = self.area_len(area)?.saturating_sub(first);
                (self.checked_length(to_u256(&word), element.size, Some(available))?, first)
            }
            ArrayLength::Static(n) => (self.checked_length(*n, element.size, None)?, location),
        };
        let base = array.base.with_location(Self::location_of(area));
        let mut items = Vec::new();
        for i in 0..length {
            let position = Self::element_position(first, i, element.size)?;
            items.push(self.decode_abi(&base, area, position, first)?);
        }
        Ok(Decoded::value(ty.clone(), Value::Array(items)))
    }

    fn decode_abi_struct(
        &mut self,
        ty: &Type,
        s: &StructType,
        area: ByteLocation,
        location: u64,
    ) -> DecodeResult {
        let info = self.info;
        let allocation = match info.allocations.abi.get(&s.id) {
            Some(Some(allocation)) => allocation,
            Some(None) => return self.unrepresentable(ty),
            None => return Err(Self::not_found(&s.id)),
        };
        let members = self.decode_abi_members(&allocation.members, area, location)?;
        Ok(Decoded::value(ty.clone(), Value::Struct(members)))
    }

    fn decode_abi_tuple(
        &mut self,
        ty: &Type,
        t: &TupleType,
        area: ByteLocation,
        location: u64,
    ) -> DecodeResult {
        let Some(allocation) = allocate_tuple(&t.members, &self.info.allocations.abi) else {
            return self.unrepresentable(ty);
        };
        let members = self.decode_abi_members(&allocation.members, area, location)?;
        Ok(Decoded::value(ty.clone(), Value::Tuple(members)))
    }

    /// Decode the members of a tuple whose head starts at `location`.
    pub(crate) fn decode_abi_members(
        &mut self,
        members: &[AbiMemberAllocation],
        area: ByteLocation,
        location: u64,
    ) -> Result<Vec<NameValuePair>, Interrupt> {
        let data_location = Self::location_of(area);
        let mut out = Vec::with_capacity(members.len());
        for member in members {
            let position = Self::offset(location, member.pointer.start)?;
            let ty = member.ty.with_location(data_location);
            let value = self.decode_abi(&ty, area, position, location)?;
            out.push(NameValuePair::new(member.name.clone(), value));
        }
        Ok(out)
    }

    /// An indexed event argument. Reference types only leave their hash in
    /// the topic, which is reported rather than decoded.
    pub(crate) fn decode_topic(&mut self, ty: &Type, index: usize) -> DecodeResult {
        let Some(topic) = self.log.and_then(|log| log.topics.get(index)) else {
            return Err(Interrupt::stop(ReadError::Topic { index }));
        };
        if ty.is_reference() || matches!(ty, Type::Tuple(_)) {
            return self.fail(
                ty,
                GenericError::IndexedReferenceType {
                    ty: ty.to_string(),
                    raw: topic.to_vec(),
                },
            );
        }
        self.decode_basic(ty, topic.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, U256};
    use statecodec_core::conversion::u256_to_word;
    use statecodec_core::errors::{DecodingError, DynamicDataError};
    use statecodec_core::types::NamedType;
    use statecodec_core::values::StringValue;

    use crate::fixtures::Fixture;
    use crate::info::DecoderOptions;
    use crate::state::EvmState;

    fn calldata(words: &[U256], tail: &[u8]) -> EvmState {
        let mut bytes: Vec<u8> = words.iter().flat_map(|w| u256_to_word(*w)).collect();
        bytes.extend_from_slice(tail);
        EvmState {
            calldata: Bytes::from(bytes),
            ..EvmState::default()
        }
    }

    fn hi() -> [u8; 32] {
        let mut word = [0u8; 32];
        word[..2].copy_from_slice(b"hi");
        word
    }

    #[test]
    fn tuple_with_dynamic_member() {
        let state = calldata(&[U256::from(5), U256::from(0x40), U256::from(2)], &hi());
        let ty = Type::tuple(vec![
            NamedType::new("n", Type::Uint { bits: 8 }),
            NamedType::new("s", Type::string()),
        ]);
        let decoded = Fixture::new()
            .with_state(state)
            .run(DecoderOptions::default(), |d| {
                d.decode_abi_reference(&ty, ByteLocation::Calldata, 0)
            })
            .unwrap();
        let Some(Value::Tuple(members)) = decoded.as_value() else {
            panic!("expected a tuple, got {decoded}");
        };
        assert_eq!(members[0].value.as_value(), Some(&Value::Uint(U256::from(5))));
        assert_eq!(
            members[1].value.as_value(),
            Some(&Value::String(StringValue::Valid("hi".into())))
        );
        assert_eq!(
            members[1].value.ty(),
            &Type::string().with_location(statecodec_core::types::Location::Calldata)
        );
    }

    #[test]
    fn overlong_string_in_strict_mode() {
        let state = calldata(&[U256::from(0x20), U256::from(100)], &hi());
        let fixture = Fixture::new().with_state(state);

        let lenient = fixture
            .run(DecoderOptions::default(), |d| {
                d.decode_abi(&Type::string(), ByteLocation::Calldata, 0, 0)
            })
            .unwrap();
        assert!(!lenient.is_error());

        let strict = fixture.run(DecoderOptions::default().strict(), |d| {
            d.decode_abi(&Type::string(), ByteLocation::Calldata, 0, 0)
        });
        let Err(Interrupt::Stop(stop)) = strict else {
            panic!("expected a stop, got {strict:?}");
        };
        assert!(matches!(
            stop.error,
            DecodingError::DynamicData(DynamicDataError::OverlongArrayOrStringStrictMode { .. })
        ));
    }

    #[test]
    fn overlarge_offset_stops() {
        let state = calldata(&[U256::MAX], &[]);
        let result = Fixture::new()
            .with_state(state)
            .run(DecoderOptions::default(), |d| {
                d.decode_abi(&Type::bytes(), ByteLocation::Calldata, 0, 0)
            });

        let Err(Interrupt::Stop(stop)) = result else {
            panic!("expected a stop, got {result:?}");
        };
        assert!(matches!(
            stop.error,
            DecodingError::DynamicData(DynamicDataError::OverlargePointersNotImplemented { .. })
        ));
    }

    #[test]
    fn static_arrays_are_inlined() {
        let state = calldata(&[U256::from(1), U256::from(2), U256::from(3)], &[]);
        let ty = Type::static_array(Type::uint256(), 2);
        let fixture = Fixture::new().with_state(state);
        let decoded = fixture
            .run(DecoderOptions::default(), |d| d.decode_abi(&ty, ByteLocation::Calldata, 32, 0))
            .unwrap();
        assert_eq!(decoded.to_string(), "[2, 3]");
    }
}
