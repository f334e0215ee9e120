//! Elementary values read from a word or a packed storage range.
//!
//! A word read from the stack, memory or the ABI carries padding around the
//! value's natural bytes; a packed storage range does not. Padding is checked
//! whenever the raw bytes are longer than the value.

use alloy_primitives::{Address, U256};

use statecodec_allocate::{storage_size, StorageLength};
use statecodec_core::conversion::{
    pad_left, to_address, to_signed, to_u256, u256_to_u64, ADDRESS_SIZE, PC_SIZE, SELECTOR_SIZE,
};
use statecodec_core::errors::{
    AddressError, BoolError, BytesError, EnumError, FunctionExternalError, FunctionInternalError,
    NumericError, PaddingError, PaddingType,
};
use statecodec_core::types::{EnumType, Type, Visibility};
use statecodec_core::values::{
    ContractValue, Decoded, ExternalFunctionValue, InternalFunctionValue, StringValue, Value,
};

use crate::decoder::{DecodeResult, Decoder};
use crate::error::Interrupt;

pub(crate) const EXTERNAL_FUNCTION_SIZE: usize = ADDRESS_SIZE + SELECTOR_SIZE;
const INTERNAL_FUNCTION_SIZE: usize = 2 * PC_SIZE;

/// The natural `size` bytes of `raw` once its padding is checked. Raw bytes
/// no longer than `size` are returned untouched. `permissive` masks bad
/// padding away instead of reporting it.
pub(crate) fn unpad(
    raw: &[u8],
    size: usize,
    padding: PaddingType,
    permissive: bool,
) -> Result<Vec<u8>, PaddingError> {
    if raw.len() <= size {
        return Ok(raw.to_vec());
    }
    let (natural, pad) = match padding {
        PaddingType::Right => raw.split_at(size),
        PaddingType::Left | PaddingType::Signed => {
            let (pad, natural) = raw.split_at(raw.len() - size);
            (natural, pad)
        }
    };
    let fill = match padding {
        PaddingType::Signed if natural.first().is_some_and(|b| b & 0x80 != 0) => 0xff,
        _ => 0,
    };
    if permissive || pad.iter().all(|b| *b == fill) {
        Ok(natural.to_vec())
    } else {
        Err(PaddingError {
            raw: raw.to_vec(),
            padding,
        })
    }
}

/// Natural bytes of `raw`, or return early with the padding error in place.
macro_rules! unpadded {
    ($decoder:expr, $ty:expr, $raw:expr, $size:expr, $padding:expr, $wrap:path) => {
        match unpad($raw, $size, $padding, $decoder.options.permissive_padding) {
            Ok(natural) => natural,
            Err(e) => return $decoder.fail($ty, $wrap(e)),
        }
    };
}

fn pc(bytes: &[u8]) -> u64 {
    u256_to_u64(to_u256(bytes)).unwrap_or(u64::MAX)
}

/// Dynamic byte content as a `string` or `bytes` value.
pub(crate) fn bytes_value(ty: &Type, data: Vec<u8>) -> Value {
    match ty {
        Type::String { .. } => Value::String(StringValue::from_bytes(data)),
        _ => Value::Bytes(data),
    }
}

impl Decoder<'_> {
    pub(crate) fn decode_basic(&mut self, ty: &Type, raw: &[u8]) -> DecodeResult {
        if !ty.has_valid_width() {
            return self.unrepresentable(ty);
        }
        let value = match ty {
            Type::Bool => {
                let natural = unpadded!(self, ty, raw, 1, PaddingType::Left, BoolError::Padding);
                let n = to_u256(&natural);
                if n > U256::from(1) {
                    return self.fail(ty, BoolError::OutOfRange { raw: n });
                }
                Value::Bool(n == U256::from(1))
            }
            Type::Uint { bits } => {
                let size = *bits as usize / 8;
                let natural =
                    unpadded!(self, ty, raw, size, PaddingType::Left, NumericError::Padding);
                Value::Uint(to_u256(&natural))
            }
            Type::Int { bits } => {
                let size = *bits as usize / 8;
                let natural =
                    unpadded!(self, ty, raw, size, PaddingType::Signed, NumericError::Padding);
                Value::Int(to_signed(&natural))
            }
            Type::Ufixed { bits, .. } => {
                let size = *bits as usize / 8;
                let natural =
                    unpadded!(self, ty, raw, size, PaddingType::Left, NumericError::Padding);
                Value::Ufixed(to_u256(&natural))
            }
            Type::Fixed { bits, .. } => {
                let size = *bits as usize / 8;
                let natural =
                    unpadded!(self, ty, raw, size, PaddingType::Signed, NumericError::Padding);
                Value::Fixed(to_signed(&natural))
            }
            Type::Address { .. } => {
                let natural = unpadded!(
                    self,
                    ty,
                    raw,
                    ADDRESS_SIZE,
                    PaddingType::Left,
                    AddressError::Padding
                );
                Value::Address(to_address(&natural))
            }
            Type::Contract(_) => {
                let natural = unpadded!(
                    self,
                    ty,
                    raw,
                    ADDRESS_SIZE,
                    PaddingType::Left,
                    AddressError::Padding
                );
                Value::Contract(self.classify_contract(to_address(&natural))?)
            }
            Type::Enum(e) => return self.decode_enum(ty, e, raw),
            Type::FixedBytes { length } => {
                let size = *length as usize;
                let natural =
                    unpadded!(self, ty, raw, size, PaddingType::Right, BytesError::Padding);
                Value::FixedBytes(natural)
            }
            Type::Function(f) if f.visibility == Visibility::External => {
                let natural = unpadded!(
                    self,
                    ty,
                    raw,
                    EXTERNAL_FUNCTION_SIZE,
                    PaddingType::Right,
                    FunctionExternalError::NonStackPadding
                );
                let mut natural = natural;
                natural.resize(EXTERNAL_FUNCTION_SIZE, 0);
                let mut selector = [0u8; SELECTOR_SIZE];
                selector.copy_from_slice(&natural[ADDRESS_SIZE..]);
                let address = to_address(&natural[..ADDRESS_SIZE]);
                Value::FunctionExternal(self.external_function(address, selector)?)
            }
            Type::Function(_) => {
                let natural = unpadded!(
                    self,
                    ty,
                    raw,
                    INTERNAL_FUNCTION_SIZE,
                    PaddingType::Left,
                    FunctionInternalError::Padding
                );
                let natural = pad_left(&natural, INTERNAL_FUNCTION_SIZE);
                return self.internal_function(ty, pc(&natural[PC_SIZE..]), pc(&natural[..PC_SIZE]));
            }
            _ => return self.unrepresentable(ty),
        };
        Ok(Decoded::value(ty.clone(), value))
    }

    fn decode_enum(&mut self, ty: &Type, e: &EnumType, raw: &[u8]) -> DecodeResult {
        let size = match storage_size(ty, self.info.user_types, &self.info.allocations.storage) {
            Ok(StorageLength::Bytes(n)) => n as usize,
            _ => 1,
        };
        let natural = unpadded!(self, ty, raw, size, PaddingType::Left, EnumError::Padding);
        let index = to_u256(&natural);
        let Some(definition) = self.info.user_types.get_enum(&e.id) else {
            return self.fail(ty, EnumError::NotFound { id: e.id.clone(), raw: index });
        };
        let option = u256_to_u64(index)
            .and_then(|i| u8::try_from(i).ok())
            .and_then(|i| definition.options.get(i as usize).map(|name| (i, name)));
        match option {
            Some((index, name)) => Ok(Decoded::value(
                ty.clone(),
                Value::Enum {
                    index,
                    name: name.clone(),
                },
            )),
            None => self.fail(ty, EnumError::OutOfRange { id: e.id.clone(), raw: index }),
        }
    }

    /// Name the contract at `address` by matching its code against the
    /// known contexts. Abi mode never asks for code.
    pub(crate) fn classify_contract(&self, address: Address) -> Result<ContractValue, Interrupt> {
        if !self.options.is_full() {
            return Ok(ContractValue::Unknown { address });
        }
        let code = self.code(address)?;
        Ok(match self.info.contexts.find_by_code(code, false) {
            Some(context) => ContractValue::Known {
                address,
                class: context.contract_name.clone(),
            },
            None => ContractValue::Unknown { address },
        })
    }

    pub(crate) fn external_function(
        &self,
        address: Address,
        selector: [u8; SELECTOR_SIZE],
    ) -> Result<ExternalFunctionValue, Interrupt> {
        let unknown = ExternalFunctionValue::Unknown {
            contract: ContractValue::Unknown { address },
            selector,
        };
        if !self.options.is_full() {
            return Ok(unknown);
        }
        let code = self.code(address)?;
        let Some(context) = self.info.contexts.find_by_code(code, false) else {
            return Ok(unknown);
        };
        let contract = ContractValue::Known {
            address,
            class: context.contract_name.clone(),
        };
        Ok(match context.functions.get(&selector) {
            Some(name) => ExternalFunctionValue::Known {
                contract,
                selector,
                name: name.clone(),
            },
            None => ExternalFunctionValue::Invalid { contract, selector },
        })
    }

    fn internal_function(&self, ty: &Type, deployed_pc: u64, constructor_pc: u64) -> DecodeResult {
        let found = |value: InternalFunctionValue| {
            Ok(Decoded::value(ty.clone(), Value::FunctionInternal(value)))
        };
        if deployed_pc == 0 && constructor_pc == 0 {
            return found(InternalFunctionValue::Exception {
                deployed_pc,
                constructor_pc,
            });
        }
        let table = self.info.context().and_then(|c| c.internal_functions.as_ref().map(|t| (c, t)));
        let Some((context, table)) = table else {
            return found(InternalFunctionValue::Unknown {
                deployed_pc,
                constructor_pc,
            });
        };
        let pc = if context.is_constructor {
            if constructor_pc == 0 {
                return self.fail(
                    ty,
                    FunctionInternalError::DeployedFunctionInConstructor {
                        deployed_pc,
                        constructor_pc,
                    },
                );
            }
            constructor_pc
        } else {
            if deployed_pc == 0 {
                return self.fail(
                    ty,
                    FunctionInternalError::MalformedInternalFunction {
                        deployed_pc,
                        constructor_pc,
                    },
                );
            }
            deployed_pc
        };
        match table.get(&pc) {
            None => self.fail(
                ty,
                FunctionInternalError::NoSuchInternalFunction {
                    deployed_pc,
                    constructor_pc,
                },
            ),
            Some(entry) if entry.is_designated_invalid => found(InternalFunctionValue::Exception {
                deployed_pc,
                constructor_pc,
            }),
            Some(entry) => found(InternalFunctionValue::Function {
                deployed_pc,
                constructor_pc,
                name: entry.name.clone(),
                defining_contract: entry.defining_contract.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use alloy_primitives::I256;
    use statecodec_core::context::{Context, InternalFunctionEntry};
    use statecodec_core::definitions::{EnumDefinition, UserDefinedType, UserDefinedTypes};
    use statecodec_core::errors::{DecodingError, GenericError};
    use statecodec_core::types::{ContractKind, FunctionType, TypeId};

    use crate::fixtures::Fixture;
    use crate::info::DecoderOptions;
    use crate::request::DecoderRequest;
    use crate::state::EvmState;

    fn word(hex_str: &str) -> Vec<u8> {
        let bytes = hex::decode(hex_str).unwrap();
        pad_left(&bytes, 32)
    }

    #[test]
    fn unpad_checks_each_side() {
        assert_eq!(unpad(&[0, 0, 5], 1, PaddingType::Left, false).unwrap(), vec![5]);
        assert!(unpad(&[1, 0, 5], 1, PaddingType::Left, false).is_err());
        assert_eq!(unpad(&[1, 0, 5], 1, PaddingType::Left, true).unwrap(), vec![5]);
        assert_eq!(unpad(&[0xab, 0, 0], 1, PaddingType::Right, false).unwrap(), vec![0xab]);
        assert_eq!(unpad(&[0xff, 0xff, 0x80], 1, PaddingType::Signed, false).unwrap(), vec![0x80]);
        assert!(unpad(&[0x00, 0x00, 0x80], 1, PaddingType::Signed, false).is_err());
        // packed storage bytes have no padding to check
        assert_eq!(unpad(&[9], 1, PaddingType::Left, false).unwrap(), vec![9]);
    }

    #[test]
    fn impossible_widths_are_unrepresentable() {
        for ty in [
            Type::Uint { bits: 512 },
            Type::Int { bits: 0 },
            Type::FixedBytes { length: 33 },
        ] {
            let decoded = Fixture::new()
                .run(DecoderOptions::default(), |d| d.decode_basic(&ty, &word("01")))
                .unwrap();
            assert!(
                matches!(
                    decoded.as_error(),
                    Some(DecodingError::Generic(GenericError::UnrepresentableType { .. }))
                ),
                "{ty}"
            );
        }
    }

    #[test]
    fn bool_out_of_range_is_embedded() {
        let decoded = Fixture::new()
            .run(DecoderOptions::default(), |d| d.decode_basic(&Type::Bool, &word("02")));
        let decoded = decoded.unwrap();
        assert!(matches!(
            decoded.as_error(),
            Some(DecodingError::Bool(BoolError::OutOfRange { raw })) if *raw == U256::from(2)
        ));
    }

    #[test]
    fn signed_values_sign_extend() {
        let raw = [0xffu8; 32];
        let decoded = Fixture::new()
            .run(DecoderOptions::default(), |d| d.decode_basic(&Type::Int { bits: 8 }, &raw))
            .unwrap();
        assert_eq!(decoded.as_value(), Some(&Value::Int(I256::MINUS_ONE)));
    }

    #[test]
    fn fixed_bytes_padding_error_and_permissive_mask() {
        let mut raw = [0u8; 32];
        raw[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        raw[31] = 1;
        let ty = Type::FixedBytes { length: 4 };
        let fixture = Fixture::new();
        let strict = fixture.run(DecoderOptions::default(), |d| d.decode_basic(&ty, &raw)).unwrap();
        assert!(matches!(strict.as_error(), Some(DecodingError::Bytes(BytesError::Padding(_)))));
        let options = DecoderOptions {
            permissive_padding: true,
            ..DecoderOptions::default()
        };
        let lenient = fixture.run(options, |d| d.decode_basic(&ty, &raw)).unwrap();
        assert_eq!(lenient.as_value(), Some(&Value::FixedBytes(vec![0xde, 0xad, 0xbe, 0xef])));
    }

    fn color_types() -> UserDefinedTypes {
        [UserDefinedType::Enum(EnumDefinition {
            id: TypeId::new("Color"),
            name: "Color".into(),
            defining_contract: None,
            options: vec!["Red".into(), "Green".into(), "Blue".into()],
        })]
        .into_iter()
        .collect()
    }

    fn color() -> Type {
        Type::Enum(EnumType {
            id: TypeId::new("Color"),
            name: "Color".into(),
            defining_contract: None,
        })
    }

    #[test]
    fn enums_resolve_names_and_bounds() {
        let fixture = Fixture::new().with_types(color_types());
        let blue = fixture
            .run(DecoderOptions::default(), |d| d.decode_basic(&color(), &word("02")))
            .unwrap();
        assert_eq!(
            blue.as_value(),
            Some(&Value::Enum {
                index: 2,
                name: "Blue".into()
            })
        );
        let bad = fixture
            .run(DecoderOptions::default(), |d| d.decode_basic(&color(), &word("03")))
            .unwrap();
        let error = bad.as_error().unwrap();
        assert!(matches!(error, DecodingError::Enum(EnumError::OutOfRange { .. })));
        assert!(error.is_retry_eligible());
    }

    #[test]
    fn contracts_are_classified_by_code() {
        let address = Address::repeat_byte(0x22);
        let ty = Type::Contract(statecodec_core::types::ContractType {
            id: TypeId::new("Token"),
            name: "Token".into(),
            kind: ContractKind::Contract,
            payable: false,
        });
        let raw = pad_left(address.as_slice(), 32);

        let context =
            Context::new("Token", ContractKind::Contract, false, vec![0x60, 0x80], vec![]);
        let fixture = Fixture::new().with_context(context);
        let pending = fixture.run(DecoderOptions::default(), |d| d.decode_basic(&ty, &raw));
        assert_eq!(pending, Err(Interrupt::NeedData(DecoderRequest::Code { address })));

        let fixture = fixture.with_state(EvmState::new().with_code(address, vec![0x60, 0x80]));
        let known = fixture.run(DecoderOptions::default(), |d| d.decode_basic(&ty, &raw)).unwrap();
        assert_eq!(
            known.as_value(),
            Some(&Value::Contract(ContractValue::Known {
                address,
                class: "Token".into()
            }))
        );
    }

    #[test]
    fn internal_functions_resolve_through_the_context_table() {
        let mut table = BTreeMap::new();
        table.insert(
            0x1234,
            InternalFunctionEntry {
                name: "_transfer".into(),
                defining_contract: Some("Token".into()),
                is_designated_invalid: false,
            },
        );
        let context = Context::new("Token", ContractKind::Contract, false, vec![1], vec![])
            .with_internal_functions(table);
        let fixture = Fixture::new().with_context(context);
        let ty = Type::Function(FunctionType::internal());

        let found = fixture
            .run(DecoderOptions::default(), |d| d.decode_basic(&ty, &word("0000000000001234")))
            .unwrap();
        assert_eq!(found.to_string(), "Token._transfer");

        let missing = fixture
            .run(DecoderOptions::default(), |d| d.decode_basic(&ty, &word("0000000000009999")))
            .unwrap();
        assert!(matches!(
            missing.as_error(),
            Some(DecodingError::FunctionInternal(
                FunctionInternalError::NoSuchInternalFunction { .. }
            ))
        ));

        let zero = fixture
            .run(DecoderOptions::default(), |d| d.decode_basic(&ty, &[0u8; 32]))
            .unwrap();
        assert!(matches!(
            zero.as_value(),
            Some(Value::FunctionInternal(InternalFunctionValue::Exception { .. }))
        ));
    }

    #[test]
    fn abi_mode_never_requests_code() {
        let address = Address::repeat_byte(0x33);
        let mut raw = [0u8; 32];
        raw[..20].copy_from_slice(address.as_slice());
        raw[20..24].copy_from_slice(&[0xa9, 0x05, 0x9c, 0xbb]);
        let ty = Type::Function(FunctionType::external());
        let options =
            DecoderOptions::default().with_mode(statecodec_core::config::DecodingMode::Abi);
        let decoded = Fixture::new().run(options, |d| d.decode_basic(&ty, &raw)).unwrap();
        assert!(matches!(
            decoded.as_value(),
            Some(Value::FunctionExternal(ExternalFunctionValue::Unknown { .. }))
        ));
    }
}
