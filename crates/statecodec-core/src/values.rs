//! Decoded results.
//!
//! Every decode produces a [`Decoded`]: either a value shaped by its type, or
//! an embedded [`DecodingError`] sitting exactly where the value would have
//! been.

use alloy_primitives::{Address, I256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conversion::{checksum, to_hex};
use crate::errors::DecodingError;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Decoded {
    Value {
        #[serde(rename = "type")]
        ty: Type,
        value: Value,
    },
    Error {
        #[serde(rename = "type")]
        ty: Type,
        error: DecodingError,
    },
}

impl Decoded {
    pub fn value(ty: Type, value: Value) -> Self {
        Decoded::Value { ty, value }
    }

    pub fn error(ty: Type, error: impl Into<DecodingError>) -> Self {
        Decoded::Error {
            ty,
            error: error.into(),
        }
    }

    pub fn ty(&self) -> &Type {
        match self {
            Decoded::Value { ty, .. } | Decoded::Error { ty, .. } => ty,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Decoded::Error { .. })
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Decoded::Value { value, .. } => Some(value),
            Decoded::Error { .. } => None,
        }
    }

    pub fn as_error(&self) -> Option<&DecodingError> {
        match self {
            Decoded::Error { error, .. } => Some(error),
            Decoded::Value { .. } => None,
        }
    }

    /// Whether this value or any value nested in it is an error.
    pub fn contains_error(&self) -> bool {
        match self {
            Decoded::Error { .. } => true,
            Decoded::Value { value, .. } => value.children().any(Decoded::contains_error),
        }
    }

    /// The first error found in a depth-first walk.
    pub fn first_error(&self) -> Option<&DecodingError> {
        match self {
            Decoded::Error { error, .. } => Some(error),
            Decoded::Value { value, .. } => value.children().find_map(Decoded::first_error),
        }
    }
}

impl fmt::Display for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoded::Value { value, .. } => write!(f, "{value}"),
            Decoded::Error { error, .. } => write!(f, "<error: {error}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "raw", rename_all = "lowercase")]
pub enum StringValue {
    Valid(String),
    /// Bytes that are not UTF-8.
    Malformed(#[serde(with = "hex_bytes")] Vec<u8>),
}

impl StringValue {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => StringValue::Valid(s),
            Err(e) => StringValue::Malformed(e.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            StringValue::Valid(s) => s.as_bytes(),
            StringValue::Malformed(b) => b,
        }
    }
}

/// A contract address, classified against known code when possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContractValue {
    Known { address: Address, class: String },
    Unknown { address: Address },
}

impl ContractValue {
    pub fn address(&self) -> Address {
        match self {
            ContractValue::Known { address, .. } | ContractValue::Unknown { address } => *address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExternalFunctionValue {
    /// Selector found in the contract's function table.
    Known {
        contract: ContractValue,
        selector: [u8; 4],
        name: String,
    },
    /// Contract recognised but the selector is not one of its functions.
    Invalid {
        contract: ContractValue,
        selector: [u8; 4],
    },
    Unknown {
        contract: ContractValue,
        selector: [u8; 4],
    },
}

impl ExternalFunctionValue {
    pub fn contract(&self) -> &ContractValue {
        match self {
            ExternalFunctionValue::Known { contract, .. }
            | ExternalFunctionValue::Invalid { contract, .. }
            | ExternalFunctionValue::Unknown { contract, .. } => contract,
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        match self {
            ExternalFunctionValue::Known { selector, .. }
            | ExternalFunctionValue::Invalid { selector, .. }
            | ExternalFunctionValue::Unknown { selector, .. } => *selector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InternalFunctionValue {
    Function {
        deployed_pc: u64,
        constructor_pc: u64,
        name: String,
        defining_contract: Option<String>,
    },
    /// The zero pointer or the designated invalid function.
    Exception { deployed_pc: u64, constructor_pc: u64 },
    /// No table available to resolve the pointer.
    Unknown { deployed_pc: u64, constructor_pc: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValuePair {
    pub name: String,
    pub value: Decoded,
}

impl NameValuePair {
    pub fn new(name: impl Into<String>, value: Decoded) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: Decoded,
    pub value: Decoded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", content = "content", rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Uint(U256),
    Int(I256),
    /// Raw scaled integer; the type carries the number of decimal places.
    Fixed(I256),
    Ufixed(U256),
    Address(Address),
    Contract(ContractValue),
    Enum { index: u8, name: String },
    FixedBytes(#[serde(with = "hex_bytes")] Vec<u8>),
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    String(StringValue),
    Array(Vec<Decoded>),
    Struct(Vec<NameValuePair>),
    Tuple(Vec<NameValuePair>),
    Mapping(Vec<KeyValuePair>),
    FunctionExternal(ExternalFunctionValue),
    FunctionInternal(InternalFunctionValue),
    Magic(Vec<NameValuePair>),
    /// Stands in for a container already being decoded further up.
    Circular { reference: usize },
}

impl Value {
    /// Directly nested decoded values.
    pub fn children(&self) -> Box<dyn Iterator<Item = &Decoded> + '_> {
        match self {
            Value::Array(items) => Box::new(items.iter()),
            Value::Struct(members) | Value::Tuple(members) | Value::Magic(members) => {
                Box::new(members.iter().map(|m| &m.value))
            }
            Value::Mapping(entries) => Box::new(entries.iter().flat_map(|e| [&e.key, &e.value])),
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn as_u256(&self) -> Option<U256> {
        match self {
            Value::Uint(v) | Value::Ufixed(v) => Some(*v),
            Value::Enum { index, .. } => Some(U256::from(*index)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Uint(v) | Value::Ufixed(v) => write!(f, "{v}"),
            Value::Int(v) | Value::Fixed(v) => write!(f, "{v}"),
            Value::Address(a) => write!(f, "{}", checksum(a)),
            Value::Contract(c) => match c {
                ContractValue::Known { address, class } => {
                    write!(f, "{class}({})", checksum(address))
                }
                ContractValue::Unknown { address } => write!(f, "{}", checksum(address)),
            },
            Value::Enum { name, index } => {
                if name.is_empty() {
                    write!(f, "{index}")
                } else {
                    write!(f, "{name}")
                }
            }
            Value::FixedBytes(b) | Value::Bytes(b) => write!(f, "{}", to_hex(b)),
            Value::String(StringValue::Valid(s)) => write!(f, "{s:?}"),
            Value::String(StringValue::Malformed(b)) => write!(f, "<malformed {}>", to_hex(b)),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Struct(members) | Value::Tuple(members) | Value::Magic(members) => {
                let parts: Vec<String> = members
                    .iter()
                    .map(|m| {
                        if m.name.is_empty() {
                            m.value.to_string()
                        } else {
                            format!("{}: {}", m.name, m.value)
                        }
                    })
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Mapping(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{} => {}", e.key, e.value))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::FunctionExternal(func) => match func {
                ExternalFunctionValue::Known { contract, name, .. } => {
                    write!(f, "{}.{name}", checksum(&contract.address()))
                }
                other => write!(
                    f,
                    "{}.{}",
                    checksum(&other.contract().address()),
                    to_hex(&other.selector())
                ),
            },
            Value::FunctionInternal(func) => match func {
                InternalFunctionValue::Function { name, defining_contract, .. } => {
                    match defining_contract {
                        Some(c) => write!(f, "{c}.{name}"),
                        None => write!(f, "{name}"),
                    }
                }
                InternalFunctionValue::Exception { .. } => write!(f, "assert(false)"),
                InternalFunctionValue::Unknown { deployed_pc, constructor_pc } => {
                    write!(f, "<internal function {deployed_pc}/{constructor_pc}>")
                }
            },
            Value::Circular { reference } => write!(f, "<circular {reference}>"),
        }
    }
}

/// Serde helpers for `0x`-prefixed hex byte strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        hex::decode(raw.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
