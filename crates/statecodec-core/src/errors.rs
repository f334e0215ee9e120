//! The decode error taxonomy.
//!
//! Each family is its own enum; [`DecodingError`] is their sum. Whether an
//! error is fatal, retry-eligible or merely informational is decided by
//! exhaustive matches below, so adding a variant forces a decision.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversion::to_hex;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingType {
    /// Zero bytes on the left.
    Left,
    /// Zero bytes on the right.
    Right,
    /// Sign-extension on the left.
    Signed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("bad {padding:?} padding in {}", to_hex(.raw))]
pub struct PaddingError {
    pub raw: Vec<u8>,
    pub padding: PaddingType,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum ReadError {
    #[error("cannot read constant '{name}'")]
    UnsupportedConstant { name: String },

    #[error("stack read out of range: {from}..={to}")]
    Stack { from: u64, to: u64 },

    #[error("{location} read out of range at {start} (+{length})")]
    Bytes {
        location: String,
        start: u64,
        length: u64,
    },

    #[error("storage read failed: {reason}")]
    Storage { reason: String },

    #[error("no topic at index {index}")]
    Topic { index: usize },

    #[error("environment variable '{variable}' unavailable")]
    Environment { variable: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum GenericError {
    #[error("no definition for user-defined type {id}")]
    UserDefinedTypeNotFound { id: TypeId },

    /// An indexed reference type only has its hash in the topic.
    #[error("indexed {ty} is only available as its hash {}", to_hex(.raw))]
    IndexedReferenceType { ty: String, raw: Vec<u8> },

    #[error("type {ty} cannot be decoded here")]
    UnrepresentableType { ty: String },

    #[error(transparent)]
    Read(#[from] ReadError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BoolError {
    #[error("bool out of range: {raw}")]
    OutOfRange { raw: U256 },
    #[error(transparent)]
    Padding(PaddingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NumericError {
    #[error(transparent)]
    Padding(PaddingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AddressError {
    #[error(transparent)]
    Padding(PaddingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BytesError {
    #[error(transparent)]
    Padding(PaddingError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum EnumError {
    #[error("enum {id} has no option {raw}")]
    OutOfRange { id: TypeId, raw: U256 },
    #[error(transparent)]
    Padding(PaddingError),
    #[error("enum {id} not found (raw {raw})")]
    NotFound { id: TypeId, raw: U256 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FunctionExternalError {
    #[error(transparent)]
    NonStackPadding(PaddingError),
    #[error(
        "bad stack padding: address {}, selector {}",
        to_hex(.raw_address),
        to_hex(.raw_selector)
    )]
    StackPadding {
        raw_address: Vec<u8>,
        raw_selector: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FunctionInternalError {
    #[error(transparent)]
    Padding(PaddingError),
    #[error("no internal function at pc {deployed_pc}/{constructor_pc}")]
    NoSuchInternalFunction { deployed_pc: u64, constructor_pc: u64 },
    #[error("deployed function pointer {deployed_pc} used in constructor")]
    DeployedFunctionInConstructor { deployed_pc: u64, constructor_pc: u64 },
    #[error("malformed internal function pointer {deployed_pc}/{constructor_pc}")]
    MalformedInternalFunction { deployed_pc: u64, constructor_pc: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DynamicDataError {
    #[error("length {length} exceeds the configured maximum")]
    OverlongArraysAndStringsNotImplemented { length: U256 },
    #[error("pointer {pointer} does not fit in 64 bits")]
    OverlargePointersNotImplemented { pointer: U256 },
    #[error("length {length} exceeds the {data_length} bytes available")]
    OverlongArrayOrStringStrictMode { length: U256, data_length: u64 },
    #[error("malformed short storage encoding {}", to_hex(.raw))]
    MalformedShortStorageEncoding { raw: Vec<u8> },
}

/// Any decode error, embedded in a [`Decoded`](crate::values::Decoded) or
/// carried by a stop.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "family", content = "error", rename_all = "snake_case")]
pub enum DecodingError {
    #[error(transparent)]
    Generic(#[from] GenericError),
    #[error(transparent)]
    Bool(#[from] BoolError),
    #[error(transparent)]
    Numeric(#[from] NumericError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Bytes(#[from] BytesError),
    #[error(transparent)]
    Enum(#[from] EnumError),
    #[error(transparent)]
    FunctionExternal(#[from] FunctionExternalError),
    #[error(transparent)]
    FunctionInternal(#[from] FunctionInternalError),
    #[error(transparent)]
    DynamicData(#[from] DynamicDataError),
}

impl From<ReadError> for DecodingError {
    fn from(e: ReadError) -> Self {
        DecodingError::Generic(GenericError::Read(e))
    }
}

impl DecodingError {
    /// Errors that abort the whole decode instead of being embedded.
    pub fn is_fatal(&self) -> bool {
        match self {
            DecodingError::Generic(g) => match g {
                GenericError::UserDefinedTypeNotFound { .. } => true,
                GenericError::Read(_) => true,
                GenericError::IndexedReferenceType { .. } => false,
                GenericError::UnrepresentableType { .. } => false,
            },
            DecodingError::DynamicData(d) => match d {
                DynamicDataError::OverlongArraysAndStringsNotImplemented { .. }
                | DynamicDataError::OverlargePointersNotImplemented { .. }
                | DynamicDataError::OverlongArrayOrStringStrictMode { .. } => true,
                DynamicDataError::MalformedShortStorageEncoding { .. } => false,
            },
            DecodingError::Bool(_)
            | DecodingError::Numeric(_)
            | DecodingError::Address(_)
            | DecodingError::Bytes(_)
            | DecodingError::Enum(_)
            | DecodingError::FunctionExternal(_)
            | DecodingError::FunctionInternal(_) => false,
        }
    }

    /// Errors that the ABI form of the same data cannot raise, so an
    /// abi-mode retry may succeed where full mode failed.
    pub fn is_retry_eligible(&self) -> bool {
        match self {
            DecodingError::Generic(GenericError::UserDefinedTypeNotFound { .. }) => true,
            DecodingError::Generic(_) => false,
            DecodingError::Enum(e) => match e {
                EnumError::OutOfRange { .. } | EnumError::NotFound { .. } => true,
                EnumError::Padding(_) => false,
            },
            DecodingError::Bool(_)
            | DecodingError::Numeric(_)
            | DecodingError::Address(_)
            | DecodingError::Bytes(_)
            | DecodingError::FunctionExternal(_)
            | DecodingError::FunctionInternal(_)
            | DecodingError::DynamicData(_) => false,
        }
    }

    /// Errors describing data that is valid but cannot be shown in full.
    /// Strict mode does not promote these.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            DecodingError::Generic(GenericError::IndexedReferenceType { .. })
        )
    }

    pub fn family(&self) -> &'static str {
        match self {
            DecodingError::Generic(_) => "generic",
            DecodingError::Bool(_) => "bool",
            DecodingError::Numeric(_) => "numeric",
            DecodingError::Address(_) => "address",
            DecodingError::Bytes(_) => "bytes",
            DecodingError::Enum(_) => "enum",
            DecodingError::FunctionExternal(_) => "function_external",
            DecodingError::FunctionInternal(_) => "function_internal",
            DecodingError::DynamicData(_) => "dynamic_data",
        }
    }
}

/// A decode abort, with whether an abi-mode retry is sanctioned.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("decoding stopped: {error}")]
pub struct StopDecodingError {
    pub error: DecodingError,
    pub allow_retry: bool,
}

impl StopDecodingError {
    pub fn new(error: impl Into<DecodingError>) -> Self {
        let error = error.into();
        let allow_retry = error.is_retry_eligible();
        Self { error, allow_retry }
    }
}

/// Errors raised while translating compiler metadata.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("unknown type name '{name}'")]
    UnknownTypeName { name: String },

    #[error("referenced declaration {id} not found")]
    MissingDeclaration { id: i64 },

    #[error("array length '{raw}' is not a number")]
    BadArrayLength { raw: String },

    #[error("unsupported AST node: {reason}")]
    Unsupported { reason: String },

    #[error("ABI parameter type '{ty}' could not be parsed")]
    BadAbiType { ty: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}
