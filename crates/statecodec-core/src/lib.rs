//! # statecodec-core
//!
//! Type model, decoded values, the decode error taxonomy and byte-level
//! primitives shared by every StateCodec crate. The allocator, decoder and
//! encoder are all built on the definitions here.

pub mod abi;
pub mod ast;
pub mod config;
pub mod context;
pub mod conversion;
pub mod definitions;
pub mod errors;
pub mod pointer;
pub mod types;
pub mod values;

pub use config::{CodecConfig, DecodingMode};
pub use context::{Context, ContextHash, Contexts};
pub use conversion::{Word, WORD_SIZE};
pub use definitions::{ContractDefinition, StructDefinition, UserDefinedType, UserDefinedTypes};
pub use errors::{DecodingError, StopDecodingError};
pub use pointer::{AbiPointer, ByteLocation, DataPointer, StorageRange};
pub use types::{Location, NamedType, Type, TypeId};
pub use values::{Decoded, NameValuePair, Value};
