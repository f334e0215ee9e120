//! Allocation-time errors.

use statecodec_core::errors::DefinitionError;
use statecodec_core::TypeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("struct {id} contains itself in storage")]
    CircularStruct { id: TypeId },

    #[error("definition {id} not found")]
    UnknownDefinition { id: TypeId },

    #[error("static array of {ty} has length zero")]
    ZeroLengthArray { ty: String },

    #[error("type {ty} has a width no compiler produces")]
    InvalidWidth { ty: String },

    #[error("type {ty} cannot be placed in storage")]
    NotStorable { ty: String },

    #[error("size of {ty} overflows")]
    Overflow { ty: String },

    #[error("ABI entry for '{name}' could not be read: {source}")]
    Abi {
        name: String,
        #[source]
        source: DefinitionError,
    },
}
