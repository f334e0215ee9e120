//! The request/response protocol between a decoding and its caller.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use statecodec_core::conversion::Word;

/// Chain data a decoding needs before it can continue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DecoderRequest {
    /// The 32-byte word at a storage slot of the contract being decoded.
    Storage { slot: U256 },
    /// Deployed bytecode at an address, empty if there is none.
    Code { address: Address },
}

impl fmt::Display for DecoderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderRequest::Storage { slot } => write!(f, "storage slot {slot:#x}"),
            DecoderRequest::Code { address } => write!(f, "code at {address}"),
        }
    }
}

/// The answer to a [`DecoderRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Storage(Word),
    Code(Vec<u8>),
}

impl Response {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Response::Storage(_) => "storage",
            Response::Code(_) => "code",
        }
    }
}

/// One step of a decoding: either it needs data, or it has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Request(DecoderRequest),
    Done(T),
}

impl<T> Step<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done(_))
    }

    pub fn request(&self) -> Option<&DecoderRequest> {
        match self {
            Step::Request(r) => Some(r),
            Step::Done(_) => None,
        }
    }
}
