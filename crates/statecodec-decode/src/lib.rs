//! # statecodec-decode
//!
//! Resumable decoding of EVM state: storage, memory, calldata, stack, event
//! logs and magic variables, against the allocation tables built by
//! `statecodec-allocate`.
//!
//! A decoding never fetches anything itself. When it needs a storage slot or
//! the code at an address that the [`EvmState`] snapshot does not hold, it
//! suspends with a [`DecoderRequest`], and the caller answers it through
//! [`Decoding::advance`]:
//!
//! ```ignore
//! let mut decoding = Decoding::variable(info, &state, ty, pointer, options);
//! let mut response = None;
//! let value = loop {
//!     match decoding.advance(response.take())? {
//!         Step::Done(result) => break result?,
//!         Step::Request(request) => response = Some(fetch(&request).await?),
//!     }
//! };
//! ```
//!
//! [`Decoding::drive`], [`RoundRobin`] and [`decode_logs_par`] cover the
//! common synchronous cases.

pub mod batch;
pub mod calldata;
pub mod error;
pub mod event;
pub mod info;
pub mod machine;
pub mod request;
pub mod state;
pub mod variable;

mod abi;
mod basic;
mod decoder;
mod memory;
mod read;
mod special;
mod stack;
mod storage;

#[cfg(test)]
mod fixtures;

pub use batch::{decode_logs_par, BatchProvider, RoundRobin};
pub use calldata::{CalldataDecoding, CalldataJob};
pub use error::{DecodeFailure, Interrupt, ProtocolError};
pub use event::{EventArgument, EventJob, LogDecoding, LogKind};
pub use info::{DecoderOptions, DecodingInfo};
pub use machine::{DecodeJob, Decoding, DefaultingProvider, Session, StateProvider};
pub use request::{DecoderRequest, Response, Step};
pub use state::{
    BlockEnvironment, Environment, EvmState, Log, MappingKey, MessageEnvironment,
    TransactionEnvironment,
};
pub use variable::{DecodedVariable, StateVariablesJob, VariableJob};
