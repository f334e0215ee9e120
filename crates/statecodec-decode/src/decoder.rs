//! The per-run decoder.
//!
//! A `Decoder` lives for one run of a job. It reads from the state snapshot
//! and the session's recorded responses, and interrupts with
//! [`Interrupt::NeedData`] the moment it needs anything else. Runs are
//! replayed from the start once the data arrives, so a `Decoder` carries no
//! state worth keeping between runs.

use alloy_primitives::{Address, U256};

use statecodec_core::conversion::Word;
use statecodec_core::errors::{DecodingError, GenericError, ReadError};
use statecodec_core::pointer::{ByteLocation, DataPointer};
use statecodec_core::types::{Location, Type, TypeId};
use statecodec_core::values::{Decoded, Value};

use crate::error::Interrupt;
use crate::info::{DecoderOptions, DecodingInfo};
use crate::machine::Session;
use crate::request::DecoderRequest;
use crate::state::{EvmState, Log};

pub(crate) type DecodeResult = Result<Decoded, Interrupt>;

pub(crate) struct Decoder<'r> {
    pub(crate) info: &'r DecodingInfo<'r>,
    pub(crate) state: &'r EvmState,
    pub(crate) session: &'r Session,
    pub(crate) options: DecoderOptions,
    pub(crate) log: Option<&'r Log>,
    /// Containers currently being decoded, as (type identity, place).
    visited: Vec<(String, String)>,
}

impl<'r> Decoder<'r> {
    pub(crate) fn new(
        info: &'r DecodingInfo<'r>,
        state: &'r EvmState,
        session: &'r Session,
        options: DecoderOptions,
    ) -> Self {
        Self {
            info,
            state,
            session,
            options,
            log: None,
            visited: Vec::new(),
        }
    }

    pub(crate) fn with_log(mut self, log: &'r Log) -> Self {
        self.log = Some(log);
        self
    }

    /// Decode the value of type `ty` found at `pointer`.
    pub(crate) fn decode(&mut self, ty: &Type, pointer: &DataPointer) -> DecodeResult {
        match pointer {
            DataPointer::Storage(range) => self.decode_storage(ty, *range),
            DataPointer::Bytes { area: ByteLocation::Memory, start, .. } => {
                self.decode_memory(ty, *start)
            }
            DataPointer::Bytes {
                area: area @ (ByteLocation::Calldata | ByteLocation::EventData),
                start,
                ..
            } => self.decode_abi(ty, *area, *start, 0),
            DataPointer::Bytes { area: ByteLocation::Code, start, length } => {
                let raw = self.read_bytes(ByteLocation::Code, *start, *length)?;
                self.decode_basic(ty, &raw)
            }
            DataPointer::Topic { index } => self.decode_topic(ty, *index),
            DataPointer::Stack { from, to } => self.decode_stack(ty, *from, *to),
            DataPointer::StackLiteral { literal } => self.decode_stack_literal(ty, literal),
            DataPointer::Constant { name } => Err(Interrupt::stop(ReadError::UnsupportedConstant {
                name: name.clone(),
            })),
            DataPointer::Special { variable } => self.decode_special(*variable),
        }
    }

    /// Put `error` where the value would be, unless it is fatal or strict
    /// mode promotes it.
    pub(crate) fn fail(&self, ty: &Type, error: impl Into<DecodingError>) -> DecodeResult {
        let error = error.into();
        if error.is_fatal() || (self.options.strict_abi && !error.is_informational()) {
            return Err(Interrupt::stop(error));
        }
        Ok(Decoded::error(ty.clone(), error))
    }

    pub(crate) fn unrepresentable(&self, ty: &Type) -> DecodeResult {
        self.fail(ty, GenericError::UnrepresentableType { ty: ty.to_string() })
    }

    pub(crate) fn not_found(id: &TypeId) -> Interrupt {
        Interrupt::stop(GenericError::UserDefinedTypeNotFound { id: id.clone() })
    }

    /// Run `body` for a container at `place`, or return a circular marker if
    /// the same container is already being decoded further up.
    pub(crate) fn guarded(
        &mut self,
        ty: &Type,
        place: String,
        body: impl FnOnce(&mut Self) -> DecodeResult,
    ) -> DecodeResult {
        let key = (ty.identity(), place);
        if let Some(position) = self.visited.iter().rposition(|v| *v == key) {
            let reference = self.visited.len() - position;
            return Ok(Decoded::value(ty.clone(), Value::Circular { reference }));
        }
        self.visited.push(key);
        let result = body(self);
        self.visited.pop();
        result
    }

    pub(crate) fn storage_word(&self, slot: U256) -> Result<Word, Interrupt> {
        if let Some(word) = self.state.storage_word(&slot) {
            return Ok(word);
        }
        self.session
            .storage(&slot)
            .copied()
            .ok_or(Interrupt::NeedData(DecoderRequest::Storage { slot }))
    }

    pub(crate) fn code(&self, address: Address) -> Result<&'r [u8], Interrupt> {
        let state: &'r EvmState = self.state;
        if let Some(code) = state.code.get(&address) {
            return Ok(&code[..]);
        }
        self.session
            .code(&address)
            .ok_or(Interrupt::NeedData(DecoderRequest::Code { address }))
    }

    /// Location a reference type takes when read from `area`.
    pub(crate) fn location_of(area: ByteLocation) -> Location {
        match area {
            ByteLocation::Calldata => Location::Calldata,
            ByteLocation::Memory | ByteLocation::EventData | ByteLocation::Code => Location::Memory,
        }
    }
}
