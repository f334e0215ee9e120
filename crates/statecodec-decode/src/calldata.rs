//! Transaction calldata decoding.

use serde::{Deserialize, Serialize};
use tracing::debug;

use statecodec_allocate::CalldataAllocation;
use statecodec_core::config::DecodingMode;
use statecodec_core::conversion::SELECTOR_SIZE;
use statecodec_core::pointer::ByteLocation;
use statecodec_core::types::Location;
use statecodec_core::values::{hex_bytes, NameValuePair};

use crate::decoder::Decoder;
use crate::error::Interrupt;
use crate::info::{DecoderOptions, DecodingInfo};
use crate::machine::{DecodeJob, Decoding, Session};
use crate::state::EvmState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CalldataDecoding {
    Function {
        name: String,
        contract_name: String,
        selector: [u8; SELECTOR_SIZE],
        arguments: Vec<NameValuePair>,
        mode: DecodingMode,
    },
    Constructor {
        contract_name: String,
        arguments: Vec<NameValuePair>,
        mode: DecodingMode,
    },
    /// A call to a known contract matching none of its functions, handled
    /// by its fallback or receive function.
    Message {
        contract_name: String,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
    /// No context for the code being called.
    Unknown {
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
}

impl CalldataDecoding {
    pub fn arguments(&self) -> &[NameValuePair] {
        match self {
            CalldataDecoding::Function { arguments, .. }
            | CalldataDecoding::Constructor { arguments, .. } => arguments,
            CalldataDecoding::Message { .. } | CalldataDecoding::Unknown { .. } => &[],
        }
    }
}

/// Decodes `state.calldata` against the current context.
#[derive(Debug, Clone)]
pub struct CalldataJob<'a> {
    info: DecodingInfo<'a>,
    state: &'a EvmState,
    options: DecoderOptions,
}

impl CalldataJob<'_> {
    fn attempt(
        &self,
        session: &Session,
        options: DecoderOptions,
    ) -> Result<CalldataDecoding, Interrupt> {
        let data = &self.state.calldata;
        let Some(context) = self.info.context() else {
            return Ok(CalldataDecoding::Unknown { data: data.to_vec() });
        };
        let calldata = &self.info.allocations.calldata;

        // the argument region starts after the init code for a constructor
        let (allocation, region_start) = if context.is_constructor {
            match calldata.constructor(&context.context_hash) {
                Some(allocation) => (allocation, context.binary.len() as u64),
                None => return Ok(CalldataDecoding::Unknown { data: data.to_vec() }),
            }
        } else {
            let message = || CalldataDecoding::Message {
                contract_name: context.contract_name.clone(),
                data: data.to_vec(),
            };
            let Some(selector) = data.get(..SELECTOR_SIZE) else {
                return Ok(message());
            };
            let mut key = [0u8; SELECTOR_SIZE];
            key.copy_from_slice(selector);
            match calldata.function(&context.context_hash, &key) {
                Some(allocation) => (allocation, 0),
                None => return Ok(message()),
            }
        };

        let (arguments, mode) = self.arguments(session, options, allocation, region_start)?;
        Ok(match allocation.selector {
            Some(selector) => CalldataDecoding::Function {
                name: allocation.name.clone(),
                contract_name: allocation.contract_name.clone(),
                selector,
                arguments,
                mode,
            },
            None => CalldataDecoding::Constructor {
                contract_name: allocation.contract_name.clone(),
                arguments,
                mode,
            },
        })
    }

    fn arguments(
        &self,
        session: &Session,
        options: DecoderOptions,
        allocation: &CalldataAllocation,
        region_start: u64,
    ) -> Result<(Vec<NameValuePair>, DecodingMode), Interrupt> {
        let full = allocation.mode == DecodingMode::Full && options.is_full();
        let mode = if full { DecodingMode::Full } else { DecodingMode::Abi };
        let mut decoder = Decoder::new(&self.info, self.state, session, options.with_mode(mode));
        let base = Decoder::offset(region_start, allocation.offset)?;
        let mut arguments = Vec::with_capacity(allocation.arguments.len());
        for argument in &allocation.arguments {
            let ty = if full {
                argument.ty.clone()
            } else {
                argument.ty.abify(self.info.user_types).with_location(Location::Calldata)
            };
            let start = Decoder::offset(region_start, argument.pointer.start)?;
            let value = decoder.decode_abi(&ty, ByteLocation::Calldata, start, base)?;
            arguments.push(NameValuePair::new(argument.name.clone(), value));
        }
        Ok((arguments, mode))
    }
}

impl DecodeJob for CalldataJob<'_> {
    type Output = CalldataDecoding;

    fn run(&self, session: &Session) -> Result<CalldataDecoding, Interrupt> {
        match self.attempt(session, self.options) {
            Err(Interrupt::Stop(stop))
                if stop.allow_retry && self.options.allow_retry && self.options.is_full() =>
            {
                debug!(error = %stop.error, "retrying calldata in abi mode");
                self.attempt(session, self.options.with_mode(DecodingMode::Abi))
            }
            other => other,
        }
    }
}

impl<'a> Decoding<CalldataJob<'a>> {
    /// Decode the calldata of `state` as a call into `info.current_context`.
    pub fn calldata(info: DecodingInfo<'a>, state: &'a EvmState, options: DecoderOptions) -> Self {
        Decoding::new(CalldataJob { info, state, options })
    }
}
