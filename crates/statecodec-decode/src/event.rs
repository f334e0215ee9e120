//! Event log decoding.
//!
//! A log is matched against every allocation that could have produced it:
//! the selector bucket for its first topic plus the anonymous bucket, narrowed
//! to the emitting contract when its code is recognised. Library events are
//! always candidates since they are emitted from the calling contract's
//! address. Each candidate is decoded strictly and must re-encode to exactly
//! the log data; candidates that fail either check are dropped.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use statecodec_allocate::{EventAllocation, EventArgumentPointer};
use statecodec_core::config::DecodingMode;
use statecodec_core::context::ContextHash;
use statecodec_core::pointer::ByteLocation;
use statecodec_core::types::{ContractKind, Location};
use statecodec_core::values::Decoded;
use statecodec_encode::encode_tuple;

use crate::decoder::Decoder;
use crate::error::Interrupt;
use crate::info::{DecoderOptions, DecodingInfo};
use crate::machine::{DecodeJob, Decoding, Session};
use crate::state::{EvmState, Log};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Event,
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventArgument {
    pub name: String,
    pub indexed: bool,
    pub value: Decoded,
}

/// One reading of a log as a particular event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDecoding {
    pub kind: LogKind,
    pub name: String,
    pub contract_name: String,
    pub contract_kind: ContractKind,
    pub context_hash: ContextHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<B256>,
    pub arguments: Vec<EventArgument>,
    pub mode: DecodingMode,
}

/// Decodes one log into every event it can be read as.
#[derive(Debug, Clone)]
pub struct EventJob<'a> {
    info: DecodingInfo<'a>,
    state: &'a EvmState,
    log: &'a Log,
    options: DecoderOptions,
}

impl EventJob<'_> {
    fn decoder<'s>(&'s self, session: &'s Session, options: DecoderOptions) -> Decoder<'s> {
        Decoder::new(&self.info, self.state, session, options).with_log(self.log)
    }

    /// Context of the emitting contract, found by its code in full mode.
    fn emitter(&self, session: &Session) -> Result<Option<ContextHash>, Interrupt> {
        if !self.options.is_full() {
            return Ok(None);
        }
        let code = self.decoder(session, self.options).code(self.log.address)?;
        Ok(self.info.contexts.find_by_code(code, false).map(|c| c.context_hash))
    }

    fn candidate(
        &self,
        session: &Session,
        allocation: &EventAllocation,
    ) -> Result<Option<LogDecoding>, Interrupt> {
        let options = self.options.strict();
        let full = allocation.mode == DecodingMode::Full && options.is_full();
        match self.attempt(session, allocation, options, full) {
            Err(Interrupt::Stop(stop)) if stop.allow_retry && self.options.allow_retry && full => {
                debug!(
                    event = %allocation.name,
                    error = %stop.error,
                    "retrying event candidate in abi mode"
                );
                self.settle(allocation, self.attempt(session, allocation, options, false))
            }
            result => self.settle(allocation, result),
        }
    }

    /// Turn a stopped candidate into a rejection, keeping requests.
    fn settle(
        &self,
        allocation: &EventAllocation,
        result: Result<Option<LogDecoding>, Interrupt>,
    ) -> Result<Option<LogDecoding>, Interrupt> {
        match result {
            Err(Interrupt::Stop(stop)) => {
                debug!(
                    event = %allocation.name,
                    contract = %allocation.contract_name,
                    error = %stop.error,
                    "event candidate rejected"
                );
                Ok(None)
            }
            other => other,
        }
    }

    fn attempt(
        &self,
        session: &Session,
        allocation: &EventAllocation,
        options: DecoderOptions,
        full: bool,
    ) -> Result<Option<LogDecoding>, Interrupt> {
        let mode = if full { DecodingMode::Full } else { DecodingMode::Abi };
        let mut decoder = self.decoder(session, options.with_mode(mode));
        let mut arguments = Vec::with_capacity(allocation.arguments.len());
        for argument in &allocation.arguments {
            let ty = if full {
                argument.ty.clone()
            } else {
                argument.ty.abify(self.info.user_types)
            };
            let value = match argument.pointer {
                EventArgumentPointer::Topic { index } => decoder.decode_topic(&ty, index)?,
                EventArgumentPointer::Data(pointer) => decoder.decode_abi(
                    &ty.with_location(Location::Memory),
                    ByteLocation::EventData,
                    pointer.start,
                    0,
                )?,
            };
            arguments.push(EventArgument {
                name: argument.name.clone(),
                indexed: argument.indexed,
                value,
            });
        }

        let data: Vec<Decoded> =
            arguments.iter().filter(|a| !a.indexed).map(|a| a.value.clone()).collect();
        let reencoded = encode_tuple(&data, &self.info.allocations.abi);
        if reencoded.as_deref() != Some(&self.log.data[..]) {
            debug!(
                event = %allocation.name,
                contract = %allocation.contract_name,
                "discarding event candidate whose data does not re-encode"
            );
            return Ok(None);
        }

        Ok(Some(LogDecoding {
            kind: if allocation.anonymous { LogKind::Anonymous } else { LogKind::Event },
            name: allocation.name.clone(),
            contract_name: allocation.contract_name.clone(),
            contract_kind: allocation.contract_kind,
            context_hash: allocation.context_hash,
            selector: allocation.selector,
            arguments,
            mode,
        }))
    }
}

impl DecodeJob for EventJob<'_> {
    type Output = Vec<LogDecoding>;

    fn run(&self, session: &Session) -> Result<Vec<LogDecoding>, Interrupt> {
        let emitter = self.emitter(session)?;
        let mut out = Vec::new();
        for bucket in self.info.allocations.events.candidates(&self.log.topics) {
            let contract: Vec<&EventAllocation> = match emitter {
                Some(hash) => bucket.contract.get(&hash).into_iter().flatten().collect(),
                None => bucket.contract.values().flatten().collect(),
            };
            for allocation in contract.into_iter().chain(bucket.library.values().flatten()) {
                if let Some(decoding) = self.candidate(session, allocation)? {
                    out.push(decoding);
                }
            }
        }
        debug!(address = %self.log.address, decodings = out.len(), "log decoded");
        Ok(out)
    }
}

impl<'a> Decoding<EventJob<'a>> {
    /// Decode `log` as every event it could have been emitted as.
    pub fn event(
        info: DecodingInfo<'a>,
        state: &'a EvmState,
        log: &'a Log,
        options: DecoderOptions,
    ) -> Self {
        Decoding::new(EventJob {
            info,
            state,
            log,
            options,
        })
    }
}
