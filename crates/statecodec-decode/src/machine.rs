//! Resumable decodings.
//!
//! A [`Decoding`] wraps a job and the responses collected so far. Each call
//! to [`Decoding::advance`] replays the job from the start against the state
//! snapshot plus every recorded response; the first read that neither can
//! satisfy suspends the decoding with a [`DecoderRequest`]. Nothing is fetched
//! from inside the decoder, so the caller decides how requests are answered,
//! cached, batched or abandoned.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use tracing::debug;

use statecodec_core::conversion::{Word, ZERO_WORD};

use crate::error::{DecodeFailure, Interrupt, ProtocolError};
use crate::request::{DecoderRequest, Response, Step};

/// Responses received by one decoding.
#[derive(Debug, Clone, Default)]
pub struct Session {
    storage: HashMap<U256, Word>,
    code: HashMap<Address, Vec<u8>>,
}

impl Session {
    pub fn storage(&self, slot: &U256) -> Option<&Word> {
        self.storage.get(slot)
    }

    pub fn code(&self, address: &Address) -> Option<&[u8]> {
        self.code.get(address).map(Vec::as_slice)
    }

    /// Number of responses recorded.
    pub fn len(&self) -> usize {
        self.storage.len() + self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn record(
        &mut self,
        request: &DecoderRequest,
        response: Response,
    ) -> Result<(), ProtocolError> {
        match (request, response) {
            (DecoderRequest::Storage { slot }, Response::Storage(word)) => {
                self.storage.insert(*slot, word);
            }
            (DecoderRequest::Code { address }, Response::Code(code)) => {
                self.code.insert(*address, code);
            }
            (request, response) => {
                return Err(ProtocolError::Mismatched {
                    request: request.clone(),
                    got: response.kind(),
                })
            }
        }
        Ok(())
    }
}

/// A unit of decoding work that can be replayed against a growing session.
pub trait DecodeJob {
    type Output;

    /// Run the job to completion, or until it needs something the session
    /// does not hold.
    fn run(&self, session: &Session) -> Result<Self::Output, Interrupt>;
}

/// A suspended or finished decoding.
#[derive(Debug)]
pub struct Decoding<J: DecodeJob> {
    job: J,
    session: Session,
    pending: Option<DecoderRequest>,
    finished: bool,
}

impl<J: DecodeJob> Decoding<J> {
    pub fn new(job: J) -> Self {
        Self {
            job,
            session: Session::default(),
            pending: None,
            finished: false,
        }
    }

    /// The request awaiting a response, if any.
    pub fn pending(&self) -> Option<&DecoderRequest> {
        self.pending.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Start the decoding with `None`, then pass the response to each
    /// request it returns until it is done.
    ///
    /// A protocol error leaves the decoding as it was, so the caller can
    /// retry with the right response.
    pub fn advance(
        &mut self,
        response: Option<Response>,
    ) -> Result<Step<Result<J::Output, DecodeFailure>>, ProtocolError> {
        if self.finished {
            return Err(ProtocolError::Finished);
        }
        match (self.pending.take(), response) {
            (Some(request), Some(response)) => {
                if let Err(e) = self.session.record(&request, response) {
                    self.pending = Some(request);
                    return Err(e);
                }
            }
            (Some(request), None) => {
                self.pending = Some(request.clone());
                return Err(ProtocolError::Missing { request });
            }
            (None, Some(_)) => return Err(ProtocolError::Unsolicited),
            (None, None) => {}
        }

        match self.job.run(&self.session) {
            Ok(output) => {
                self.finished = true;
                Ok(Step::Done(Ok(output)))
            }
            Err(Interrupt::NeedData(request)) => {
                debug!(%request, answered = self.session.len(), "decoding suspended");
                self.pending = Some(request.clone());
                Ok(Step::Request(request))
            }
            Err(Interrupt::Stop(stop)) => {
                debug!(error = %stop.error, allow_retry = stop.allow_retry, "decoding stopped");
                self.finished = true;
                Ok(Step::Done(Err(DecodeFailure::Stop(stop))))
            }
        }
    }

    /// Run the decoding to the end, answering every request from `provider`.
    pub fn drive<P: StateProvider + ?Sized>(
        mut self,
        provider: &mut P,
    ) -> Result<J::Output, DecodeFailure> {
        let mut response = None;
        loop {
            match self.advance(response.take())? {
                Step::Done(result) => return result,
                Step::Request(request) => response = Some(provider.respond(&request)),
            }
        }
    }
}

/// Answers decoder requests one at a time.
pub trait StateProvider {
    fn respond(&mut self, request: &DecoderRequest) -> Response;
}

impl<F> StateProvider for F
where
    F: FnMut(&DecoderRequest) -> Response,
{
    fn respond(&mut self, request: &DecoderRequest) -> Response {
        self(request)
    }
}

/// Serves known storage and code, and the EVM defaults for everything else:
/// zero for unwritten slots, empty code for addresses with no contract.
#[derive(Debug, Clone, Default)]
pub struct DefaultingProvider {
    storage: HashMap<U256, Word>,
    code: HashMap<Address, Vec<u8>>,
}

impl DefaultingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, slot: U256, word: Word) -> Self {
        self.storage.insert(slot, word);
        self
    }

    pub fn with_code(mut self, address: Address, code: Vec<u8>) -> Self {
        self.code.insert(address, code);
        self
    }

    pub fn insert_storage(&mut self, slot: U256, word: Word) {
        self.storage.insert(slot, word);
    }

    pub fn insert_code(&mut self, address: Address, code: Vec<u8>) {
        self.code.insert(address, code);
    }

    /// Shared-reference form of [`StateProvider::respond`].
    pub fn lookup(&self, request: &DecoderRequest) -> Response {
        match request {
            DecoderRequest::Storage { slot } => {
                Response::Storage(self.storage.get(slot).copied().unwrap_or(ZERO_WORD))
            }
            DecoderRequest::Code { address } => {
                Response::Code(self.code.get(address).cloned().unwrap_or_default())
            }
        }
    }
}

impl StateProvider for DefaultingProvider {
    fn respond(&mut self, request: &DecoderRequest) -> Response {
        self.lookup(request)
    }
}
