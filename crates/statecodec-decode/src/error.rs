//! Error types for driving a decoding.

use thiserror::Error;

use statecodec_core::errors::{DecodingError, StopDecodingError};

use crate::request::DecoderRequest;

/// Why a decode step could not finish. Not an error as far as the caller is
/// concerned: `NeedData` is answered and the step is replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    NeedData(DecoderRequest),
    Stop(StopDecodingError),
}

impl Interrupt {
    pub fn stop(error: impl Into<DecodingError>) -> Self {
        Interrupt::Stop(StopDecodingError::new(error))
    }
}

impl From<StopDecodingError> for Interrupt {
    fn from(e: StopDecodingError) -> Self {
        Interrupt::Stop(e)
    }
}

/// Misuse of the request/response protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Decoding has already finished")]
    Finished,

    #[error("Response given but nothing was requested")]
    Unsolicited,

    #[error("{got} response does not answer request for {request}")]
    Mismatched { request: DecoderRequest, got: &'static str },

    #[error("No response given for {request}")]
    Missing { request: DecoderRequest },
}

/// A decoding that ended without a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeFailure {
    #[error(transparent)]
    Stop(#[from] StopDecodingError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl DecodeFailure {
    pub fn as_stop(&self) -> Option<&StopDecodingError> {
        match self {
            DecodeFailure::Stop(s) => Some(s),
            DecodeFailure::Protocol(_) => None,
        }
    }
}
