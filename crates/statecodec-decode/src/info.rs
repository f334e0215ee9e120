//! Read-only inputs shared by every decoding.

use statecodec_allocate::Allocations;
use statecodec_core::config::{CodecConfig, DecodingMode};
use statecodec_core::context::{Context, ContextHash, Contexts};
use statecodec_core::definitions::UserDefinedTypes;

/// Type definitions, allocation tables and known contexts. Cheap to copy.
#[derive(Debug, Clone, Copy)]
pub struct DecodingInfo<'a> {
    pub user_types: &'a UserDefinedTypes,
    pub allocations: &'a Allocations,
    pub contexts: &'a Contexts,
    /// Context of the code being executed, if known.
    pub current_context: Option<ContextHash>,
}

impl<'a> DecodingInfo<'a> {
    pub fn new(
        user_types: &'a UserDefinedTypes,
        allocations: &'a Allocations,
        contexts: &'a Contexts,
    ) -> Self {
        Self {
            user_types,
            allocations,
            contexts,
            current_context: None,
        }
    }

    pub fn in_context(mut self, context: ContextHash) -> Self {
        self.current_context = Some(context);
        self
    }

    pub fn context(&self) -> Option<&'a Context> {
        self.current_context.and_then(|hash| self.contexts.get(&hash))
    }
}

/// Per-decoding knobs, derived from a [`CodecConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    pub permissive_padding: bool,
    pub strict_abi: bool,
    pub max_length: u64,
    pub allow_retry: bool,
    pub mode: DecodingMode,
}

impl DecoderOptions {
    pub fn strict(mut self) -> Self {
        self.strict_abi = true;
        self
    }

    pub fn with_mode(mut self, mode: DecodingMode) -> Self {
        self.mode = mode;
        self
    }

    pub(crate) fn is_full(&self) -> bool {
        self.mode == DecodingMode::Full
    }
}

impl From<&CodecConfig> for DecoderOptions {
    fn from(config: &CodecConfig) -> Self {
        Self {
            permissive_padding: config.permissive_padding,
            strict_abi: config.strict_abi,
            max_length: config.max_length,
            allow_retry: config.allow_retry,
            mode: config.mode,
        }
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::from(&CodecConfig::default())
    }
}
