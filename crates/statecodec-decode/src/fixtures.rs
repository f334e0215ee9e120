//! Shared setup for unit tests.

use statecodec_allocate::Allocations;
use statecodec_core::context::{Context, ContextHash, Contexts};
use statecodec_core::definitions::UserDefinedTypes;

use crate::decoder::Decoder;
use crate::info::{DecoderOptions, DecodingInfo};
use crate::machine::Session;
use crate::state::{EvmState, Log};

#[derive(Default)]
pub(crate) struct Fixture {
    pub types: UserDefinedTypes,
    pub allocations: Allocations,
    pub contexts: Contexts,
    pub state: EvmState,
    pub session: Session,
    pub log: Option<Log>,
    pub context: Option<ContextHash>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types(mut self, types: UserDefinedTypes) -> Self {
        self.allocations = Allocations::build(&types, &[]).unwrap();
        self.types = types;
        self
    }

    pub fn with_state(mut self, state: EvmState) -> Self {
        self.state = state;
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(self.contexts.insert(context));
        self
    }

    pub fn with_log(mut self, log: Log) -> Self {
        self.log = Some(log);
        self
    }

    pub fn info(&self) -> DecodingInfo<'_> {
        DecodingInfo {
            user_types: &self.types,
            allocations: &self.allocations,
            contexts: &self.contexts,
            current_context: self.context,
        }
    }

    pub fn run<T>(&self, options: DecoderOptions, f: impl FnOnce(&mut Decoder<'_>) -> T) -> T {
        let info = self.info();
        let mut decoder = Decoder::new(&info, &self.state, &self.session, options);
        if let Some(log) = &self.log {
            decoder = decoder.with_log(log);
        }
        f(&mut decoder)
    }
}
