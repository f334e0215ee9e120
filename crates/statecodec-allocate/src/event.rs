//! Event layouts.
//!
//! Events are keyed by topic count, then selector (or anonymous), then the
//! kind of the declaring contract, then context. A log can match a contract
//! event and an event of a linked library with the same signature, so both
//! buckets are kept and the decoder picks between candidates.

use alloy_json_abi::Event;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use statecodec_core::abi::event_definition;
use statecodec_core::config::DecodingMode;
use statecodec_core::context::ContextHash;
use statecodec_core::conversion::keccak256;
use statecodec_core::definitions::{EventParameter, UserDefinedTypes};
use statecodec_core::pointer::AbiPointer;
use statecodec_core::types::{ContractKind, Location, NamedType, Type};

use crate::abi::{allocate_tuple, AbiAllocations};
use crate::calldata::{lineage, name_parameters, ContractAllocationInfo};
use crate::error::AllocationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "selector", rename_all = "lowercase")]
pub enum EventKey {
    Selector(B256),
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventArgumentPointer {
    Topic { index: usize },
    /// Relative to the start of the log data.
    Data(AbiPointer),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventArgumentAllocation {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub indexed: bool,
    pub pointer: EventArgumentPointer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAllocation {
    pub name: String,
    pub contract_name: String,
    pub contract_kind: ContractKind,
    pub context_hash: ContextHash,
    pub anonymous: bool,
    pub selector: Option<B256>,
    pub arguments: Vec<EventArgumentAllocation>,
    pub mode: DecodingMode,
}

impl EventAllocation {
    /// Non-indexed arguments as the tuple found in the log data.
    pub fn data_types(&self) -> Vec<NamedType> {
        self.arguments
            .iter()
            .filter(|a| !a.indexed)
            .map(|a| NamedType::new(a.name.clone(), a.ty.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsByKind {
    pub contract: BTreeMap<ContextHash, Vec<EventAllocation>>,
    pub library: BTreeMap<ContextHash, Vec<EventAllocation>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventAllocations(BTreeMap<usize, BTreeMap<EventKey, EventsByKind>>);

impl EventAllocations {
    pub fn get(&self, topic_count: usize, key: &EventKey) -> Option<&EventsByKind> {
        self.0.get(&topic_count).and_then(|by_key| by_key.get(key))
    }

    /// Every bucket a log with these topics could belong to: the selector
    /// bucket for its first topic, then the anonymous bucket.
    pub fn candidates(&self, topics: &[B256]) -> Vec<&EventsByKind> {
        let mut out = Vec::new();
        if let Some(first) = topics.first() {
            out.extend(self.get(topics.len(), &EventKey::Selector(*first)));
        }
        out.extend(self.get(topics.len(), &EventKey::Anonymous));
        out
    }

    fn insert(&mut self, topic_count: usize, key: EventKey, allocation: EventAllocation) {
        let by_kind = self.0.entry(topic_count).or_default().entry(key).or_default();
        let bucket = match allocation.contract_kind {
            ContractKind::Library => &mut by_kind.library,
            ContractKind::Contract | ContractKind::Interface => &mut by_kind.contract,
        };
        bucket.entry(allocation.context_hash).or_default().push(allocation);
    }

    pub fn len(&self) -> usize {
        self.0
            .values()
            .flat_map(|by_key| by_key.values())
            .flat_map(|k| k.contract.values().chain(k.library.values()))
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical signature of a definition, `None` if a parameter type has no
/// ABI form.
fn signature(
    name: &str,
    parameters: &[EventParameter],
    types: &UserDefinedTypes,
) -> Option<String> {
    let parts: Option<Vec<String>> =
        parameters.iter().map(|p| p.ty.abi_type_string(types)).collect();
    Some(format!("{name}({})", parts?.join(",")))
}

fn layout(
    event: &Event,
    parameters: Vec<EventParameter>,
    mode: DecodingMode,
    info: &ContractAllocationInfo,
    context_hash: ContextHash,
    abi_allocations: &AbiAllocations,
) -> Option<EventAllocation> {
    let data: Vec<NamedType> = name_parameters(
        parameters.iter().map(|p| NamedType::new(p.name.clone(), p.ty.clone())).collect(),
    );
    let data_members: Vec<NamedType> =
        data.iter().zip(&parameters).filter(|(_, p)| !p.indexed).map(|(n, _)| n.clone()).collect();
    let tuple = allocate_tuple(&data_members, abi_allocations)?;
    let mut data_pointers = tuple.members.into_iter().map(|m| m.pointer);

    let mut topic = usize::from(!event.anonymous);
    let mut arguments = Vec::with_capacity(parameters.len());
    for (named, param) in data.iter().zip(&parameters) {
        let pointer = if param.indexed {
            let p = EventArgumentPointer::Topic { index: topic };
            topic += 1;
            p
        } else {
            EventArgumentPointer::Data(data_pointers.next()?)
        };
        arguments.push(EventArgumentAllocation {
            name: named.name.clone(),
            ty: param.ty.with_location(Location::Memory),
            indexed: param.indexed,
            pointer,
        });
    }
    Some(EventAllocation {
        name: event.name.clone(),
        contract_name: info.contract_name.clone(),
        contract_kind: info.contract_kind,
        context_hash,
        anonymous: event.anonymous,
        selector: (!event.anonymous).then(|| event.selector()),
        arguments,
        mode,
    })
}

pub fn allocate_events(
    contracts: &[ContractAllocationInfo],
    types: &UserDefinedTypes,
    abi_allocations: &AbiAllocations,
) -> Result<EventAllocations, AllocationError> {
    let mut out = EventAllocations::default();
    for info in contracts {
        let Some(context_hash) = info.deployed_context else {
            trace!(contract = %info.contract_name, "no deployed context, skipping events");
            continue;
        };
        let defined: Vec<_> = info
            .definition_id
            .as_ref()
            .map(|id| lineage(types, id).into_iter().flat_map(|c| c.events.iter()).collect())
            .unwrap_or_default();

        for event in info.abi.events() {
            let selector = event.selector();
            let full = defined.iter().find(|d| {
                d.anonymous == event.anonymous
                    && d.parameters.len() == event.inputs.len()
                    && signature(&d.name, &d.parameters, types)
                        .is_some_and(|s| keccak256(s.as_bytes()) == selector)
            });
            let mut allocation = full.and_then(|def| {
                layout(
                    event,
                    def.parameters.clone(),
                    DecodingMode::Full,
                    info,
                    context_hash,
                    abi_allocations,
                )
            });
            if allocation.is_none() {
                let def = event_definition(event)
                    .map_err(|source| AllocationError::Abi { name: event.name.clone(), source })?;
                allocation = layout(
                    event,
                    def.parameters,
                    DecodingMode::Abi,
                    info,
                    context_hash,
                    abi_allocations,
                );
            }
            let Some(allocation) = allocation else {
                debug!(event = %event.name, "event data has no ABI layout");
                continue;
            };
            let indexed = event.inputs.iter().filter(|p| p.indexed).count();
            let (topic_count, key) = if event.anonymous {
                (indexed, EventKey::Anonymous)
            } else {
                (indexed + 1, EventKey::Selector(selector))
            };
            trace!(event = %event.name, topic_count, mode = ?allocation.mode, "allocated event");
            out.insert(topic_count, key, allocation);
        }
    }
    Ok(out)
}
