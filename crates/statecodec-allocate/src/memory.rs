//! Memory layout for structs: one word per member, mappings omitted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use statecodec_core::definitions::UserDefinedTypes;
use statecodec_core::types::{Location, Type, TypeId};
use statecodec_core::WORD_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMemberAllocation {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    /// Byte offset from the start of the struct.
    pub start: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAllocation {
    pub members: Vec<MemoryMemberAllocation>,
}

pub type MemoryAllocations = BTreeMap<TypeId, MemoryAllocation>;

pub fn allocate_memory(types: &UserDefinedTypes) -> MemoryAllocations {
    types
        .structs()
        .map(|def| {
            let members = def
                .members
                .iter()
                .filter(|m| !matches!(m.ty, Type::Mapping(_)))
                .enumerate()
                .map(|(i, m)| MemoryMemberAllocation {
                    name: m.name.clone(),
                    ty: m.ty.with_location(Location::Memory),
                    start: (i * WORD_SIZE) as u64,
                    length: WORD_SIZE as u64,
                })
                .collect();
            (def.id.clone(), MemoryAllocation { members })
        })
        .collect()
}
