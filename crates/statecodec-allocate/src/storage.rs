//! Storage layout: reproduces the compiler's packing of state variables and
//! struct members into 32-byte slots.
//!
//! Members are placed with a cursor that starts at byte index 31 of slot 0
//! and moves leftwards. A byte-sized member that does not fit in what is left
//! of the current slot moves to the next one; word-sized members always start
//! a fresh slot and leave the next member to start a fresh slot too.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use statecodec_core::definitions::UserDefinedTypes;
use statecodec_core::pointer::StorageRange;
use statecodec_core::types::{ArrayLength, Location, Type, TypeId, Visibility};
use statecodec_core::WORD_SIZE;

use crate::error::AllocationError;

const LAST_INDEX: u8 = (WORD_SIZE - 1) as u8;

/// Size of a value in storage. Bytes and words are never mixed up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "unit", content = "count", rename_all = "lowercase")]
pub enum StorageLength {
    Bytes(u8),
    Words(U256),
}

impl StorageLength {
    pub fn is_words(&self) -> bool {
        matches!(self, StorageLength::Words(_))
    }

    /// Number of slots the value spans when placed at the start of a slot.
    pub fn words(&self) -> U256 {
        match self {
            StorageLength::Bytes(_) => U256::from(1),
            StorageLength::Words(w) => *w,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageMemberPointer {
    Storage { range: StorageRange },
    /// Constants and immutables live in code, not storage.
    Constant { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMemberAllocation {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub pointer: StorageMemberPointer,
    /// Contract that declared the variable, for contract allocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defining_contract: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAllocation {
    pub members: Vec<StorageMemberAllocation>,
    /// Total size; `None` for contracts.
    pub size: Option<StorageLength>,
}

pub type StorageAllocations = BTreeMap<TypeId, StorageAllocation>;

/// Storage size of `ty`, with struct sizes supplied by `struct_size`.
fn size_with(
    ty: &Type,
    types: &UserDefinedTypes,
    struct_size: &mut dyn FnMut(&TypeId) -> Result<StorageLength, AllocationError>,
) -> Result<StorageLength, AllocationError> {
    if !ty.has_valid_width() {
        return Err(AllocationError::InvalidWidth { ty: ty.to_string() });
    }
    let length = match ty {
        Type::Bool => StorageLength::Bytes(1),
        Type::Address { .. } | Type::Contract(_) => StorageLength::Bytes(20),
        Type::Uint { bits }
        | Type::Int { bits }
        | Type::Fixed { bits, .. }
        | Type::Ufixed { bits, .. } => StorageLength::Bytes((bits / 8) as u8),
        Type::FixedBytes { length } => StorageLength::Bytes(*length),
        Type::Enum(e) => {
            let def = types
                .get_enum(&e.id)
                .ok_or_else(|| AllocationError::UnknownDefinition { id: e.id.clone() })?;
            StorageLength::Bytes(enum_bytes(def.options.len()))
        }
        Type::Function(f) => match f.visibility {
            Visibility::Internal => StorageLength::Bytes(8),
            Visibility::External => StorageLength::Bytes(24),
        },
        Type::Bytes { .. } | Type::String { .. } | Type::Mapping(_) => {
            StorageLength::Words(U256::from(1))
        }
        Type::Array(a) => match &a.length {
            ArrayLength::Dynamic => StorageLength::Words(U256::from(1)),
            ArrayLength::Static(length) => {
                if length.is_zero() {
                    return Err(AllocationError::ZeroLengthArray { ty: ty.to_string() });
                }
                let overflow = || AllocationError::Overflow { ty: ty.to_string() };
                match size_with(&a.base, types, struct_size)? {
                    StorageLength::Bytes(n) => {
                        let per_slot = U256::from(WORD_SIZE / n as usize);
                        let full = *length / per_slot;
                        if (*length % per_slot).is_zero() {
                            StorageLength::Words(full)
                        } else {
                            StorageLength::Words(full + U256::from(1))
                        }
                    }
                    StorageLength::Words(w) => {
                        StorageLength::Words(length.checked_mul(w).ok_or_else(overflow)?)
                    }
                }
            }
        },
        Type::Struct(s) => struct_size(&s.id)?,
        Type::Tuple(_) | Type::Magic { .. } => {
            return Err(AllocationError::NotStorable { ty: ty.to_string() })
        }
    };
    Ok(length)
}

/// Bytes needed to hold an enum index.
fn enum_bytes(options: usize) -> u8 {
    let mut bytes = 1u8;
    let mut capacity: u128 = 256;
    while (options as u128) > capacity && bytes < 32 {
        bytes += 1;
        capacity = capacity.saturating_mul(256);
    }
    bytes
}

/// Storage size of `ty` once every struct has been allocated.
pub fn storage_size(
    ty: &Type,
    types: &UserDefinedTypes,
    allocations: &StorageAllocations,
) -> Result<StorageLength, AllocationError> {
    size_with(ty, types, &mut |id| {
        allocations
            .get(id)
            .and_then(|a| a.size)
            .ok_or_else(|| AllocationError::UnknownDefinition { id: id.clone() })
    })
}

/// Range of element `index` of an array whose elements have size `element`,
/// relative to the array's first slot.
pub fn element_range(element: StorageLength, index: U256) -> StorageRange {
    match element {
        StorageLength::Bytes(n) => {
            let per_slot = U256::from(WORD_SIZE / n as usize);
            let slot = index / per_slot;
            let position = (index % per_slot).to::<u64>() as u8;
            StorageRange::bytes(slot, LAST_INDEX - position * n, n)
        }
        StorageLength::Words(w) => StorageRange::words(index.wrapping_mul(w), w),
    }
}

/// Cursor over storage slots, filling each slot right to left.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    slot: U256,
    /// Next free byte index in `slot`.
    index: u8,
}

impl Cursor {
    fn new() -> Self {
        Self { slot: U256::ZERO, index: LAST_INDEX }
    }

    fn fresh_slot(&mut self) {
        if self.index < LAST_INDEX {
            self.slot += U256::from(1);
            self.index = LAST_INDEX;
        }
    }

    fn place(&mut self, size: StorageLength) -> StorageRange {
        match size {
            StorageLength::Bytes(n) => {
                if n > self.index + 1 {
                    self.fresh_slot();
                }
                let range = StorageRange::bytes(self.slot, self.index, n);
                if n == self.index + 1 {
                    self.slot += U256::from(1);
                    self.index = LAST_INDEX;
                } else {
                    self.index -= n;
                }
                range
            }
            StorageLength::Words(w) => {
                self.fresh_slot();
                let range = StorageRange::words(self.slot, w);
                self.slot += w;
                self.index = LAST_INDEX;
                range
            }
        }
    }

    /// Slots touched so far.
    fn size(&self) -> StorageLength {
        if self.index == LAST_INDEX {
            StorageLength::Words(self.slot)
        } else {
            StorageLength::Words(self.slot + U256::from(1))
        }
    }
}

pub struct StorageAllocator<'a> {
    types: &'a UserDefinedTypes,
    allocations: StorageAllocations,
    in_progress: BTreeSet<TypeId>,
}

impl<'a> StorageAllocator<'a> {
    pub fn new(types: &'a UserDefinedTypes) -> Self {
        Self {
            types,
            allocations: StorageAllocations::new(),
            in_progress: BTreeSet::new(),
        }
    }

    /// Allocate every struct and contract in the definitions table.
    pub fn allocate_all(mut self) -> Result<StorageAllocations, AllocationError> {
        let types = self.types;
        for s in types.structs() {
            self.allocate_struct(&s.id)?;
        }
        for c in types.contracts() {
            self.allocate_contract(&c.id)?;
        }
        Ok(self.allocations)
    }

    fn allocate_struct(&mut self, id: &TypeId) -> Result<StorageLength, AllocationError> {
        if let Some(existing) = self.allocations.get(id).and_then(|a| a.size) {
            return Ok(existing);
        }
        if !self.in_progress.insert(id.clone()) {
            return Err(AllocationError::CircularStruct { id: id.clone() });
        }
        let types = self.types;
        let def = types
            .get_struct(id)
            .ok_or_else(|| AllocationError::UnknownDefinition { id: id.clone() })?;

        let mut cursor = Cursor::new();
        let mut members = Vec::with_capacity(def.members.len());
        for member in &def.members {
            let size = self.size_of(&member.ty)?;
            let range = cursor.place(size);
            trace!(struct_name = %def.name, member = %member.name, %range, "placed struct member");
            members.push(StorageMemberAllocation {
                name: member.name.clone(),
                ty: member.ty.with_location(Location::Storage),
                pointer: StorageMemberPointer::Storage { range },
                defining_contract: None,
            });
        }
        let size = cursor.size();
        self.in_progress.remove(id);
        self.allocations.insert(id.clone(), StorageAllocation { members, size: Some(size) });
        Ok(size)
    }

    fn allocate_contract(&mut self, id: &TypeId) -> Result<(), AllocationError> {
        let types = self.types;
        let contract = types
            .get_contract(id)
            .ok_or_else(|| AllocationError::UnknownDefinition { id: id.clone() })?;
        let mut lineage = contract.linearized_base_contracts.clone();
        if lineage.is_empty() {
            lineage.push(id.clone());
        }

        let mut cursor = Cursor::new();
        let mut members = Vec::new();
        // solc lists the most derived contract first; storage starts with the most basic.
        for base_id in lineage.iter().rev() {
            let base = types
                .get_contract(base_id)
                .ok_or_else(|| AllocationError::UnknownDefinition { id: base_id.clone() })?;
            for variable in &base.state_variables {
                let pointer = if variable.occupies_storage() {
                    let size = self.size_of(&variable.ty)?;
                    StorageMemberPointer::Storage { range: cursor.place(size) }
                } else {
                    StorageMemberPointer::Constant { name: variable.name.clone() }
                };
                members.push(StorageMemberAllocation {
                    name: variable.name.clone(),
                    ty: variable.ty.with_location(Location::Storage),
                    pointer,
                    defining_contract: Some(base.name.clone()),
                });
            }
        }
        trace!(contract = %contract.name, variables = members.len(), "allocated contract storage");
        self.allocations.insert(id.clone(), StorageAllocation { members, size: None });
        Ok(())
    }

    fn size_of(&mut self, ty: &Type) -> Result<StorageLength, AllocationError> {
        let types = self.types;
        size_with(ty, types, &mut |id| self.allocate_struct(id))
    }
}

/// Allocate storage for every struct and contract in `types`.
pub fn allocate_storage(types: &UserDefinedTypes) -> Result<StorageAllocations, AllocationError> {
    StorageAllocator::new(types).allocate_all()
}
