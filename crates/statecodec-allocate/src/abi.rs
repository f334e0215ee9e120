//! ABI layout of structs and argument tuples.
//!
//! A struct that cannot appear in the ABI (it holds a mapping, an internal
//! function, or itself) is recorded as `None`, and that `None` spreads to
//! everything that contains it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

use statecodec_core::definitions::UserDefinedTypes;
use statecodec_core::pointer::AbiPointer;
use statecodec_core::types::{ArrayLength, NamedType, Type, TypeId, Visibility};
use statecodec_core::WORD_SIZE;

const WORD: u64 = WORD_SIZE as u64;

/// Head size of a value and whether it lives in the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiSizeInfo {
    pub size: u64,
    pub dynamic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiMemberAllocation {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub pointer: AbiPointer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiAllocation {
    pub members: Vec<AbiMemberAllocation>,
    /// Size of the head.
    pub length: u64,
    pub dynamic: bool,
}

pub type AbiAllocations = BTreeMap<TypeId, Option<AbiAllocation>>;

/// Head size and dynamism of `ty`, or `None` if it has no ABI encoding.
pub fn abi_size_info(ty: &Type, allocations: &AbiAllocations) -> Option<AbiSizeInfo> {
    size_with(ty, &mut |id| allocations.get(id).cloned().flatten())
}

fn size_with(
    ty: &Type,
    lookup: &mut dyn FnMut(&TypeId) -> Option<AbiAllocation>,
) -> Option<AbiSizeInfo> {
    let info = match ty {
        Type::Bool
        | Type::Address { .. }
        | Type::Contract(_)
        | Type::Uint { .. }
        | Type::Int { .. }
        | Type::Fixed { .. }
        | Type::Ufixed { .. }
        | Type::Enum(_)
        | Type::FixedBytes { .. } => AbiSizeInfo { size: WORD, dynamic: false },
        Type::Function(f) => match f.visibility {
            Visibility::External => AbiSizeInfo { size: WORD, dynamic: false },
            Visibility::Internal => return None,
        },
        Type::Bytes { .. } | Type::String { .. } => AbiSizeInfo { size: WORD, dynamic: true },
        Type::Mapping(_) | Type::Magic { .. } => return None,
        Type::Array(a) => {
            let base = size_with(&a.base, lookup)?;
            match &a.length {
                ArrayLength::Dynamic => AbiSizeInfo { size: WORD, dynamic: true },
                ArrayLength::Static(_) if base.dynamic => AbiSizeInfo { size: WORD, dynamic: true },
                ArrayLength::Static(length) => {
                    let length = u64::try_from(*length).ok()?;
                    AbiSizeInfo { size: length.checked_mul(base.size)?, dynamic: false }
                }
            }
        }
        Type::Struct(s) => {
            let alloc = lookup(&s.id)?;
            head_size(alloc.length, alloc.dynamic)
        }
        Type::Tuple(t) => {
            let mut size = 0u64;
            let mut dynamic = false;
            for member in &t.members {
                let info = size_with(&member.ty, lookup)?;
                dynamic |= info.dynamic;
                size = size.checked_add(info.size)?;
            }
            head_size(size, dynamic)
        }
    };
    Some(info)
}

fn head_size(length: u64, dynamic: bool) -> AbiSizeInfo {
    if dynamic {
        AbiSizeInfo { size: WORD, dynamic: true }
    } else {
        AbiSizeInfo { size: length, dynamic: false }
    }
}

fn layout(
    members: &[NamedType],
    lookup: &mut dyn FnMut(&TypeId) -> Option<AbiAllocation>,
) -> Option<AbiAllocation> {
    let mut position = 0u64;
    let mut dynamic = false;
    let mut out = Vec::with_capacity(members.len());
    for member in members {
        let info = size_with(&member.ty, lookup)?;
        dynamic |= info.dynamic;
        out.push(AbiMemberAllocation {
            name: member.name.clone(),
            ty: member.ty.clone(),
            pointer: AbiPointer { start: position, length: info.size },
        });
        position = position.checked_add(info.size)?;
    }
    Some(AbiAllocation { members: out, length: position, dynamic })
}

/// Lay out an argument list as one tuple, using already-built struct
/// allocations.
pub fn allocate_tuple(
    members: &[NamedType],
    allocations: &AbiAllocations,
) -> Option<AbiAllocation> {
    layout(members, &mut |id| allocations.get(id).cloned().flatten())
}

struct AbiAllocator<'a> {
    types: &'a UserDefinedTypes,
    allocations: AbiAllocations,
    in_progress: BTreeSet<TypeId>,
}

impl AbiAllocator<'_> {
    fn allocate_struct(&mut self, id: &TypeId) -> Option<AbiAllocation> {
        if let Some(done) = self.allocations.get(id) {
            return done.clone();
        }
        if !self.in_progress.insert(id.clone()) {
            trace!(%id, "recursive struct has no ABI layout");
            return None;
        }
        let types = self.types;
        let allocation = types
            .get_struct(id)
            .and_then(|def| layout(&def.members, &mut |inner| self.allocate_struct(inner)));
        self.in_progress.remove(id);
        if allocation.is_none() {
            trace!(%id, "struct is not representable in the ABI");
        }
        self.allocations.insert(id.clone(), allocation.clone());
        allocation
    }
}

/// ABI allocations for every struct in `types`.
pub fn allocate_abi(types: &UserDefinedTypes) -> AbiAllocations {
    let mut allocator = AbiAllocator {
        types,
        allocations: AbiAllocations::new(),
        in_progress: BTreeSet::new(),
    };
    for def in types.structs() {
        allocator.allocate_struct(&def.id);
    }
    allocator.allocations
}
