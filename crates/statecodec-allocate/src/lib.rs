//! # statecodec-allocate
//!
//! Layout allocators. Given user-defined type definitions and compiled
//! contract ABIs, builds immutable tables saying where every struct member,
//! state variable, function argument and event argument lives.
//!
//! Tables hold no chain state, so one [`Allocations`] can be shared across
//! threads and reused for any number of decodings.

pub mod abi;
pub mod calldata;
pub mod error;
pub mod event;
pub mod memory;
pub mod storage;

pub use abi::{
    abi_size_info, allocate_abi, allocate_tuple, AbiAllocation, AbiAllocations, AbiSizeInfo,
};
pub use calldata::{
    allocate_calldata, CalldataAllocation, CalldataAllocations, ContractAllocationInfo,
};
pub use error::AllocationError;
pub use event::{allocate_events, EventAllocation, EventAllocations, EventArgumentPointer, EventKey};
pub use memory::{allocate_memory, MemoryAllocation, MemoryAllocations};
pub use storage::{
    allocate_storage, element_range, storage_size, StorageAllocation, StorageAllocations,
    StorageLength, StorageMemberPointer,
};

use statecodec_core::definitions::UserDefinedTypes;
use tracing::debug;

/// Every allocation table for one set of contracts.
#[derive(Debug, Clone, Default)]
pub struct Allocations {
    pub storage: StorageAllocations,
    pub memory: MemoryAllocations,
    pub abi: AbiAllocations,
    pub calldata: CalldataAllocations,
    pub events: EventAllocations,
}

impl Allocations {
    pub fn build(
        types: &UserDefinedTypes,
        contracts: &[ContractAllocationInfo],
    ) -> Result<Self, AllocationError> {
        let storage = allocate_storage(types)?;
        let memory = allocate_memory(types);
        let abi = allocate_abi(types);
        let calldata = allocate_calldata(contracts, types, &abi)?;
        let events = allocate_events(contracts, types, &abi)?;
        debug!(
            storage = storage.len(),
            abi = abi.len(),
            events = events.len(),
            "built allocation tables"
        );
        Ok(Self { storage, memory, abi, calldata, events })
    }

    /// Tables for code with no compiler definitions.
    pub fn from_abis(contracts: &[ContractAllocationInfo]) -> Result<Self, AllocationError> {
        Self::build(&UserDefinedTypes::new(), contracts)
    }
}
