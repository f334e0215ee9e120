//! Top-level argument layouts for function calls and constructors.
//!
//! Each context gets one allocation per selector, plus one for its
//! constructor. An allocation is built in `Full` mode when the compiler's
//! definitions describe the function, and in `Abi` mode from the JSON ABI
//! alone otherwise.

use alloy_json_abi::{Function, JsonAbi};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use statecodec_core::abi::named_params;
use statecodec_core::config::DecodingMode;
use statecodec_core::context::ContextHash;
use statecodec_core::conversion::SELECTOR_SIZE;
use statecodec_core::definitions::{ContractDefinition, FunctionKind, UserDefinedTypes};
use statecodec_core::pointer::AbiPointer;
use statecodec_core::types::{ContractKind, Location, NamedType, Type, TypeId};

use crate::abi::{allocate_tuple, AbiAllocations};
use crate::error::AllocationError;

/// What the allocator needs to know about one compiled contract.
#[derive(Debug, Clone)]
pub struct ContractAllocationInfo {
    pub contract_name: String,
    pub contract_kind: ContractKind,
    pub abi: JsonAbi,
    pub deployed_context: Option<ContextHash>,
    pub constructor_context: Option<ContextHash>,
    /// Id of the contract's definition, when compiler definitions exist.
    pub definition_id: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalldataArgumentAllocation {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    /// Absolute position inside the argument region.
    pub pointer: AbiPointer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalldataAllocation {
    pub name: String,
    pub contract_name: String,
    pub context_hash: ContextHash,
    pub kind: FunctionKind,
    pub selector: Option<[u8; 4]>,
    /// Where arguments begin: after the selector for functions, at zero for
    /// constructors.
    pub offset: u64,
    pub arguments: Vec<CalldataArgumentAllocation>,
    pub mode: DecodingMode,
}

impl CalldataAllocation {
    /// The arguments as a tuple type, for re-encoding checks.
    pub fn argument_types(&self) -> Vec<NamedType> {
        self.arguments
            .iter()
            .map(|a| NamedType::new(a.name.clone(), a.ty.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalldataAllocations {
    pub constructors: BTreeMap<ContextHash, CalldataAllocation>,
    pub functions: BTreeMap<ContextHash, BTreeMap<[u8; 4], CalldataAllocation>>,
}

impl CalldataAllocations {
    pub fn function(
        &self,
        context: &ContextHash,
        selector: &[u8; 4],
    ) -> Option<&CalldataAllocation> {
        self.functions
            .get(context)
            .and_then(|by_selector| by_selector.get(selector))
    }

    pub fn constructor(&self, context: &ContextHash) -> Option<&CalldataAllocation> {
        self.constructors.get(context)
    }
}

/// Name unnamed parameters `arg{i}`.
pub(crate) fn name_parameters(params: Vec<NamedType>) -> Vec<NamedType> {
    params
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            if p.name.is_empty() {
                NamedType::new(format!("arg{i}"), p.ty)
            } else {
                p
            }
        })
        .collect()
}

/// Contract definitions of `id` and its bases, most derived first.
pub(crate) fn lineage<'a>(types: &'a UserDefinedTypes, id: &TypeId) -> Vec<&'a ContractDefinition> {
    let Some(contract) = types.get_contract(id) else {
        return vec![];
    };
    if contract.linearized_base_contracts.is_empty() {
        return vec![contract];
    }
    contract
        .linearized_base_contracts
        .iter()
        .filter_map(|b| types.get_contract(b))
        .collect()
}

/// Builds allocations for one context of one contract.
struct Layouts<'a> {
    info: &'a ContractAllocationInfo,
    context: ContextHash,
    types: &'a UserDefinedTypes,
    abi_allocations: &'a AbiAllocations,
}

impl Layouts<'_> {
    fn build(
        &self,
        name: &str,
        kind: FunctionKind,
        selector: Option<[u8; 4]>,
        parameters: Vec<NamedType>,
        mode: DecodingMode,
    ) -> Option<CalldataAllocation> {
        let parameters = name_parameters(parameters);
        let tuple = allocate_tuple(&parameters, self.abi_allocations)?;
        let offset = if selector.is_some() { SELECTOR_SIZE as u64 } else { 0 };
        let arguments = tuple
            .members
            .into_iter()
            .map(|m| CalldataArgumentAllocation {
                name: m.name,
                ty: m.ty.with_location(Location::Calldata),
                pointer: AbiPointer { start: m.pointer.start + offset, length: m.pointer.length },
            })
            .collect();
        Some(CalldataAllocation {
            name: name.to_string(),
            contract_name: self.info.contract_name.clone(),
            context_hash: self.context,
            kind,
            selector,
            offset,
            arguments,
            mode,
        })
    }

    fn function(&self, function: &Function) -> Result<Option<CalldataAllocation>, AllocationError> {
        let selector = function.selector().0;
        let full = self.info.definition_id.as_ref().and_then(|id| {
            lineage(self.types, id)
                .into_iter()
                .flat_map(|c| c.functions.iter())
                .find(|f| f.selector == Some(selector))
        });
        if let Some(def) = full {
            let allocation = self.build(
                &function.name,
                FunctionKind::Function,
                Some(selector),
                def.parameters.clone(),
                DecodingMode::Full,
            );
            if allocation.is_some() {
                return Ok(allocation);
            }
            debug!(function = %function.name, "full-mode layout unavailable, using the ABI");
        }
        let params = named_params(&function.inputs).map_err(|source| AllocationError::Abi {
            name: function.name.clone(),
            source,
        })?;
        Ok(self.build(
            &function.name,
            FunctionKind::Function,
            Some(selector),
            params,
            DecodingMode::Abi,
        ))
    }

    fn constructor(&self) -> Result<Option<CalldataAllocation>, AllocationError> {
        let info = self.info;
        let definition = info.definition_id.as_ref().and_then(|id| self.types.get_contract(id));
        let defined = definition
            .and_then(|c| c.functions.iter().find(|f| f.kind == FunctionKind::Constructor));
        if let Some(def) = defined {
            let allocation = self.build(
                &info.contract_name,
                FunctionKind::Constructor,
                None,
                def.parameters.clone(),
                DecodingMode::Full,
            );
            if allocation.is_some() {
                return Ok(allocation);
            }
        }
        match info.abi.constructor() {
            Some(c) => {
                let params = named_params(&c.inputs).map_err(|source| AllocationError::Abi {
                    name: info.contract_name.clone(),
                    source,
                })?;
                Ok(self.build(
                    &info.contract_name,
                    FunctionKind::Constructor,
                    None,
                    params,
                    DecodingMode::Abi,
                ))
            }
            // implicit constructor: no arguments
            None => {
                let mode = if definition.is_some() {
                    DecodingMode::Full
                } else {
                    DecodingMode::Abi
                };
                Ok(self.build(&info.contract_name, FunctionKind::Constructor, None, vec![], mode))
            }
        }
    }
}

pub fn allocate_calldata(
    contracts: &[ContractAllocationInfo],
    types: &UserDefinedTypes,
    abi_allocations: &AbiAllocations,
) -> Result<CalldataAllocations, AllocationError> {
    let mut out = CalldataAllocations::default();
    for info in contracts {
        if let Some(context) = info.constructor_context {
            let layouts = Layouts { info, context, types, abi_allocations };
            if let Some(allocation) = layouts.constructor()? {
                out.constructors.insert(context, allocation);
            }
        }
        let Some(context) = info.deployed_context else {
            continue;
        };
        let layouts = Layouts { info, context, types, abi_allocations };
        let by_selector = out.functions.entry(context).or_default();
        for function in info.abi.functions() {
            match layouts.function(function)? {
                Some(allocation) => {
                    trace!(
                        contract = %info.contract_name,
                        function = %function.name,
                        mode = ?allocation.mode,
                        "allocated function"
                    );
                    by_selector.insert(function.selector().0, allocation);
                }
                None => debug!(function = %function.name, "function arguments have no ABI layout"),
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use statecodec_core::definitions::{EnumDefinition, FunctionDefinition, UserDefinedType};
    use statecodec_core::types::{EnumType, Visibility};

    fn info(abi: &str, definition_id: Option<TypeId>) -> ContractAllocationInfo {
        ContractAllocationInfo {
            contract_name: "Token".into(),
            contract_kind: ContractKind::Contract,
            abi: serde_json::from_str(abi).unwrap(),
            deployed_context: Some(ContextHash(B256::repeat_byte(1))),
            constructor_context: Some(ContextHash(B256::repeat_byte(2))),
            definition_id,
        }
    }

    const ABI: &str = r#"[
      {"type":"constructor","inputs":[{"name":"supply","type":"uint256"}],
       "stateMutability":"nonpayable"},
      {"type":"function","name":"setMode",
       "inputs":[{"name":"mode","type":"uint8"},{"name":"","type":"string"}],
       "outputs":[],"stateMutability":"nonpayable"}
    ]"#;

    #[test]
    fn abi_only_contracts_use_abi_mode() {
        let allocs =
            allocate_calldata(&[info(ABI, None)], &UserDefinedTypes::new(), &AbiAllocations::new())
                .unwrap();
        let ctx = ContextHash(B256::repeat_byte(1));
        let selector = statecodec_core::conversion::selector("setMode(uint8,string)");
        let f = allocs.function(&ctx, &selector).unwrap();
        assert_eq!(f.mode, DecodingMode::Abi);
        assert_eq!(f.offset, 4);
        assert_eq!(f.arguments[0].pointer, AbiPointer { start: 4, length: 32 });
        assert_eq!(f.arguments[1].name, "arg1");

        let c = allocs.constructor(&ContextHash(B256::repeat_byte(2))).unwrap();
        assert_eq!(c.offset, 0);
        assert_eq!(c.arguments[0].pointer.start, 0);
    }

    #[test]
    fn definitions_upgrade_to_full_mode() {
        let selector = statecodec_core::conversion::selector("setMode(uint8,string)");
        let mode_enum = Type::Enum(EnumType {
            id: TypeId::new("E"),
            name: "Mode".into(),
            defining_contract: None,
        });
        let types: UserDefinedTypes = [
            UserDefinedType::Enum(EnumDefinition {
                id: TypeId::new("E"),
                name: "Mode".into(),
                defining_contract: None,
                options: vec!["A".into(), "B".into()],
            }),
            UserDefinedType::Contract(ContractDefinition {
                id: TypeId::new("T"),
                name: "Token".into(),
                kind: ContractKind::Contract,
                payable: false,
                linearized_base_contracts: vec![TypeId::new("T")],
                state_variables: vec![],
                functions: vec![FunctionDefinition {
                    name: "setMode".into(),
                    kind: FunctionKind::Function,
                    selector: Some(selector),
                    parameters: vec![
                        NamedType::new("mode", mode_enum.clone()),
                        NamedType::new("note", Type::string()),
                    ],
                    visibility: Visibility::External,
                }],
                events: vec![],
            }),
        ]
        .into_iter()
        .collect();
        let contract = info(ABI, Some(TypeId::new("T")));
        let allocs = allocate_calldata(&[contract], &types, &AbiAllocations::new()).unwrap();

        let f = allocs.function(&ContextHash(B256::repeat_byte(1)), &selector).unwrap();
        assert_eq!(f.mode, DecodingMode::Full);
        assert_eq!(f.arguments[0].ty, mode_enum);
        // no constructor definition, but the ABI has one
        let c = allocs.constructor(&ContextHash(B256::repeat_byte(2))).unwrap();
        assert_eq!(c.mode, DecodingMode::Abi);
    }
}
