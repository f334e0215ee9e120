//! Variable decoding jobs: one value at a known pointer, or every state
//! variable of a contract.

use serde::{Deserialize, Serialize};
use tracing::debug;

use statecodec_allocate::StorageMemberPointer;
use statecodec_core::pointer::DataPointer;
use statecodec_core::types::{Type, TypeId};
use statecodec_core::values::Decoded;

use crate::decoder::Decoder;
use crate::error::Interrupt;
use crate::info::{DecoderOptions, DecodingInfo};
use crate::machine::{DecodeJob, Decoding, Session};
use crate::state::EvmState;

/// Decodes a single value of a known type at a known pointer.
#[derive(Debug, Clone)]
pub struct VariableJob<'a> {
    info: DecodingInfo<'a>,
    state: &'a EvmState,
    ty: Type,
    pointer: DataPointer,
    options: DecoderOptions,
}

impl DecodeJob for VariableJob<'_> {
    type Output = Decoded;

    fn run(&self, session: &Session) -> Result<Decoded, Interrupt> {
        Decoder::new(&self.info, self.state, session, self.options).decode(&self.ty, &self.pointer)
    }
}

impl<'a> Decoding<VariableJob<'a>> {
    /// Decode the value of type `ty` at `pointer`.
    ///
    /// In abi mode the type is reduced to its ABI form first, except for
    /// storage, which has no ABI form.
    pub fn variable(
        info: DecodingInfo<'a>,
        state: &'a EvmState,
        ty: Type,
        pointer: DataPointer,
        options: DecoderOptions,
    ) -> Self {
        let ty = if options.is_full() || matches!(pointer, DataPointer::Storage(_)) {
            ty
        } else {
            ty.abify(info.user_types)
        };
        Decoding::new(VariableJob {
            info,
            state,
            ty,
            pointer,
            options,
        })
    }
}

/// One state variable and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defining_contract: Option<String>,
    pub value: Decoded,
}

/// Decodes every storage-backed state variable of a contract.
#[derive(Debug, Clone)]
pub struct StateVariablesJob<'a> {
    info: DecodingInfo<'a>,
    state: &'a EvmState,
    contract: TypeId,
    options: DecoderOptions,
}

impl DecodeJob for StateVariablesJob<'_> {
    type Output = Vec<DecodedVariable>;

    fn run(&self, session: &Session) -> Result<Vec<DecodedVariable>, Interrupt> {
        let Some(allocation) = self.info.allocations.storage.get(&self.contract) else {
            return Err(Decoder::not_found(&self.contract));
        };
        let mut decoder = Decoder::new(&self.info, self.state, session, self.options);
        let mut out = Vec::with_capacity(allocation.members.len());
        for member in &allocation.members {
            let range = match &member.pointer {
                StorageMemberPointer::Storage { range } => *range,
                StorageMemberPointer::Constant { name } => {
                    debug!(variable = %name, contract = %self.contract, "skipping constant");
                    continue;
                }
            };
            let value = decoder.decode_storage(&member.ty, range)?;
            out.push(DecodedVariable {
                name: member.name.clone(),
                defining_contract: member.defining_contract.clone(),
                value,
            });
        }
        Ok(out)
    }
}

impl<'a> Decoding<StateVariablesJob<'a>> {
    /// Decode the state variables of the contract with definition id
    /// `contract`, in declaration order. Constants and immutables are left
    /// out since they are not in storage.
    pub fn state_variables(
        info: DecodingInfo<'a>,
        state: &'a EvmState,
        contract: TypeId,
        options: DecoderOptions,
    ) -> Self {
        Decoding::new(StateVariablesJob {
            info,
            state,
            contract,
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use statecodec_core::conversion::ZERO_WORD;
    use statecodec_core::definitions::{
        ContractDefinition, StateVariable, UserDefinedType, UserDefinedTypes,
    };
    use statecodec_core::types::ContractKind;

    use crate::fixtures::Fixture;
    use crate::machine::DefaultingProvider;
    use crate::request::{DecoderRequest, Response, Step};

    #[test]
    fn uint256_at_slot_zero_requests_one_slot() {
        let fixture = Fixture::new();
        let mut decoding = Decoding::variable(
            fixture.info(),
            &fixture.state,
            Type::uint256(),
            DataPointer::storage_slot(U256::ZERO),
            DecoderOptions::default(),
        );
        let step = decoding.advance(None).unwrap();
        assert_eq!(step, Step::Request(DecoderRequest::Storage { slot: U256::ZERO }));
        let Step::Done(Ok(decoded)) = decoding.advance(Some(Response::Storage(ZERO_WORD))).unwrap()
        else {
            panic!("expected a finished decoding");
        };
        assert_eq!(decoded.to_string(), "0");
    }

    #[test]
    fn state_variables_skip_constants() {
        let mut constant = StateVariable::new("LIMIT", Type::uint256());
        constant.mutability = statecodec_core::definitions::VariableMutability::Constant;
        let types: UserDefinedTypes = [UserDefinedType::Contract(ContractDefinition {
            id: TypeId::new("Counter"),
            name: "Counter".into(),
            kind: ContractKind::Contract,
            payable: false,
            linearized_base_contracts: vec![],
            state_variables: vec![
                StateVariable::new("count", Type::Uint { bits: 64 }),
                constant,
                StateVariable::new("owner", Type::address()),
            ],
            functions: vec![],
            events: vec![],
        })]
        .into_iter()
        .collect();
        let fixture = Fixture::new().with_types(types);

        let mut word = ZERO_WORD;
        word[31] = 5;
        word[11] = 0xaa;
        let mut provider = DefaultingProvider::new().with_storage(U256::ZERO, word);
        let variables = Decoding::state_variables(
            fixture.info(),
            &fixture.state,
            TypeId::new("Counter"),
            DecoderOptions::default(),
        )
        .drive(&mut provider)
        .unwrap();
        let names: Vec<&str> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["count", "owner"]);
        assert_eq!(variables[0].value.to_string(), "5");
    }
}
