#![allow(dead_code)]

use alloy_primitives::{Address, B256, U256};

use statecodec_allocate::{Allocations, ContractAllocationInfo};
use statecodec_core::context::{Context, ContextHash, Contexts};
use statecodec_core::conversion::Word;
use statecodec_core::definitions::UserDefinedTypes;
use statecodec_core::types::{ContractKind, TypeId};
use statecodec_decode::DecodingInfo;

pub const TOKEN_ABI: &str = r#"[
    {"type":"constructor","stateMutability":"nonpayable",
     "inputs":[{"name":"supply","type":"uint256"}]},
    {"type":"function","name":"transfer","stateMutability":"nonpayable",
     "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
     "outputs":[{"name":"","type":"bool"}]},
    {"type":"function","name":"setName","stateMutability":"nonpayable",
     "inputs":[{"name":"name","type":"string"}],"outputs":[]},
    {"type":"event","name":"Transfer","anonymous":false,
     "inputs":[{"name":"from","type":"address","indexed":true},
               {"name":"to","type":"address","indexed":true},
               {"name":"value","type":"uint256","indexed":false}]}
]"#;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

pub struct Contract {
    pub name: &'static str,
    pub kind: ContractKind,
    pub abi: &'static str,
    pub code: Vec<u8>,
    pub definition_id: Option<TypeId>,
}

impl Contract {
    pub fn new(name: &'static str, kind: ContractKind, abi: &'static str, code: Vec<u8>) -> Self {
        Self {
            name,
            kind,
            abi,
            code,
            definition_id: None,
        }
    }

    pub fn defined_as(mut self, id: TypeId) -> Self {
        self.definition_id = Some(id);
        self
    }

    /// Init code: a fixed prefix followed by the deployed code.
    pub fn init_code(&self) -> Vec<u8> {
        let mut init = vec![0x60, 0x80, 0x60, 0x40, 0x52];
        init.extend(&self.code);
        init
    }
}

/// Allocation tables and contexts for a handful of contracts.
pub struct Chain {
    pub types: UserDefinedTypes,
    pub allocations: Allocations,
    pub contexts: Contexts,
    pub deployed: Vec<ContextHash>,
    pub constructors: Vec<ContextHash>,
}

impl Chain {
    pub fn new(contracts: &[Contract]) -> Self {
        Self::with_types(UserDefinedTypes::new(), contracts)
    }

    pub fn with_types(types: UserDefinedTypes, contracts: &[Contract]) -> Self {
        let mut contexts = Contexts::new();
        let mut deployed = Vec::new();
        let mut constructors = Vec::new();
        let mut infos = Vec::new();
        for contract in contracts {
            let mut runtime =
                Context::new(contract.name, contract.kind, false, contract.code.clone(), vec![]);
            let mut init =
                Context::new(contract.name, contract.kind, true, contract.init_code(), vec![]);
            if let Some(id) = &contract.definition_id {
                runtime = runtime.with_contract_id(id.clone());
                init = init.with_contract_id(id.clone());
            }
            let runtime = contexts.insert(runtime);
            let init = contexts.insert(init);
            deployed.push(runtime);
            constructors.push(init);
            infos.push(ContractAllocationInfo {
                contract_name: contract.name.into(),
                contract_kind: contract.kind,
                abi: serde_json::from_str(contract.abi).unwrap(),
                deployed_context: Some(runtime),
                constructor_context: Some(init),
                definition_id: contract.definition_id.clone(),
            });
        }
        let allocations = Allocations::build(&types, &infos).unwrap();
        Self {
            types,
            allocations,
            contexts,
            deployed,
            constructors,
        }
    }

    pub fn info(&self) -> DecodingInfo<'_> {
        DecodingInfo::new(&self.types, &self.allocations, &self.contexts)
    }
}

pub fn word(n: u64) -> Word {
    U256::from(n).to_be_bytes::<32>()
}

pub fn address_topic(address: Address) -> B256 {
    address.into_word()
}

pub fn token_code() -> Vec<u8> {
    vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x00]
}
