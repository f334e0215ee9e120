use alloy_primitives::{Address, U256};

use statecodec_allocate::Allocations;
use statecodec_core::context::Contexts;
use statecodec_core::conversion::{keccak256_u256, u256_to_word, Word, ZERO_WORD};
use statecodec_core::definitions::{
    ContractDefinition, StateVariable, UserDefinedType, UserDefinedTypes,
};
use statecodec_core::pointer::DataPointer;
use statecodec_core::types::{ContractKind, Type, TypeId};
use statecodec_core::values::{Decoded, Value};
use statecodec_decode::{
    DecodedVariable, DecoderOptions, DecoderRequest, Decoding, DecodingInfo, DefaultingProvider,
    EvmState, Response, RoundRobin,
};
use statecodec_encode::mapping_value_slot;

const ALICE: Address = Address::repeat_byte(0xa1);
const NAME: &str = "a name that does not fit in a single slot";

fn vault_types() -> UserDefinedTypes {
    [UserDefinedType::Contract(ContractDefinition {
        id: TypeId::new("Vault"),
        name: "Vault".into(),
        kind: ContractKind::Contract,
        payable: false,
        linearized_base_contracts: vec![],
        state_variables: vec![
            StateVariable::new("level", Type::Uint { bits: 8 }),
            StateVariable::new("open", Type::Bool),
            StateVariable::new("name", Type::string()),
            StateVariable::new("balances", Type::mapping(Type::address(), Type::uint256())),
            StateVariable::new("list", Type::dynamic_array(Type::uint256())),
        ],
        functions: vec![],
        events: vec![],
    })]
    .into_iter()
    .collect()
}

struct Vault {
    types: UserDefinedTypes,
    allocations: Allocations,
    contexts: Contexts,
}

impl Vault {
    fn new() -> Self {
        let types = vault_types();
        let allocations = Allocations::build(&types, &[]).unwrap();
        Self {
            types,
            allocations,
            contexts: Contexts::new(),
        }
    }

    fn info(&self) -> DecodingInfo<'_> {
        DecodingInfo::new(&self.types, &self.allocations, &self.contexts)
    }
}

fn num(n: u64) -> Word {
    u256_to_word(U256::from(n))
}

fn alice() -> Decoded {
    Decoded::value(Type::address(), Value::Address(ALICE))
}

/// Storage for a vault with every variable set.
fn populated() -> DefaultingProvider {
    let mut packed = ZERO_WORD;
    packed[31] = 7;
    packed[30] = 1;

    let mut provider = DefaultingProvider::new()
        .with_storage(U256::ZERO, packed)
        .with_storage(U256::from(1), num(NAME.len() as u64 * 2 + 1))
        .with_storage(mapping_value_slot(&alice(), U256::from(2)).unwrap(), num(500))
        .with_storage(U256::from(3), num(2));

    let name_start = keccak256_u256(&num(1));
    for (i, chunk) in NAME.as_bytes().chunks(32).enumerate() {
        let mut word = ZERO_WORD;
        word[..chunk.len()].copy_from_slice(chunk);
        provider.insert_storage(name_start + U256::from(i), word);
    }
    let list_start = keccak256_u256(&num(3));
    provider.insert_storage(list_start, num(11));
    provider.insert_storage(list_start + U256::from(1), num(12));
    provider
}

fn value_of<'v>(variables: &'v [DecodedVariable], name: &str) -> &'v Decoded {
    &variables.iter().find(|v| v.name == name).unwrap().value
}

#[test]
fn whole_contract_state() {
    let vault = Vault::new();
    let state = EvmState::new().with_mapping_key(U256::from(2), alice());
    let variables = Decoding::state_variables(
        vault.info(),
        &state,
        TypeId::new("Vault"),
        DecoderOptions::default(),
    )
    .drive(&mut populated())
    .unwrap();

    assert_eq!(variables.len(), 5);
    assert_eq!(value_of(&variables, "level").to_string(), "7");
    assert_eq!(value_of(&variables, "open").to_string(), "true");
    assert_eq!(value_of(&variables, "name").to_string(), format!("{NAME:?}"));
    assert_eq!(value_of(&variables, "list").to_string(), "[11, 12]");

    let Some(Value::Mapping(entries)) = value_of(&variables, "balances").as_value() else {
        panic!("balances should be a mapping");
    };
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key.as_value(), Some(&Value::Address(ALICE)));
    assert_eq!(entries[0].value.to_string(), "500");
}

#[test]
fn packed_members_share_one_request() {
    let vault = Vault::new();
    let state = EvmState::new();
    let mut requests = Vec::new();
    let mut provider = |request: &DecoderRequest| {
        requests.push(request.clone());
        Response::Storage(ZERO_WORD)
    };
    let variables = Decoding::state_variables(
        vault.info(),
        &state,
        TypeId::new("Vault"),
        DecoderOptions::default(),
    )
    .drive(&mut provider)
    .unwrap();
    assert_eq!(variables.len(), 5);

    // a mapping with no known keys reads nothing; empty string and array stop
    // at their length slot
    let slots: Vec<U256> = requests
        .iter()
        .map(|r| match r {
            DecoderRequest::Storage { slot } => *slot,
            DecoderRequest::Code { .. } => panic!("storage decoding asked for code"),
        })
        .collect();
    assert_eq!(slots, [U256::ZERO, U256::from(1), U256::from(3)]);
}

#[test]
fn snapshot_storage_is_used_before_asking() {
    let vault = Vault::new();
    let mut packed = ZERO_WORD;
    packed[31] = 9;
    let state = EvmState::new().with_storage(U256::ZERO, packed);
    let mut decoding = Decoding::variable(
        vault.info(),
        &state,
        Type::Uint { bits: 8 },
        DataPointer::Storage(statecodec_core::pointer::StorageRange::bytes(U256::ZERO, 31, 1)),
        DecoderOptions::default(),
    );
    let step = decoding.advance(None).unwrap();
    assert!(step.is_done());
    assert!(decoding.session().is_empty());
}

#[test]
fn round_robin_batches_many_variables() {
    let vault = Vault::new();
    let state = EvmState::new();
    let jobs = [
        (Type::string(), U256::from(1)),
        (Type::uint256(), U256::from(3)),
        (Type::dynamic_array(Type::uint256()), U256::from(3)),
    ];
    let robin: RoundRobin<_> = jobs
        .iter()
        .map(|(ty, slot)| {
            Decoding::variable(
                vault.info(),
                &state,
                ty.clone(),
                DataPointer::storage_slot(*slot),
                DecoderOptions::default(),
            )
        })
        .collect();

    let results = robin.run(&mut populated());
    let shown: Vec<String> = results.into_iter().map(|r| r.unwrap().to_string()).collect();
    assert_eq!(shown, [format!("{NAME:?}"), "2".to_string(), "[11, 12]".to_string()]);
}
