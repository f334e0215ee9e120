mod common;

use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, B256};
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use common::{address_topic, token_code, word, Chain, Contract, TOKEN_ABI, TRANSFER_TOPIC};
use statecodec_core::config::DecodingMode;
use statecodec_core::definitions::{
    ContractDefinition, EnumDefinition, EventDefinition, EventParameter, UserDefinedType,
    UserDefinedTypes,
};
use statecodec_core::types::{ContractKind, Type, TypeId};
use statecodec_core::values::Value;
use statecodec_decode::{
    decode_logs_par, DecoderOptions, DecoderRequest, Decoding, DefaultingProvider, EvmState, Log,
    LogKind, Step,
};

const TOKEN: Address = Address::repeat_byte(0x70);
const ALICE: Address = Address::repeat_byte(0xa1);
const BOB: Address = Address::repeat_byte(0xb0);

fn transfer_log(emitter: Address, amount: u64) -> Log {
    Log {
        address: emitter,
        topics: vec![TRANSFER_TOPIC.parse().unwrap(), address_topic(ALICE), address_topic(BOB)],
        data: Bytes::from(word(amount).to_vec()),
    }
}

/// Records the level of every event logged while installed.
#[derive(Clone, Default)]
struct Levels(Arc<Mutex<Vec<Level>>>);

impl<S: tracing::Subscriber> Layer<S> for Levels {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(*event.metadata().level());
    }
}

fn token() -> Contract {
    Contract::new("Token", ContractKind::Contract, TOKEN_ABI, token_code())
}

fn other_token() -> Contract {
    Contract::new("OtherToken", ContractKind::Contract, TOKEN_ABI, vec![0x60, 0x02, 0x00])
}

#[test]
fn transfer_from_a_known_emitter() {
    let chain = Chain::new(&[token(), other_token()]);
    let state = EvmState::new();
    let log = transfer_log(TOKEN, 1000);
    let mut provider = DefaultingProvider::new().with_code(TOKEN, token_code());

    let decodings = Decoding::event(chain.info(), &state, &log, DecoderOptions::default())
        .drive(&mut provider)
        .unwrap();
    assert_eq!(decodings.len(), 1);
    let decoding = &decodings[0];
    assert_eq!(decoding.kind, LogKind::Event);
    assert_eq!(decoding.name, "Transfer");
    assert_eq!(decoding.contract_name, "Token");
    assert_eq!(decoding.mode, DecodingMode::Abi);

    let names: Vec<&str> = decoding.arguments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["from", "to", "value"]);
    assert!(decoding.arguments[0].indexed && !decoding.arguments[2].indexed);
    assert_eq!(decoding.arguments[0].value.as_value(), Some(&Value::Address(ALICE)));
    assert_eq!(decoding.arguments[1].value.as_value(), Some(&Value::Address(BOB)));
    assert_eq!(decoding.arguments[2].value.to_string(), "1000");
}

#[test]
fn emitter_code_is_the_only_request() {
    let chain = Chain::new(&[token()]);
    let state = EvmState::new();
    let log = transfer_log(TOKEN, 1);
    let mut decoding = Decoding::event(chain.info(), &state, &log, DecoderOptions::default());
    assert_eq!(
        decoding.advance(None).unwrap(),
        Step::Request(DecoderRequest::Code { address: TOKEN })
    );
    let step = decoding
        .advance(Some(statecodec_decode::Response::Code(token_code())))
        .unwrap();
    assert!(step.is_done());
}

#[test]
fn unknown_emitter_matches_every_contract() {
    let chain = Chain::new(&[token(), other_token()]);
    let state = EvmState::new();
    let log = transfer_log(Address::repeat_byte(0x99), 5);
    let decodings = Decoding::event(chain.info(), &state, &log, DecoderOptions::default())
        .drive(&mut DefaultingProvider::new())
        .unwrap();
    let mut contracts: Vec<&str> = decodings.iter().map(|d| d.contract_name.as_str()).collect();
    contracts.sort_unstable();
    assert_eq!(contracts, ["OtherToken", "Token"]);
}

#[test]
fn library_events_are_always_candidates() {
    let library = Contract::new("TransferLib", ContractKind::Library, TOKEN_ABI, vec![0x73, 0x00]);
    let chain = Chain::new(&[token(), other_token(), library]);
    let state = EvmState::new();
    let log = transfer_log(TOKEN, 7);
    let mut provider = DefaultingProvider::new().with_code(TOKEN, token_code());
    let decodings = Decoding::event(chain.info(), &state, &log, DecoderOptions::default())
        .drive(&mut provider)
        .unwrap();
    let found: Vec<(&str, ContractKind)> =
        decodings.iter().map(|d| (d.contract_name.as_str(), d.contract_kind)).collect();
    assert_eq!(found, [("Token", ContractKind::Contract), ("TransferLib", ContractKind::Library)]);
}

#[test]
fn data_that_does_not_reencode_is_discarded() {
    let chain = Chain::new(&[token()]);
    let state = EvmState::new();
    let mut log = transfer_log(TOKEN, 1);
    let mut data = log.data.to_vec();
    data.extend(word(0xdead));
    log.data = Bytes::from(data);

    let mut provider = DefaultingProvider::new().with_code(TOKEN, token_code());
    let levels = Levels::default();
    let subscriber = tracing_subscriber::registry().with(levels.clone());
    let decodings = tracing::subscriber::with_default(subscriber, || {
        Decoding::event(chain.info(), &state, &log, DecoderOptions::default())
            .drive(&mut provider)
            .unwrap()
    });
    assert!(decodings.is_empty());

    // narrowing candidates down is routine, not worth a warning
    let levels = levels.0.lock().unwrap();
    assert!(levels.contains(&Level::DEBUG));
    assert!(levels.iter().all(|level| *level > Level::WARN), "{levels:?}");
}

#[test]
fn abi_mode_never_asks_for_code() {
    let chain = Chain::new(&[token(), other_token()]);
    let state = EvmState::new();
    let log = transfer_log(TOKEN, 3);
    let mut decoding = Decoding::event(
        chain.info(),
        &state,
        &log,
        DecoderOptions::default().with_mode(DecodingMode::Abi),
    );
    let Step::Done(Ok(decodings)) = decoding.advance(None).unwrap() else {
        panic!("abi mode should finish without requests");
    };
    assert_eq!(decodings.len(), 2);
}

#[test]
fn unmatched_topic_decodes_to_nothing() {
    let chain = Chain::new(&[token()]);
    let state = EvmState::new();
    let log = Log {
        address: TOKEN,
        topics: vec![B256::repeat_byte(0x12)],
        data: Bytes::new(),
    };
    let mut provider = DefaultingProvider::new().with_code(TOKEN, token_code());
    let decodings = Decoding::event(chain.info(), &state, &log, DecoderOptions::default())
        .drive(&mut provider)
        .unwrap();
    assert!(decodings.is_empty());
}

const PAINT_ABI: &str = r#"[
    {"type":"event","name":"Painted","anonymous":false,
     "inputs":[{"name":"color","type":"uint8","indexed":false}]}
]"#;

fn paint_types() -> UserDefinedTypes {
    let color = EnumDefinition {
        id: TypeId::new("Color"),
        name: "Color".into(),
        defining_contract: Some("Paint".into()),
        options: vec!["Red".into(), "Blue".into()],
    };
    let paint = ContractDefinition {
        id: TypeId::new("Paint"),
        name: "Paint".into(),
        kind: ContractKind::Contract,
        payable: false,
        linearized_base_contracts: vec![],
        state_variables: vec![],
        functions: vec![],
        events: vec![EventDefinition {
            name: "Painted".into(),
            anonymous: false,
            parameters: vec![EventParameter {
                name: "color".into(),
                ty: color.as_type(),
                indexed: false,
            }],
        }],
    };
    [UserDefinedType::Enum(color), UserDefinedType::Contract(paint)].into_iter().collect()
}

#[test]
fn enum_out_of_range_retries_in_abi_mode() {
    let paint_code = vec![0x60, 0x03, 0x00];
    let chain = Chain::with_types(
        paint_types(),
        &[Contract::new("Paint", ContractKind::Contract, PAINT_ABI, paint_code.clone())
            .defined_as(TypeId::new("Paint"))],
    );
    let paint = Address::repeat_byte(0x0c);
    let state = EvmState::new();
    let painted: B256 = alloy_primitives::keccak256("Painted(uint8)");
    let log = |color: u64| Log {
        address: paint,
        topics: vec![painted],
        data: Bytes::from(word(color).to_vec()),
    };
    let mut provider = DefaultingProvider::new().with_code(paint, paint_code);

    let in_range = log(1);
    let decodings = Decoding::event(chain.info(), &state, &in_range, DecoderOptions::default())
        .drive(&mut provider)
        .unwrap();
    assert_eq!(decodings.len(), 1);
    assert_eq!(decodings[0].mode, DecodingMode::Full);
    assert!(matches!(
        decodings[0].arguments[0].value.as_value(),
        Some(Value::Enum { index: 1, name }) if name == "Blue"
    ));

    let out_of_range = log(5);
    let decodings = Decoding::event(chain.info(), &state, &out_of_range, DecoderOptions::default())
        .drive(&mut provider)
        .unwrap();
    assert_eq!(decodings.len(), 1);
    assert_eq!(decodings[0].mode, DecodingMode::Abi);
    assert_eq!(decodings[0].arguments[0].value.ty(), &Type::Uint { bits: 8 });
    assert_eq!(decodings[0].arguments[0].value.to_string(), "5");
}

#[test]
fn logs_decode_in_parallel() {
    let chain = Chain::new(&[token()]);
    let state = EvmState::new();
    let logs: Vec<Log> = (0..16).map(|i| transfer_log(TOKEN, i)).collect();
    let code = DefaultingProvider::new().with_code(TOKEN, token_code());
    let provider = |request: &DecoderRequest| code.lookup(request);

    let (decoded, failures) =
        decode_logs_par(chain.info(), &state, &logs, DecoderOptions::default(), &provider);
    assert!(failures.is_empty());
    assert_eq!(decoded.len(), 16);
    for (idx, decodings) in decoded {
        assert_eq!(decodings.len(), 1);
        assert_eq!(decodings[0].arguments[2].value.to_string(), idx.to_string());
    }
}
