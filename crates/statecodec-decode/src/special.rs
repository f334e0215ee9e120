//! The `msg`, `tx` and `block` pseudo-variables.

use statecodec_core::conversion::SELECTOR_SIZE;
use statecodec_core::errors::ReadError;
use statecodec_core::types::{Location, MagicVariable, Type};
use statecodec_core::values::{Decoded, NameValuePair, Value};

use crate::decoder::{DecodeResult, Decoder};
use crate::error::Interrupt;

fn member(name: &str, ty: Type, value: Value) -> NameValuePair {
    NameValuePair::new(name, Decoded::value(ty, value))
}

impl Decoder<'_> {
    pub(crate) fn decode_special(&self, variable: MagicVariable) -> DecodeResult {
        let Some(environment) = self.state.environment.as_ref() else {
            return Err(Interrupt::stop(ReadError::Environment {
                variable: variable.to_string(),
            }));
        };
        let members = match variable {
            MagicVariable::Message => {
                let message = &environment.message;
                let mut sig = message.data.iter().take(SELECTOR_SIZE).copied().collect::<Vec<_>>();
                sig.resize(SELECTOR_SIZE, 0);
                vec![
                    member(
                        "data",
                        Type::bytes().with_location(Location::Calldata),
                        Value::Bytes(message.data.to_vec()),
                    ),
                    member("sender", Type::address(), Value::Address(message.sender)),
                    member("sig", Type::FixedBytes { length: 4 }, Value::FixedBytes(sig)),
                    member("value", Type::uint256(), Value::Uint(message.value)),
                ]
            }
            MagicVariable::Transaction => {
                let tx = &environment.transaction;
                vec![
                    member("origin", Type::address(), Value::Address(tx.origin)),
                    member("gasprice", Type::uint256(), Value::Uint(tx.gasprice)),
                ]
            }
            MagicVariable::Block => {
                let block = &environment.block;
                vec![
                    member(
                        "coinbase",
                        Type::Address { payable: true },
                        Value::Address(block.coinbase),
                    ),
                    member("difficulty", Type::uint256(), Value::Uint(block.difficulty)),
                    member("gaslimit", Type::uint256(), Value::Uint(block.gaslimit)),
                    member("number", Type::uint256(), Value::Uint(block.number)),
                    member("timestamp", Type::uint256(), Value::Uint(block.timestamp)),
                    member("chainid", Type::uint256(), Value::Uint(block.chainid)),
                    member("basefee", Type::uint256(), Value::Uint(block.basefee)),
                ]
            }
        };
        Ok(Decoded::value(Type::Magic { variable }, Value::Magic(members)))
    }
}
