//! JSON ABI ingestion.
//!
//! Types derived here carry no user-defined type information: structs come
//! out as tuples, enums as `uint8`, contracts as `address`.

use alloy_json_abi::{Event, EventParam, Function, Param};

use crate::definitions::{EventDefinition, EventParameter};
use crate::errors::DefinitionError;
use crate::types::{elementary_type, NamedType, Type};

pub fn param_type(param: &Param) -> Result<Type, DefinitionError> {
    type_from_parts(&param.ty, &param.components)
}

pub fn event_param_type(param: &EventParam) -> Result<Type, DefinitionError> {
    type_from_parts(&param.ty, &param.components)
}

pub fn named_params(params: &[Param]) -> Result<Vec<NamedType>, DefinitionError> {
    params
        .iter()
        .map(|p| Ok(NamedType::new(p.name.clone(), param_type(p)?)))
        .collect()
}

pub fn function_inputs(function: &Function) -> Result<Vec<NamedType>, DefinitionError> {
    named_params(&function.inputs)
}

pub fn event_definition(event: &Event) -> Result<EventDefinition, DefinitionError> {
    let parameters = event
        .inputs
        .iter()
        .map(|p| {
            Ok(EventParameter {
                name: p.name.clone(),
                ty: event_param_type(p)?,
                indexed: p.indexed,
            })
        })
        .collect::<Result<Vec<_>, DefinitionError>>()?;
    Ok(EventDefinition {
        name: event.name.clone(),
        anonymous: event.anonymous,
        parameters,
    })
}

/// Build a type from an ABI type string (`uint256[2][]`, `tuple[]`, ...) and
/// its tuple components.
fn type_from_parts(ty: &str, components: &[Param]) -> Result<Type, DefinitionError> {
    let (base, suffixes) = split_array_suffixes(ty)?;
    let mut out = if base == "tuple" {
        Type::tuple(named_params(components)?)
    } else {
        elementary_type(base).ok_or_else(|| DefinitionError::BadAbiType { ty: ty.to_string() })?
    };
    for length in suffixes {
        out = match length {
            Some(n) => Type::static_array(out, n),
            None => Type::dynamic_array(out),
        };
    }
    Ok(out)
}

/// Split `T[a][b]` into `T` and the suffix lengths, innermost first.
fn split_array_suffixes(ty: &str) -> Result<(&str, Vec<Option<u64>>), DefinitionError> {
    let bad = || DefinitionError::BadAbiType { ty: ty.to_string() };
    let mut rest = ty;
    let mut suffixes = Vec::new();
    while let Some(stripped) = rest.strip_suffix(']') {
        let open = stripped.rfind('[').ok_or_else(bad)?;
        let inner = &stripped[open + 1..];
        let length = if inner.is_empty() {
            None
        } else {
            Some(inner.parse::<u64>().map_err(|_| bad())?)
        };
        suffixes.push(length);
        rest = &stripped[..open];
    }
    suffixes.reverse();
    Ok((rest, suffixes))
}
