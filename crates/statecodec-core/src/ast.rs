//! A closed schema for the parts of the solc JSON AST the codec consumes,
//! and its translation into [`UserDefinedTypes`].
//!
//! Node kinds outside the schema deserialize as `Other` and are skipped.
//! Translation runs in two passes: the first indexes every struct, enum and
//! contract by AST id so that the second can resolve `UserDefinedTypeName`
//! references regardless of declaration order.

use alloy_primitives::U256;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use crate::definitions::{
    ContractDefinition, EnumDefinition, EventDefinition, EventParameter, FunctionDefinition,
    FunctionKind, StateVariable, StructDefinition, UserDefinedType, UserDefinedTypes,
    VariableMutability,
};
use crate::errors::DefinitionError;
use crate::types::{
    elementary_type, ArrayLength, ArrayType, ContractKind, ContractType, EnumType, FunctionType,
    Location, Mutability, NamedType, StructType, Type, TypeId, Visibility,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "nodeType")]
pub enum AstNode {
    SourceUnit(SourceUnit),
    ContractDefinition(ContractNode),
    StructDefinition(StructNode),
    EnumDefinition(EnumNode),
    VariableDeclaration(VariableDeclaration),
    FunctionDefinition(FunctionNode),
    EventDefinition(EventNode),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceUnit {
    pub id: i64,
    #[serde(default, rename = "absolutePath")]
    pub absolute_path: Option<String>,
    #[serde(default)]
    pub nodes: Vec<AstNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractNode {
    pub id: i64,
    pub name: String,
    pub contract_kind: ContractKind,
    #[serde(default)]
    pub linearized_base_contracts: Vec<i64>,
    #[serde(default)]
    pub nodes: Vec<AstNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StructNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub members: Vec<VariableDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumValue {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub members: Vec<EnumValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptions {
    #[serde(default)]
    pub type_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclaration {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub type_name: Option<TypeName>,
    #[serde(default)]
    pub state_variable: bool,
    #[serde(default)]
    pub constant: bool,
    #[serde(default)]
    pub mutability: Option<String>,
    #[serde(default)]
    pub storage_location: Option<String>,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub type_descriptions: TypeDescriptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParameterList {
    #[serde(default)]
    pub parameters: Vec<VariableDeclaration>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNode {
    pub id: i64,
    pub name: String,
    pub kind: FunctionKind,
    #[serde(default)]
    pub parameters: ParameterList,
    pub visibility: String,
    #[serde(default)]
    pub state_mutability: Option<String>,
    #[serde(default)]
    pub function_selector: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventNode {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub parameters: ParameterList,
}

/// Array length expressions are only read when they are literals.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "nodeType")]
pub enum LengthExpression {
    Literal { value: Option<String> },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "nodeType")]
pub enum TypeName {
    #[serde(rename_all = "camelCase")]
    ElementaryTypeName {
        name: String,
        #[serde(default)]
        state_mutability: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UserDefinedTypeName {
        referenced_declaration: i64,
        #[serde(default)]
        type_descriptions: TypeDescriptions,
    },
    #[serde(rename_all = "camelCase")]
    ArrayTypeName {
        base_type: Box<TypeName>,
        #[serde(default)]
        length: Option<LengthExpression>,
        #[serde(default)]
        type_descriptions: TypeDescriptions,
    },
    #[serde(rename_all = "camelCase")]
    Mapping {
        key_type: Box<TypeName>,
        value_type: Box<TypeName>,
    },
    #[serde(rename_all = "camelCase")]
    FunctionTypeName {
        visibility: String,
        #[serde(default)]
        state_mutability: Option<String>,
        #[serde(default)]
        parameter_types: ParameterList,
        #[serde(default)]
        return_parameter_types: ParameterList,
    },
}

impl SourceUnit {
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone)]
enum Declared {
    Struct { name: String, scope: Option<String> },
    Enum { name: String, scope: Option<String> },
    Contract { name: String, kind: ContractKind, payable: bool },
}

/// Translate the source units of one compilation into a definitions table.
pub fn translate(
    compilation: &str,
    units: &[SourceUnit],
) -> Result<UserDefinedTypes, DefinitionError> {
    let mut index = HashMap::new();
    for unit in units {
        index_nodes(&unit.nodes, None, &mut index);
    }
    let translator = Translator { compilation, index: &index };

    let mut types = UserDefinedTypes::new();
    for unit in units {
        translator.translate_nodes(&unit.nodes, None, &mut types)?;
    }
    trace!(compilation, count = types.len(), "translated AST definitions");
    Ok(types)
}

fn index_nodes(nodes: &[AstNode], scope: Option<&str>, index: &mut HashMap<i64, Declared>) {
    for node in nodes {
        match node {
            AstNode::ContractDefinition(c) => {
                let payable = c.nodes.iter().any(|n| match n {
                    AstNode::FunctionDefinition(f) => {
                        f.kind == FunctionKind::Receive
                            || (f.kind == FunctionKind::Fallback
                                && f.state_mutability.as_deref() == Some("payable"))
                    }
                    _ => false,
                });
                index.insert(
                    c.id,
                    Declared::Contract { name: c.name.clone(), kind: c.contract_kind, payable },
                );
                index_nodes(&c.nodes, Some(&c.name), index);
            }
            AstNode::StructDefinition(s) => {
                index.insert(
                    s.id,
                    Declared::Struct { name: s.name.clone(), scope: scope.map(str::to_string) },
                );
            }
            AstNode::EnumDefinition(e) => {
                index.insert(
                    e.id,
                    Declared::Enum { name: e.name.clone(), scope: scope.map(str::to_string) },
                );
            }
            AstNode::SourceUnit(u) => index_nodes(&u.nodes, None, index),
            _ => {}
        }
    }
}

struct Translator<'a> {
    compilation: &'a str,
    index: &'a HashMap<i64, Declared>,
}

impl Translator<'_> {
    fn id(&self, node: i64) -> TypeId {
        TypeId::ast(self.compilation, node)
    }

    fn translate_nodes(
        &self,
        nodes: &[AstNode],
        scope: Option<&str>,
        types: &mut UserDefinedTypes,
    ) -> Result<(), DefinitionError> {
        for node in nodes {
            match node {
                AstNode::ContractDefinition(c) => {
                    self.translate_nodes(&c.nodes, Some(&c.name), types)?;
                    types.insert(UserDefinedType::Contract(self.contract(c)?));
                }
                AstNode::StructDefinition(s) => {
                    let members = s
                        .members
                        .iter()
                        .map(|m| Ok(NamedType::new(m.name.clone(), self.variable_type(m)?)))
                        .collect::<Result<Vec<_>, DefinitionError>>()?;
                    types.insert(UserDefinedType::Struct(StructDefinition {
                        id: self.id(s.id),
                        name: s.name.clone(),
                        defining_contract: scope.map(str::to_string),
                        members,
                    }));
                }
                AstNode::EnumDefinition(e) => {
                    types.insert(UserDefinedType::Enum(EnumDefinition {
                        id: self.id(e.id),
                        name: e.name.clone(),
                        defining_contract: scope.map(str::to_string),
                        options: e.members.iter().map(|m| m.name.clone()).collect(),
                    }));
                }
                AstNode::SourceUnit(u) => self.translate_nodes(&u.nodes, None, types)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn contract(&self, c: &ContractNode) -> Result<ContractDefinition, DefinitionError> {
        let mut state_variables = Vec::new();
        let mut functions = Vec::new();
        let mut events = Vec::new();
        for node in &c.nodes {
            match node {
                AstNode::VariableDeclaration(v) if v.state_variable => {
                    let mutability = if v.constant || v.mutability.as_deref() == Some("constant") {
                        VariableMutability::Constant
                    } else if v.mutability.as_deref() == Some("immutable") {
                        VariableMutability::Immutable
                    } else {
                        VariableMutability::Mutable
                    };
                    state_variables.push(StateVariable {
                        name: v.name.clone(),
                        ty: self.variable_type(v)?.with_location(Location::Storage),
                        mutability,
                    });
                }
                AstNode::FunctionDefinition(f) => functions.push(self.function(f)?),
                AstNode::EventDefinition(e) => events.push(self.event(e)?),
                _ => {}
            }
        }
        let payable =
            matches!(self.index.get(&c.id), Some(Declared::Contract { payable: true, .. }));
        Ok(ContractDefinition {
            id: self.id(c.id),
            name: c.name.clone(),
            kind: c.contract_kind,
            payable,
            linearized_base_contracts: c
                .linearized_base_contracts
                .iter()
                .map(|&b| self.id(b))
                .collect(),
            state_variables,
            functions,
            events,
        })
    }

    fn function(&self, f: &FunctionNode) -> Result<FunctionDefinition, DefinitionError> {
        let selector = match &f.function_selector {
            Some(raw) => {
                let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(|_| {
                    DefinitionError::Unsupported { reason: format!("bad selector '{raw}'") }
                })?;
                let selector: [u8; 4] = bytes.try_into().map_err(|_| DefinitionError::Unsupported {
                    reason: format!("selector '{raw}' is not 4 bytes"),
                })?;
                Some(selector)
            }
            None => None,
        };
        Ok(FunctionDefinition {
            name: f.name.clone(),
            kind: f.kind,
            selector,
            parameters: self.parameters(&f.parameters)?,
            visibility: visibility(&f.visibility),
        })
    }

    fn event(&self, e: &EventNode) -> Result<EventDefinition, DefinitionError> {
        let parameters = e
            .parameters
            .parameters
            .iter()
            .map(|p| {
                Ok(EventParameter {
                    name: p.name.clone(),
                    ty: self.variable_type(p)?.with_location(Location::Memory),
                    indexed: p.indexed,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;
        Ok(EventDefinition { name: e.name.clone(), anonymous: e.anonymous, parameters })
    }

    fn parameters(&self, list: &ParameterList) -> Result<Vec<NamedType>, DefinitionError> {
        list.parameters
            .iter()
            .map(|p| {
                let ty = self.variable_type(p)?;
                let ty = match p.storage_location.as_deref() {
                    Some("memory") => ty.with_location(Location::Memory),
                    Some("calldata") => ty.with_location(Location::Calldata),
                    Some("storage") => ty.with_location(Location::Storage),
                    _ => ty,
                };
                Ok(NamedType::new(p.name.clone(), ty))
            })
            .collect()
    }

    fn variable_type(&self, v: &VariableDeclaration) -> Result<Type, DefinitionError> {
        match &v.type_name {
            Some(t) => self.type_name(t),
            None => Err(DefinitionError::Unsupported {
                reason: format!("variable '{}' has no type name", v.name),
            }),
        }
    }

    fn type_name(&self, t: &TypeName) -> Result<Type, DefinitionError> {
        match t {
            TypeName::ElementaryTypeName { name, state_mutability } => {
                let name = if name == "address" && state_mutability.as_deref() == Some("payable") {
                    "address payable"
                } else {
                    name.as_str()
                };
                elementary_type(name)
                    .ok_or_else(|| DefinitionError::UnknownTypeName { name: name.to_string() })
            }
            TypeName::UserDefinedTypeName { referenced_declaration, .. } => {
                let id = self.id(*referenced_declaration);
                match self.index.get(referenced_declaration) {
                    Some(Declared::Struct { name, scope }) => Ok(Type::Struct(StructType {
                        id,
                        name: name.clone(),
                        defining_contract: scope.clone(),
                        location: None,
                    })),
                    Some(Declared::Enum { name, scope }) => Ok(Type::Enum(EnumType {
                        id,
                        name: name.clone(),
                        defining_contract: scope.clone(),
                    })),
                    Some(Declared::Contract { name, kind, payable }) => {
                        Ok(Type::Contract(ContractType {
                            id,
                            name: name.clone(),
                            kind: *kind,
                            payable: *payable,
                        }))
                    }
                    None => {
                        Err(DefinitionError::MissingDeclaration { id: *referenced_declaration })
                    }
                }
            }
            TypeName::ArrayTypeName { base_type, length, type_descriptions } => {
                let base = self.type_name(base_type)?;
                let length = match length {
                    None => ArrayLength::Dynamic,
                    Some(LengthExpression::Literal { value: Some(raw) }) => {
                        ArrayLength::Static(parse_length(raw)?)
                    }
                    Some(_) => ArrayLength::Static(length_from_type_string(type_descriptions)?),
                };
                Ok(Type::Array(ArrayType { base: Box::new(base), length, location: None }))
            }
            TypeName::Mapping { key_type, value_type } => Ok(Type::mapping(
                self.type_name(key_type)?,
                self.type_name(value_type)?.with_location(Location::Storage),
            )),
            TypeName::FunctionTypeName {
                visibility: vis,
                state_mutability,
                parameter_types,
                return_parameter_types,
            } => Ok(Type::Function(FunctionType {
                visibility: visibility(vis),
                mutability: mutability(state_mutability.as_deref()),
                inputs: self.parameters(parameter_types)?.into_iter().map(|p| p.ty).collect(),
                outputs: self
                    .parameters(return_parameter_types)?
                    .into_iter()
                    .map(|p| p.ty)
                    .collect(),
            })),
        }
    }
}

fn visibility(raw: &str) -> Visibility {
    match raw {
        "external" | "public" => Visibility::External,
        _ => Visibility::Internal,
    }
}

fn mutability(raw: Option<&str>) -> Mutability {
    match raw {
        Some("pure") => Mutability::Pure,
        Some("view") => Mutability::View,
        Some("payable") => Mutability::Payable,
        _ => Mutability::Nonpayable,
    }
}

fn parse_length(raw: &str) -> Result<U256, DefinitionError> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    let parsed = match cleaned.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(&cleaned, 10),
    };
    parsed.map_err(|_| DefinitionError::BadArrayLength { raw: raw.to_string() })
}

/// Constant-expression lengths are only available through the type string,
/// e.g. `uint256[4] storage ref`.
fn length_from_type_string(desc: &TypeDescriptions) -> Result<U256, DefinitionError> {
    let raw = desc.type_string.as_deref().unwrap_or_default();
    let bad = || DefinitionError::BadArrayLength { raw: raw.to_string() };
    let head = raw.split(' ').next().ok_or_else(bad)?;
    let body = head.strip_suffix(']').ok_or_else(bad)?;
    let open = body.rfind('[').ok_or_else(bad)?;
    parse_length(&body[open + 1..])
}

/// Convenience: translate a single AST JSON document.
pub fn translate_json(compilation: &str, json: &str) -> Result<UserDefinedTypes, DefinitionError> {
    let unit = SourceUnit::from_json(json)?;
    translate(compilation, std::slice::from_ref(&unit))
}

/// Function names by selector for one translated contract.
pub fn selector_table(contract: &ContractDefinition) -> BTreeMap<[u8; 4], String> {
    contract
        .functions
        .iter()
        .filter_map(|f| f.selector.map(|s| (s, f.name.clone())))
        .collect()
}
