//! Bodies of user-defined types and contract declarations.
//!
//! These are produced once from compiler output (see [`crate::ast`]) or built
//! by hand, and then only read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{
    ContractKind, ContractType, EnumType, NamedType, StructType, Type, TypeId, Visibility,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDefinition {
    pub id: TypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defining_contract: Option<String>,
    pub members: Vec<NamedType>,
}

impl StructDefinition {
    pub fn as_type(&self) -> Type {
        Type::Struct(StructType {
            id: self.id.clone(),
            name: self.name.clone(),
            defining_contract: self.defining_contract.clone(),
            location: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDefinition {
    pub id: TypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defining_contract: Option<String>,
    pub options: Vec<String>,
}

impl EnumDefinition {
    pub fn as_type(&self) -> Type {
        Type::Enum(EnumType {
            id: self.id.clone(),
            name: self.name.clone(),
            defining_contract: self.defining_contract.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableMutability {
    #[default]
    Mutable,
    Constant,
    Immutable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub mutability: VariableMutability,
}

impl StateVariable {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            mutability: VariableMutability::Mutable,
        }
    }

    pub fn occupies_storage(&self) -> bool {
        self.mutability == VariableMutability::Mutable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionKind {
    #[serde(alias = "freeFunction")]
    Function,
    Constructor,
    Fallback,
    Receive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub kind: FunctionKind,
    /// Present for external and public functions.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_selector")]
    pub selector: Option<[u8; 4]>,
    #[serde(default)]
    pub parameters: Vec<NamedType>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    #[serde(default)]
    pub anonymous: bool,
    pub parameters: Vec<EventParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDefinition {
    pub id: TypeId,
    pub name: String,
    pub kind: ContractKind,
    #[serde(default)]
    pub payable: bool,
    /// Ids of this contract and its bases, most derived first (solc order).
    #[serde(default)]
    pub linearized_base_contracts: Vec<TypeId>,
    #[serde(default)]
    pub state_variables: Vec<StateVariable>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
}

impl ContractDefinition {
    pub fn as_type(&self) -> Type {
        Type::Contract(ContractType {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            payable: self.payable,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typeClass", rename_all = "lowercase")]
pub enum UserDefinedType {
    Struct(StructDefinition),
    Enum(EnumDefinition),
    Contract(ContractDefinition),
}

impl UserDefinedType {
    pub fn id(&self) -> &TypeId {
        match self {
            UserDefinedType::Struct(s) => &s.id,
            UserDefinedType::Enum(e) => &e.id,
            UserDefinedType::Contract(c) => &c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UserDefinedType::Struct(s) => &s.name,
            UserDefinedType::Enum(e) => &e.name,
            UserDefinedType::Contract(c) => &c.name,
        }
    }
}

/// Table of every known struct, enum and contract, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserDefinedTypes(BTreeMap<TypeId, UserDefinedType>);

impl UserDefinedTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ty: UserDefinedType) -> Option<UserDefinedType> {
        self.0.insert(ty.id().clone(), ty)
    }

    pub fn get(&self, id: &TypeId) -> Option<&UserDefinedType> {
        self.0.get(id)
    }

    pub fn get_struct(&self, id: &TypeId) -> Option<&StructDefinition> {
        match self.0.get(id) {
            Some(UserDefinedType::Struct(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_enum(&self, id: &TypeId) -> Option<&EnumDefinition> {
        match self.0.get(id) {
            Some(UserDefinedType::Enum(e)) => Some(e),
            _ => None,
        }
    }

    pub fn get_contract(&self, id: &TypeId) -> Option<&ContractDefinition> {
        match self.0.get(id) {
            Some(UserDefinedType::Contract(c)) => Some(c),
            _ => None,
        }
    }

    pub fn contracts(&self) -> impl Iterator<Item = &ContractDefinition> {
        self.0.values().filter_map(|t| match t {
            UserDefinedType::Contract(c) => Some(c),
            _ => None,
        })
    }

    pub fn structs(&self) -> impl Iterator<Item = &StructDefinition> {
        self.0.values().filter_map(|t| match t {
            UserDefinedType::Struct(s) => Some(s),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another table in, later entries winning.
    pub fn extend(&mut self, other: UserDefinedTypes) {
        self.0.extend(other.0);
    }
}

impl FromIterator<UserDefinedType> for UserDefinedTypes {
    fn from_iter<I: IntoIterator<Item = UserDefinedType>>(iter: I) -> Self {
        let mut types = Self::default();
        for ty in iter {
            types.insert(ty);
        }
        types
    }
}

mod opt_selector {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 4]>, s: S) -> Result<S::Ok, S::Error> {
        value.map(|v| format!("0x{}", hex::encode(v))).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 4]>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        let Some(raw) = raw else { return Ok(None) };
        let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        let selector: [u8; 4] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("selector must be 4 bytes"))?;
        Ok(Some(selector))
    }
}
