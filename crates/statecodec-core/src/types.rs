//! The closed set of type descriptors the codec understands.
//!
//! A `Type` carries everything needed to compute its storage or ABI footprint
//! except the bodies of user-defined types, which are looked up by `TypeId`
//! in [`UserDefinedTypes`](crate::definitions::UserDefinedTypes).

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::definitions::{UserDefinedType, UserDefinedTypes};

/// Identifier of a user-defined type (struct, enum or contract).
///
/// Ids produced from compiler ASTs take the form `"<compilation>:<ast id>"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub String);

impl TypeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id for an AST node of a given compilation.
    pub fn ast(compilation: &str, node_id: i64) -> Self {
        Self(format!("{compilation}:{node_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data location of a reference type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Storage,
    Memory,
    Calldata,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Location::Storage => "storage",
            Location::Memory => "memory",
            Location::Calldata => "calldata",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractKind {
    Contract,
    Library,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    Pure,
    View,
    #[default]
    Nonpayable,
    Payable,
}

/// The environment pseudo-variables `msg`, `tx` and `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagicVariable {
    Message,
    Transaction,
    Block,
}

impl fmt::Display for MagicVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MagicVariable::Message => "msg",
            MagicVariable::Transaction => "tx",
            MagicVariable::Block => "block",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayLength {
    Static(U256),
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractType {
    pub id: TypeId,
    pub name: String,
    pub kind: ContractKind,
    #[serde(default)]
    pub payable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    pub id: TypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defining_contract: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructType {
    pub id: TypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defining_contract: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayType {
    pub base: Box<Type>,
    pub length: ArrayLength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingType {
    pub key: Box<Type>,
    pub value: Box<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub visibility: Visibility,
    #[serde(default)]
    pub mutability: Mutability,
    #[serde(default)]
    pub inputs: Vec<Type>,
    #[serde(default)]
    pub outputs: Vec<Type>,
}

impl FunctionType {
    pub fn external() -> Self {
        Self {
            visibility: Visibility::External,
            mutability: Mutability::Nonpayable,
            inputs: vec![],
            outputs: vec![],
        }
    }

    pub fn internal() -> Self {
        Self {
            visibility: Visibility::Internal,
            ..Self::external()
        }
    }
}

/// A named member of a struct, tuple or parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedType {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl NamedType {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleType {
    pub members: Vec<NamedType>,
}

/// A type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "typeClass", rename_all = "snake_case")]
pub enum Type {
    Bool,
    Address {
        #[serde(default)]
        payable: bool,
    },
    Contract(ContractType),
    Uint {
        bits: u16,
    },
    Int {
        bits: u16,
    },
    Fixed {
        bits: u16,
        places: u8,
    },
    Ufixed {
        bits: u16,
        places: u8,
    },
    Enum(EnumType),
    FixedBytes {
        length: u8,
    },
    Bytes {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    Array(ArrayType),
    Struct(StructType),
    Mapping(MappingType),
    Function(FunctionType),
    Tuple(TupleType),
    Magic {
        variable: MagicVariable,
    },
}

impl Type {
    pub fn uint256() -> Self {
        Type::Uint { bits: 256 }
    }

    pub fn address() -> Self {
        Type::Address { payable: false }
    }

    pub fn bytes() -> Self {
        Type::Bytes { location: None }
    }

    pub fn string() -> Self {
        Type::String { location: None }
    }

    pub fn dynamic_array(base: Type) -> Self {
        Type::Array(ArrayType {
            base: Box::new(base),
            length: ArrayLength::Dynamic,
            location: None,
        })
    }

    pub fn static_array(base: Type, length: u64) -> Self {
        Type::Array(ArrayType {
            base: Box::new(base),
            length: ArrayLength::Static(U256::from(length)),
            location: None,
        })
    }

    pub fn mapping(key: Type, value: Type) -> Self {
        Type::Mapping(MappingType {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    pub fn tuple(members: Vec<NamedType>) -> Self {
        Type::Tuple(TupleType { members })
    }

    /// Whether values of this type are stored by reference (have a location).
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Bytes { .. }
                | Type::String { .. }
                | Type::Array(_)
                | Type::Struct(_)
                | Type::Mapping(_)
        )
    }

    /// Types decoded directly from a single word or byte range.
    pub fn is_elementary(&self) -> bool {
        matches!(
            self,
            Type::Bool
                | Type::Address { .. }
                | Type::Contract(_)
                | Type::Uint { .. }
                | Type::Int { .. }
                | Type::Fixed { .. }
                | Type::Ufixed { .. }
                | Type::Enum(_)
                | Type::FixedBytes { .. }
                | Type::Function(_)
        )
    }

    /// Whether the bit width or byte length carried by an elementary type
    /// is one the compiler can produce. Other types always pass.
    pub fn has_valid_width(&self) -> bool {
        match self {
            Type::Uint { bits }
            | Type::Int { bits }
            | Type::Fixed { bits, .. }
            | Type::Ufixed { bits, .. } => valid_bits(*bits),
            Type::FixedBytes { length } => (1..=32).contains(length),
            _ => true,
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Type::Bytes { location } | Type::String { location } => *location,
            Type::Array(a) => a.location,
            Type::Struct(s) => s.location,
            Type::Mapping(_) => Some(Location::Storage),
            _ => None,
        }
    }

    /// Copy of this type with `location` applied to it and, recursively, to
    /// the reference types it contains.
    pub fn with_location(&self, location: Location) -> Type {
        match self {
            Type::Bytes { .. } => Type::Bytes {
                location: Some(location),
            },
            Type::String { .. } => Type::String {
                location: Some(location),
            },
            Type::Array(a) => Type::Array(ArrayType {
                base: Box::new(a.base.with_location(location)),
                length: a.length.clone(),
                location: Some(location),
            }),
            Type::Struct(s) => Type::Struct(StructType {
                location: Some(location),
                ..s.clone()
            }),
            Type::Tuple(t) => Type::Tuple(TupleType {
                members: t
                    .members
                    .iter()
                    .map(|m| NamedType::new(m.name.clone(), m.ty.with_location(location)))
                    .collect(),
            }),
            other => other.clone(),
        }
    }

    /// Reduce a type to the form the JSON ABI can express: enums become
    /// `uint8`, contracts become `address`, structs become tuples.
    ///
    /// Structs whose definitions are missing are left untouched.
    pub fn abify(&self, types: &UserDefinedTypes) -> Type {
        match self {
            Type::Enum(_) => Type::Uint { bits: 8 },
            Type::Contract(c) => Type::Address { payable: c.payable },
            Type::Array(a) => Type::Array(ArrayType {
                base: Box::new(a.base.abify(types)),
                length: a.length.clone(),
                location: a.location,
            }),
            Type::Struct(s) => match types.get(&s.id) {
                Some(UserDefinedType::Struct(def)) => {
                    let tuple = Type::tuple(
                        def.members
                            .iter()
                            .map(|m| NamedType::new(m.name.clone(), m.ty.abify(types)))
                            .collect(),
                    );
                    match s.location {
                        Some(loc) => tuple.with_location(loc),
                        None => tuple,
                    }
                }
                _ => self.clone(),
            },
            Type::Tuple(t) => Type::tuple(
                t.members
                    .iter()
                    .map(|m| NamedType::new(m.name.clone(), m.ty.abify(types)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Canonical ABI type string as used in signatures, e.g. `(uint256,bytes)[]`.
    ///
    /// `None` for types with no ABI form (mappings, internal functions, magic)
    /// or structs that cannot be resolved.
    pub fn abi_type_string(&self, types: &UserDefinedTypes) -> Option<String> {
        let s = match self {
            Type::Bool => "bool".to_string(),
            Type::Address { .. } | Type::Contract(_) => "address".to_string(),
            Type::Uint { bits } => format!("uint{bits}"),
            Type::Int { bits } => format!("int{bits}"),
            Type::Fixed { bits, places } => format!("fixed{bits}x{places}"),
            Type::Ufixed { bits, places } => format!("ufixed{bits}x{places}"),
            Type::Enum(_) => "uint8".to_string(),
            Type::FixedBytes { length } => format!("bytes{length}"),
            Type::Bytes { .. } => "bytes".to_string(),
            Type::String { .. } => "string".to_string(),
            Type::Array(a) => {
                let base = a.base.abi_type_string(types)?;
                match &a.length {
                    ArrayLength::Static(n) => format!("{base}[{n}]"),
                    ArrayLength::Dynamic => format!("{base}[]"),
                }
            }
            Type::Struct(s) => match types.get(&s.id) {
                Some(UserDefinedType::Struct(def)) => {
                    let parts: Option<Vec<String>> = def
                        .members
                        .iter()
                        .map(|m| m.ty.abi_type_string(types))
                        .collect();
                    format!("({})", parts?.join(","))
                }
                _ => return None,
            },
            Type::Tuple(t) => {
                let parts: Option<Vec<String>> = t
                    .members
                    .iter()
                    .map(|m| m.ty.abi_type_string(types))
                    .collect();
                format!("({})", parts?.join(","))
            }
            Type::Function(f) if f.visibility == Visibility::External => "function".to_string(),
            Type::Function(_) | Type::Mapping(_) | Type::Magic { .. } => return None,
        };
        Some(s)
    }

    /// Key used to recognise "the same container at the same place" while
    /// decoding. Locations are deliberately excluded.
    pub fn identity(&self) -> String {
        match self {
            Type::Struct(s) => format!("struct:{}", s.id),
            Type::Array(a) => match &a.length {
                ArrayLength::Static(n) => format!("array:{}:{n}", a.base.identity()),
                ArrayLength::Dynamic => format!("array:{}:dyn", a.base.identity()),
            },
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_loc = |f: &mut fmt::Formatter<'_>, base: &str, loc: &Option<Location>| match loc {
            Some(loc) => write!(f, "{base} {loc}"),
            None => write!(f, "{base}"),
        };
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Address { payable: true } => write!(f, "address payable"),
            Type::Address { payable: false } => write!(f, "address"),
            Type::Contract(c) => match c.kind {
                ContractKind::Library => write!(f, "library {}", c.name),
                ContractKind::Interface => write!(f, "interface {}", c.name),
                ContractKind::Contract => write!(f, "contract {}", c.name),
            },
            Type::Uint { bits } => write!(f, "uint{bits}"),
            Type::Int { bits } => write!(f, "int{bits}"),
            Type::Fixed { bits, places } => write!(f, "fixed{bits}x{places}"),
            Type::Ufixed { bits, places } => write!(f, "ufixed{bits}x{places}"),
            Type::Enum(e) => match &e.defining_contract {
                Some(c) => write!(f, "enum {c}.{}", e.name),
                None => write!(f, "enum {}", e.name),
            },
            Type::FixedBytes { length } => write!(f, "bytes{length}"),
            Type::Bytes { location } => with_loc(f, "bytes", location),
            Type::String { location } => with_loc(f, "string", location),
            Type::Array(a) => {
                let base = match &a.length {
                    ArrayLength::Static(n) => format!("{}[{n}]", strip_location(&a.base)),
                    ArrayLength::Dynamic => format!("{}[]", strip_location(&a.base)),
                };
                with_loc(f, &base, &a.location)
            }
            Type::Struct(s) => {
                let base = match &s.defining_contract {
                    Some(c) => format!("struct {c}.{}", s.name),
                    None => format!("struct {}", s.name),
                };
                with_loc(f, &base, &s.location)
            }
            Type::Mapping(m) => write!(f, "mapping({} => {})", m.key, m.value),
            Type::Function(func) => match func.visibility {
                Visibility::External => write!(f, "function external"),
                Visibility::Internal => write!(f, "function internal"),
            },
            Type::Tuple(t) => {
                let parts: Vec<String> = t.members.iter().map(|m| m.ty.to_string()).collect();
                write!(f, "tuple({})", parts.join(","))
            }
            Type::Magic { variable } => write!(f, "{variable}"),
        }
    }
}

fn strip_location(ty: &Type) -> String {
    let s = ty.to_string();
    for suffix in [" storage", " memory", " calldata"] {
        if let Some(stripped) = s.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    s
}

/// Parse an elementary type name such as `uint`, `int24`, `bytes7`,
/// `address`, `fixed128x18` or `string`.
pub fn elementary_type(name: &str) -> Option<Type> {
    let ty = match name {
        "bool" => Type::Bool,
        "address" => Type::Address { payable: false },
        "address payable" => Type::Address { payable: true },
        "string" => Type::String { location: None },
        "bytes" => Type::Bytes { location: None },
        "byte" => Type::FixedBytes { length: 1 },
        "uint" => Type::Uint { bits: 256 },
        "int" => Type::Int { bits: 256 },
        "fixed" => Type::Fixed { bits: 128, places: 18 },
        "ufixed" => Type::Ufixed { bits: 128, places: 18 },
        "function" => Type::Function(FunctionType::external()),
        _ => {
            if let Some(rest) = name.strip_prefix("uint") {
                Type::Uint { bits: integer_bits(rest)? }
            } else if let Some(rest) = name.strip_prefix("int") {
                Type::Int { bits: integer_bits(rest)? }
            } else if let Some(rest) = name.strip_prefix("ufixed") {
                let (bits, places) = fixed_params(rest)?;
                Type::Ufixed { bits, places }
            } else if let Some(rest) = name.strip_prefix("fixed") {
                let (bits, places) = fixed_params(rest)?;
                Type::Fixed { bits, places }
            } else if let Some(rest) = name.strip_prefix("bytes") {
                let length: u8 = rest.parse().ok()?;
                if !(1..=32).contains(&length) {
                    return None;
                }
                Type::FixedBytes { length }
            } else {
                return None;
            }
        }
    };
    Some(ty)
}

fn valid_bits(bits: u16) -> bool {
    bits > 0 && bits <= 256 && bits % 8 == 0
}

fn integer_bits(s: &str) -> Option<u16> {
    let bits: u16 = s.parse().ok()?;
    valid_bits(bits).then_some(bits)
}

fn fixed_params(s: &str) -> Option<(u16, u8)> {
    let (bits, places) = s.split_once('x')?;
    let bits = integer_bits(bits)?;
    let places: u8 = places.parse().ok()?;
    (places <= 80).then_some((bits, places))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{EnumDefinition, StructDefinition};

    fn sample_types() -> UserDefinedTypes {
        let mut types = UserDefinedTypes::default();
        types.insert(UserDefinedType::Struct(StructDefinition {
            id: TypeId::new("s:1"),
            name: "Pair".into(),
            defining_contract: Some("Vault".into()),
            members: vec![
                NamedType::new("a", Type::uint256()),
                NamedType::new("b", Type::string()),
            ],
        }));
        types.insert(UserDefinedType::Enum(EnumDefinition {
            id: TypeId::new("s:2"),
            name: "Color".into(),
            defining_contract: None,
            options: vec!["Red".into(), "Green".into()],
        }));
        types
    }

    fn pair() -> Type {
        Type::Struct(StructType {
            id: TypeId::new("s:1"),
            name: "Pair".into(),
            defining_contract: Some("Vault".into()),
            location: None,
        })
    }

    #[test]
    fn elementary_names() {
        assert_eq!(elementary_type("uint"), Some(Type::Uint { bits: 256 }));
        assert_eq!(elementary_type("int24"), Some(Type::Int { bits: 24 }));
        assert_eq!(elementary_type("bytes7"), Some(Type::FixedBytes { length: 7 }));
        assert_eq!(
            elementary_type("ufixed128x10"),
            Some(Type::Ufixed { bits: 128, places: 10 })
        );
        assert_eq!(elementary_type("uint7"), None);
        assert_eq!(elementary_type("bytes33"), None);
    }

    #[test]
    fn display_reads_like_solidity() {
        let ty = Type::static_array(Type::dynamic_array(Type::uint256()), 3)
            .with_location(Location::Memory);
        assert_eq!(ty.to_string(), "uint256[][3] memory");
        assert_eq!(
            Type::mapping(Type::address(), Type::uint256()).to_string(),
            "mapping(address => uint256)"
        );
        assert_eq!(pair().to_string(), "struct Vault.Pair");
    }

    #[test]
    fn abi_strings_resolve_structs() {
        let types = sample_types();
        let ty = Type::dynamic_array(pair());
        assert_eq!(ty.abi_type_string(&types).unwrap(), "(uint256,string)[]");
        assert!(Type::mapping(Type::address(), Type::Bool)
            .abi_type_string(&types)
            .is_none());
    }

    #[test]
    fn abify_reduces_user_types() {
        let types = sample_types();
        let color = Type::Enum(EnumType {
            id: TypeId::new("s:2"),
            name: "Color".into(),
            defining_contract: None,
        });
        assert_eq!(color.abify(&types), Type::Uint { bits: 8 });
        match pair().abify(&types) {
            Type::Tuple(t) => assert_eq!(t.members.len(), 2),
            other => panic!("expected tuple, got {other}"),
        }
    }

    #[test]
    fn type_serde_roundtrip() {
        let ty = Type::mapping(Type::address(), Type::dynamic_array(pair()));
        let json = serde_json::to_string(&ty).unwrap();
        let back: Type = serde_json::from_str(&json).unwrap();
        assert_eq!(ty, back);
    }

    #[test]
    fn widths_outside_solidity_are_invalid() {
        for json in [
            r#"{"typeClass":"uint","bits":512}"#,
            r#"{"typeClass":"int","bits":0}"#,
            r#"{"typeClass":"ufixed","bits":12,"places":2}"#,
            r#"{"typeClass":"fixed_bytes","length":33}"#,
            r#"{"typeClass":"fixed_bytes","length":0}"#,
        ] {
            let ty: Type = serde_json::from_str(json).unwrap();
            assert!(!ty.has_valid_width(), "{json}");
        }
        assert!(Type::Uint { bits: 8 }.has_valid_width());
        assert!(Type::FixedBytes { length: 32 }.has_valid_width());
        assert!(Type::string().has_valid_width());
    }
}
