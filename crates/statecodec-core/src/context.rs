//! Bytecode contexts: which compiled contract a piece of on-chain code is.
//!
//! A context is identified by a hash of its normalised bytecode, with link
//! and immutable placeholders zeroed out so that linked and unlinked copies
//! of the same contract hash alike.

use alloy_primitives::B256;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::conversion::keccak256;
use crate::types::{ContractKind, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextHash(pub B256);

impl fmt::Display for ContextHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A region of bytecode that differs per deployment (library address,
/// immutable value) and is ignored when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub start: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalFunctionEntry {
    pub name: String,
    #[serde(default)]
    pub defining_contract: Option<String>,
    /// The compiler's designated "invalid function" used for zeroed pointers.
    #[serde(default)]
    pub is_designated_invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub context_hash: ContextHash,
    pub contract_name: String,
    pub contract_id: Option<TypeId>,
    pub contract_kind: ContractKind,
    pub payable: bool,
    pub is_constructor: bool,
    pub binary: Vec<u8>,
    pub placeholders: Vec<Placeholder>,
    /// External function names by selector.
    pub functions: BTreeMap<[u8; 4], String>,
    /// Internal function table keyed by program counter, when known.
    pub internal_functions: Option<BTreeMap<u64, InternalFunctionEntry>>,
}

impl Context {
    pub fn new(
        contract_name: impl Into<String>,
        contract_kind: ContractKind,
        is_constructor: bool,
        binary: Vec<u8>,
        placeholders: Vec<Placeholder>,
    ) -> Self {
        let context_hash = Self::hash_binary(&binary, &placeholders, is_constructor);
        Self {
            context_hash,
            contract_name: contract_name.into(),
            contract_id: None,
            contract_kind,
            payable: false,
            is_constructor,
            binary,
            placeholders,
            functions: BTreeMap::new(),
            internal_functions: None,
        }
    }

    pub fn with_contract_id(mut self, id: TypeId) -> Self {
        self.contract_id = Some(id);
        self
    }

    pub fn with_functions(mut self, functions: BTreeMap<[u8; 4], String>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_internal_functions(mut self, table: BTreeMap<u64, InternalFunctionEntry>) -> Self {
        self.internal_functions = Some(table);
        self
    }

    /// Hash of the binary with placeholder regions zeroed. Constructor and
    /// deployed contexts of identical code still hash apart.
    pub fn hash_binary(
        binary: &[u8],
        placeholders: &[Placeholder],
        is_constructor: bool,
    ) -> ContextHash {
        let mut normalised = normalise(binary, placeholders);
        normalised.push(u8::from(is_constructor));
        ContextHash(keccak256(&normalised))
    }

    /// Whether `code` is an instance of this context. Deployed code must
    /// match in full; constructor code only needs this binary as a prefix,
    /// since constructor arguments follow it.
    pub fn matches(&self, code: &[u8]) -> bool {
        if self.binary.is_empty() {
            return false;
        }
        let candidate = if self.is_constructor {
            if code.len() < self.binary.len() {
                return false;
            }
            &code[..self.binary.len()]
        } else {
            if code.len() != self.binary.len() {
                return false;
            }
            code
        };
        normalise(candidate, &self.placeholders) == normalise(&self.binary, &self.placeholders)
    }
}

fn normalise(binary: &[u8], placeholders: &[Placeholder]) -> Vec<u8> {
    let mut out = binary.to_vec();
    for p in placeholders {
        let end = (p.start + p.length).min(out.len());
        if p.start < end {
            out[p.start..end].fill(0);
        }
    }
    out
}

/// All known contexts, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contexts(IndexMap<ContextHash, Context>);

impl Contexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: Context) -> ContextHash {
        let hash = context.context_hash;
        self.0.insert(hash, context);
        hash
    }

    pub fn get(&self, hash: &ContextHash) -> Option<&Context> {
        self.0.get(hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Context> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First context that `code` is an instance of.
    pub fn find_by_code(&self, code: &[u8], constructor: bool) -> Option<&Context> {
        self.0
            .values()
            .filter(|c| c.is_constructor == constructor)
            .find(|c| c.matches(code))
    }
}

impl FromIterator<Context> for Contexts {
    fn from_iter<I: IntoIterator<Item = Context>>(iter: I) -> Self {
        let mut contexts = Self::default();
        for c in iter {
            contexts.insert(c);
        }
        contexts
    }
}
