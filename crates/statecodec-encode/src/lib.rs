//! # statecodec-encode
//!
//! Turns decoded values back into bytes: ABI tuples with head/tail layout,
//! selector-prefixed calldata, and storage mapping-key preimages.
//!
//! Encoding never fails loudly. A value with no encoding yields `None`, and
//! any container holding such a value yields `None` too.

pub mod abi;
pub mod key;

pub use abi::{encode_tuple, encode_value, encode_with_selector};
pub use key::{encode_mapping_key, mapping_value_slot};
