//! Where a value's encoded bytes live.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conversion::{Word, WORD_SIZE};
use crate::types::MagicVariable;

/// A byte position in storage. `index` counts from the left of the word,
/// so index 31 is the lowest-order byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePosition {
    pub slot: U256,
    pub index: u8,
}

impl StoragePosition {
    pub fn new(slot: U256, index: u8) -> Self {
        Self { slot, index }
    }
}

/// An inclusive byte range in storage, possibly spanning slots.
///
/// Inside allocation tables `slot` is relative to the containing struct's
/// first slot; [`StorageRange::offset_by`] makes it absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRange {
    pub from: StoragePosition,
    pub to: StoragePosition,
}

impl StorageRange {
    /// The whole of `words` consecutive slots starting at `slot`.
    pub fn words(slot: U256, words: U256) -> Self {
        let last = slot.wrapping_add(words.saturating_sub(U256::from(1)));
        Self {
            from: StoragePosition::new(slot, 0),
            to: StoragePosition::new(last, (WORD_SIZE - 1) as u8),
        }
    }

    /// One full slot.
    pub fn word(slot: U256) -> Self {
        Self::words(slot, U256::from(1))
    }

    /// `length` bytes ending at `to_index` inside `slot`.
    pub fn bytes(slot: U256, to_index: u8, length: u8) -> Self {
        Self {
            from: StoragePosition::new(slot, to_index + 1 - length),
            to: StoragePosition::new(slot, to_index),
        }
    }

    pub fn offset_by(&self, base: U256) -> Self {
        Self {
            from: StoragePosition::new(self.from.slot.wrapping_add(base), self.from.index),
            to: StoragePosition::new(self.to.slot.wrapping_add(base), self.to.index),
        }
    }

    pub fn is_single_slot(&self) -> bool {
        self.from.slot == self.to.slot
    }

    /// Whether the range covers whole words only.
    pub fn is_word_aligned(&self) -> bool {
        self.from.index == 0 && self.to.index as usize == WORD_SIZE - 1
    }

    /// Byte length when the range lies within one slot.
    pub fn byte_length(&self) -> Option<usize> {
        self.is_single_slot()
            .then(|| (self.to.index - self.from.index) as usize + 1)
    }

    /// Bytes of `word` covered by this range, for a single-slot range.
    pub fn extract<'a>(&self, word: &'a Word) -> &'a [u8] {
        &word[self.from.index as usize..=self.to.index as usize]
    }
}

impl fmt::Display for StorageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]..={}[{}]",
            self.from.slot, self.from.index, self.to.slot, self.to.index
        )
    }
}

/// A flat byte buffer a value can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteLocation {
    Memory,
    Calldata,
    EventData,
    Code,
}

impl fmt::Display for ByteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ByteLocation::Memory => "memory",
            ByteLocation::Calldata => "calldata",
            ByteLocation::EventData => "eventdata",
            ByteLocation::Code => "code",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum DataPointer {
    Storage(StorageRange),
    Bytes {
        area: ByteLocation,
        start: u64,
        length: u64,
    },
    Topic {
        index: usize,
    },
    /// Stack words `from..=to`, counted from the bottom of the stack.
    Stack {
        from: usize,
        to: usize,
    },
    /// A raw word standing in for a stack read, used when a pointer into
    /// memory or calldata is already known.
    StackLiteral {
        #[serde(with = "word_hex")]
        literal: Word,
    },
    Constant {
        name: String,
    },
    Special {
        variable: MagicVariable,
    },
}

impl DataPointer {
    pub fn bytes(area: ByteLocation, start: u64, length: u64) -> Self {
        DataPointer::Bytes { area, start, length }
    }

    pub fn memory_word(start: u64) -> Self {
        Self::bytes(ByteLocation::Memory, start, WORD_SIZE as u64)
    }

    pub fn storage_slot(slot: U256) -> Self {
        DataPointer::Storage(StorageRange::word(slot))
    }
}

/// A member's position inside an ABI tuple, relative to the tuple's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbiPointer {
    pub start: u64,
    pub length: u64,
}

mod word_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::conversion::{Word, WORD_SIZE};

    pub fn serialize<S: Serializer>(word: &Word, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(word)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Word, D::Error> {
        let raw = String::deserialize(d)?;
        let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        if bytes.len() > WORD_SIZE {
            return Err(serde::de::Error::custom("literal longer than a word"));
        }
        let mut word = [0u8; WORD_SIZE];
        word[WORD_SIZE - bytes.len()..].copy_from_slice(&bytes);
        Ok(word)
    }
}
