//! Raw reads from the flat byte areas.
//!
//! Memory and code read as zero past their end, like the EVM does. Calldata
//! and event data do the same unless strict mode is on, in which case a read
//! past the end stops the decoding.

use alloy_primitives::U256;

use statecodec_core::conversion::{to_u256, u256_to_u64, Word, WORD_SIZE};
use statecodec_core::errors::{DynamicDataError, ReadError};
use statecodec_core::pointer::ByteLocation;

use crate::decoder::Decoder;
use crate::error::Interrupt;
use crate::state::EvmState;

impl<'r> Decoder<'r> {
    fn area(&self, area: ByteLocation) -> Result<&'r [u8], Interrupt> {
        let state: &'r EvmState = self.state;
        let bytes: &'r [u8] = match area {
            ByteLocation::Memory => &state.memory[..],
            ByteLocation::Calldata => &state.calldata[..],
            ByteLocation::EventData => self.log.map_or(&[][..], |l| &l.data[..]),
            ByteLocation::Code => {
                let this = state.this.ok_or_else(|| {
                    Interrupt::stop(ReadError::Bytes {
                        location: area.to_string(),
                        start: 0,
                        length: 0,
                    })
                })?;
                self.code(this)?
            }
        };
        Ok(bytes)
    }

    pub(crate) fn area_len(&self, area: ByteLocation) -> Result<u64, Interrupt> {
        Ok(self.area(area)?.len() as u64)
    }

    pub(crate) fn read_bytes(
        &self,
        area: ByteLocation,
        start: u64,
        length: u64,
    ) -> Result<Vec<u8>, Interrupt> {
        let out_of_range = || {
            Interrupt::stop(ReadError::Bytes {
                location: area.to_string(),
                start,
                length,
            })
        };
        let end = start.checked_add(length).ok_or_else(out_of_range)?;
        let source = self.area(area)?;
        let strict = self.options.strict_abi
            && matches!(area, ByteLocation::Calldata | ByteLocation::EventData);
        if end > source.len() as u64 && strict {
            return Err(out_of_range());
        }
        let mut out = vec![0u8; usize::try_from(length).map_err(|_| out_of_range())?];
        let available = source.len() as u64;
        if start < available {
            let copy_end = end.min(available);
            out[..(copy_end - start) as usize]
                .copy_from_slice(&source[start as usize..copy_end as usize]);
        }
        Ok(out)
    }

    pub(crate) fn read_word(&self, area: ByteLocation, start: u64) -> Result<Word, Interrupt> {
        let bytes = self.read_bytes(area, start, WORD_SIZE as u64)?;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(&bytes);
        Ok(word)
    }

    /// A word used as a byte offset or address.
    pub(crate) fn pointer(&self, word: &[u8]) -> Result<u64, Interrupt> {
        let pointer = to_u256(word);
        u256_to_u64(pointer).ok_or_else(|| {
            Interrupt::stop(DynamicDataError::OverlargePointersNotImplemented { pointer })
        })
    }

    /// `base + by`, for positions inside a byte area.
    pub(crate) fn offset(base: u64, by: u64) -> Result<u64, Interrupt> {
        base.checked_add(by).ok_or_else(|| {
            Interrupt::stop(DynamicDataError::OverlargePointersNotImplemented {
                pointer: U256::from(base) + U256::from(by),
            })
        })
    }

    /// Position of element `index` of `size` bytes each, starting at `first`.
    pub(crate) fn element_position(first: u64, index: u64, size: u64) -> Result<u64, Interrupt> {
        let by = index.checked_mul(size).ok_or_else(|| {
            Interrupt::stop(DynamicDataError::OverlargePointersNotImplemented {
                pointer: U256::from(index) * U256::from(size),
            })
        })?;
        Self::offset(first, by)
    }

    /// Validate a dynamic length of `length` items of `unit` bytes each
    /// against the configured maximum and, in strict mode, against the
    /// `available` bytes.
    pub(crate) fn checked_length(
        &self,
        length: U256,
        unit: u64,
        available: Option<u64>,
    ) -> Result<u64, Interrupt> {
        let too_long =
            || Interrupt::stop(DynamicDataError::OverlongArraysAndStringsNotImplemented { length });
        let count = u256_to_u64(length).ok_or_else(too_long)?;
        if count > self.options.max_length {
            return Err(too_long());
        }
        if let Some(available) = available.filter(|_| self.options.strict_abi) {
            let needed = count.checked_mul(unit.max(1)).ok_or_else(too_long)?;
            if needed > available {
                return Err(Interrupt::stop(DynamicDataError::OverlongArrayOrStringStrictMode {
                    length,
                    data_length: available,
                }));
            }
        }
        Ok(count)
    }
}
