use bytes::Bytes;
use ethereum_types::U256;

use crate::common::constants::WORD_SIZE;
use crate::vm::EvmError;

/// Byte-addressable frame memory. Logically infinite and zero-filled; the
/// materialized size grows lazily in 32-byte words and is what MSIZE reports.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Memory { data: Vec::new() }
    }

    /// Active size in bytes; always a multiple of 32.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow to cover `offset..offset + size`, rounded up to a word boundary.
    /// Zero-sized accesses never expand.
    fn expand(&mut self, offset: usize, size: usize) -> Result<(), EvmError> {
        if size == 0 {
            return Ok(());
        }
        let end = offset.checked_add(size).ok_or(EvmError::MemoryOffsetTooLarge)?;
        let target = end
            .checked_add(WORD_SIZE - 1)
            .ok_or(EvmError::MemoryOffsetTooLarge)?
            / WORD_SIZE
            * WORD_SIZE;
        if self.data.len() < target {
            self.data.resize(target, 0);
        }
        Ok(())
    }

    /// Read the 32 big-endian bytes at `offset` as a word, expanding.
    pub fn load_word(&mut self, offset: usize) -> Result<U256, EvmError> {
        self.expand(offset, WORD_SIZE)?;
        Ok(U256::from_big_endian(&self.data[offset..offset + WORD_SIZE]))
    }

    /// Write `value` as 32 big-endian bytes at `offset`, expanding.
    pub fn store_word(&mut self, offset: usize, value: U256) -> Result<(), EvmError> {
        self.expand(offset, WORD_SIZE)?;
        self.data[offset..offset + WORD_SIZE].copy_from_slice(&value.to_big_endian());
        Ok(())
    }

    pub fn store_byte(&mut self, offset: usize, value: u8) -> Result<(), EvmError> {
        self.expand(offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Copy `len` bytes out of memory, expanding first.
    pub fn read(&mut self, offset: usize, len: usize) -> Result<Bytes, EvmError> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        self.expand(offset, len)?;
        Ok(Bytes::copy_from_slice(&self.data[offset..offset + len]))
    }

    /// Copy `bytes` into memory at `offset`, expanding.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), EvmError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.expand(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Copy `len` bytes from `src[src_offset..]` to `dst_offset`, reading
    /// zeros past the end of the source. The destination always receives
    /// exactly `len` bytes.
    pub fn copy_from(
        &mut self,
        src: &[u8],
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    ) -> Result<(), EvmError> {
        if len == 0 {
            return Ok(());
        }
        self.expand(dst_offset, len)?;
        for i in 0..len {
            let byte = src_offset
                .checked_add(i)
                .and_then(|j| src.get(j))
                .copied()
                .unwrap_or(0);
            self.data[dst_offset + i] = byte;
        }
        Ok(())
    }
}
