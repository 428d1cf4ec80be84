//! Byte-addressed memory and read-only call-data.

use super::{Halt, Word};

/// Round `val` up to a multiple of `align` (a power of two).
#[inline]
pub fn align_to(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Growable memory. Grows in 32-byte steps up to `limit` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
    limit: usize,
}

impl Memory {
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
        }
    }

    /// Byte range `[offset, offset + len)` after growing memory to cover it.
    fn range(&mut self, offset: &Word, len: &Word) -> Result<std::ops::Range<usize>, Halt> {
        if len.is_zero() {
            return Ok(0..0);
        }
        let too_large = || Halt::MemoryLimit {
            offset: offset.to_string(),
            len: len.to_string(),
            limit: self.limit,
        };
        let start = offset.to_usize().ok_or_else(too_large)?;
        let size = len.to_usize().ok_or_else(too_large)?;
        let end = start.checked_add(size).ok_or_else(too_large)?;
        if end > self.limit {
            return Err(too_large());
        }
        let needed = align_to(end, 32);
        if needed > self.data.len() {
            self.data.resize(needed, 0);
        }
        Ok(start..end)
    }

    /// Reads `len` bytes (zero where never written).
    pub fn read(&mut self, offset: &Word, len: &Word) -> Result<Vec<u8>, Halt> {
        let range = self.range(offset, len)?;
        Ok(self.data.get(range).map(<[u8]>::to_vec).unwrap_or_default())
    }

    pub fn write(&mut self, offset: &Word, bytes: &[u8]) -> Result<(), Halt> {
        let range = self.range(offset, &Word::from(bytes.len()))?;
        if let Some(slice) = self.data.get_mut(range) {
            slice.copy_from_slice(bytes);
        }
        Ok(())
    }

    pub fn load(&mut self, offset: &Word) -> Result<Word, Halt> {
        Ok(Word::from_be_slice(&self.read(offset, &Word::from(32u64))?))
    }

    pub fn store(&mut self, offset: &Word, value: &Word) -> Result<(), Halt> {
        self.write(offset, &value.to_be_bytes())
    }

    pub fn store_byte(&mut self, offset: &Word, value: &Word) -> Result<(), Halt> {
        let low = value.to_be_bytes().get(31).copied().unwrap_or(0);
        self.write(offset, &[low])
    }

    /// Current size in bytes, always a multiple of 32.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Read-only input bytes; reads past the end yield zeros.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct CallData {
    data: Vec<u8>,
}

impl CallData {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `len` bytes from `offset`, zero padded.
    pub fn read(&self, offset: &Word, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        if let Some(start) = offset.to_usize() {
            let available = self.data.get(start..).unwrap_or_default();
            let n = available.len().min(len);
            if let (Some(dst), Some(src)) = (out.get_mut(..n), available.get(..n)) {
                dst.copy_from_slice(src);
            }
        }
        out
    }

    pub fn load(&self, offset: &Word) -> Word {
        Word::from_be_slice(&self.read(offset, 32))
    }
}

impl From<Vec<u8>> for CallData {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl From<&[u8]> for CallData {
    fn from(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_grows_in_words() {
        let mut mem = Memory::new(1024);
        mem.store_byte(&Word::from(33u64), &Word::from(0x1ffu64)).unwrap();
        assert_eq!(mem.len(), 64);
        assert_eq!(mem.read(&Word::from(33u64), &Word::one()).unwrap(), vec![0xff]);
        // The word at 2 ends with byte 33.
        assert_eq!(mem.load(&Word::from(2u64)).unwrap(), Word::from(0xffu64));
        assert_eq!(mem.load(&Word::zero()).unwrap(), Word::zero());
    }

    #[test]
    fn memory_limit_is_enforced() {
        let mut mem = Memory::new(64);
        assert!(matches!(
            mem.store(&Word::from(40u64), &Word::one()),
            Err(Halt::MemoryLimit { .. })
        ));
        let huge = Word::zero().not();
        assert!(mem.load(&huge).is_err());
        assert_eq!(mem.read(&huge, &Word::zero()).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn calldata_reads_are_zero_padded() {
        let data = CallData::from(&[1u8, 2, 3][..]);
        assert_eq!(data.read(&Word::from(1u64), 4), vec![2, 3, 0, 0]);
        assert_eq!(data.load(&Word::zero().not()), Word::zero());
    }
}
