//! Byte windows into a block and the capability trait for anything that exposes an address
//! and a size.

use super::block::MemoryBlock;
use super::error::{MemoryError, MemoryResult};

/// Values that can act as the source of a byte copy: they expose an address, a size, and
/// their leading bytes.
pub trait Addressable {
    fn address(&self) -> usize;
    fn byte_size(&self) -> usize;
    /// Fills `out` from the first `out.len()` bytes.
    fn read_bytes(&self, out: &mut [u8]) -> MemoryResult<()>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryRegion {
    block: MemoryBlock,
    offset: usize,
    len: usize,
}

impl MemoryRegion {
    pub(crate) fn new_unchecked(block: MemoryBlock, offset: usize, len: usize) -> Self {
        Self { block, offset, len }
    }

    pub fn block(&self) -> &MemoryBlock {
        &self.block
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_freed(&self) -> bool {
        self.block.is_freed()
    }

    pub fn address(&self) -> usize {
        match self.block.address() {
            0 => 0,
            base => base + self.offset,
        }
    }

    pub fn read(&self, offset: usize, out: &mut [u8]) -> MemoryResult<()> {
        self.check_range(offset, out.len())?;
        self.block.read(self.offset + offset, out)
    }

    pub fn write(&self, offset: usize, data: &[u8]) -> MemoryResult<()> {
        self.check_range(offset, data.len())?;
        self.block.write(self.offset + offset, data)
    }

    pub fn subregion(&self, offset: usize, len: usize) -> MemoryResult<MemoryRegion> {
        self.check_range(offset, len)?;
        Ok(Self::new_unchecked(self.block.clone(), self.offset + offset, len))
    }

    pub fn to_vec(&self) -> MemoryResult<Vec<u8>> {
        let mut bytes = vec![0u8; self.len];
        self.read(0, &mut bytes)?;
        Ok(bytes)
    }

    fn check_range(&self, offset: usize, len: usize) -> MemoryResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(MemoryError::OutOfRange {
                offset,
                len,
                capacity: self.len,
            }),
        }
    }
}

impl Addressable for MemoryRegion {
    fn address(&self) -> usize {
        MemoryRegion::address(self)
    }

    fn byte_size(&self) -> usize {
        self.len
    }

    fn read_bytes(&self, out: &mut [u8]) -> MemoryResult<()> {
        self.read(0, out)
    }
}

impl Addressable for MemoryBlock {
    fn address(&self) -> usize {
        MemoryBlock::address(self)
    }

    fn byte_size(&self) -> usize {
        self.size()
    }

    fn read_bytes(&self, out: &mut [u8]) -> MemoryResult<()> {
        self.read(0, out)
    }
}

impl Addressable for [u8] {
    fn address(&self) -> usize {
        self.as_ptr() as usize
    }

    fn byte_size(&self) -> usize {
        self.len()
    }

    fn read_bytes(&self, out: &mut [u8]) -> MemoryResult<()> {
        let source = self.get(..out.len()).ok_or(MemoryError::OutOfRange {
            offset: 0,
            len: out.len(),
            capacity: self.len(),
        })?;
        out.copy_from_slice(source);
        Ok(())
    }
}

impl Addressable for Vec<u8> {
    fn address(&self) -> usize {
        self.as_slice().address()
    }

    fn byte_size(&self) -> usize {
        self.len()
    }

    fn read_bytes(&self, out: &mut [u8]) -> MemoryResult<()> {
        self.as_slice().read_bytes(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subregions_offset_into_parent_block() {
        let block = MemoryBlock::allocate(16, 8).unwrap();
        let region = block.region(4, 8).unwrap();
        let inner = region.subregion(2, 4).unwrap();
        assert_eq!(inner.offset(), 6);
        assert_eq!(inner.address(), block.address() + 6);
        inner.write(0, &[7, 7]).unwrap();
        let mut out = [0u8; 2];
        block.read(6, &mut out).unwrap();
        assert_eq!(out, [7, 7]);
    }

    #[test]
    fn regions_are_bounded_by_their_own_length() {
        let block = MemoryBlock::allocate(16, 8).unwrap();
        let region = block.region(0, 4).unwrap();
        assert!(matches!(
            region.write(2, &[0; 4]),
            Err(MemoryError::OutOfRange { capacity: 4, .. })
        ));
        assert!(block.region(12, 8).is_err());
    }

    #[test]
    fn byte_buffers_expose_the_capability() {
        let data = vec![1u8, 2, 3];
        let source: &dyn Addressable = &data;
        let mut out = [0u8; 2];
        source.read_bytes(&mut out).unwrap();
        assert_eq!(out, [1, 2]);
        assert_eq!(source.byte_size(), 3);
        assert_eq!(source.address(), data.as_ptr() as usize);
        let mut too_big = [0u8; 4];
        assert!(source.read_bytes(&mut too_big).is_err());
        // slices answer directly, without going through a trait object
        assert_eq!(Addressable::byte_size(&data[1..]), 2);
    }
}
