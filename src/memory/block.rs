//! Shared handles to aligned memory blocks.
//!
//! A block is allocated once at a fixed size and alignment and can be freed explicitly while
//! handles to it are still around. Every access after that fails with
//! [`MemoryError::Freed`] instead of touching released memory.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use super::error::{MemoryError, MemoryResult};
use super::raw::RawBuffer;
use super::region::MemoryRegion;

#[derive(Clone)]
pub struct MemoryBlock {
    inner: Arc<BlockInner>,
}

struct BlockInner {
    size: usize,
    alignment: usize,
    address: usize,
    buffer: RwLock<Option<RawBuffer>>,
}

impl MemoryBlock {
    /// Allocates a zero-filled block.
    pub fn allocate(size: usize, alignment: usize) -> MemoryResult<Self> {
        let buffer = RawBuffer::allocate(size, alignment)?;
        trace!(size, alignment, address = buffer.address(), "allocated memory block");
        Ok(Self::from_buffer(buffer, size, alignment))
    }

    /// Wraps memory owned by someone else. Freeing the block only detaches it; the memory
    /// itself is never deallocated.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `size` bytes until the block is freed or
    /// every handle to it is dropped, and must not be accessed through other paths meanwhile.
    pub unsafe fn from_raw_parts(ptr: *mut u8, size: usize, alignment: usize) -> MemoryResult<Self> {
        // SAFETY: forwarded from the caller.
        let buffer = unsafe { RawBuffer::borrowed(ptr, size, alignment) }?;
        Ok(Self::from_buffer(buffer, size, alignment))
    }

    fn from_buffer(buffer: RawBuffer, size: usize, alignment: usize) -> Self {
        Self {
            inner: Arc::new(BlockInner {
                size,
                alignment,
                address: buffer.address(),
                buffer: RwLock::new(Some(buffer)),
            }),
        }
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.inner.size
    }

    #[inline(always)]
    pub fn alignment(&self) -> usize {
        self.inner.alignment
    }

    /// Address of the first byte, or zero once the block has been freed.
    pub fn address(&self) -> usize {
        if self.is_freed() {
            0
        } else {
            self.inner.address
        }
    }

    pub fn is_freed(&self) -> bool {
        self.inner
            .buffer
            .read()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }

    /// Whether both handles refer to the same allocation.
    pub fn ptr_eq(&self, other: &MemoryBlock) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Releases the memory. Returns `false` if the block was already freed.
    pub fn free(&self) -> MemoryResult<bool> {
        let released = self.lock_mut()?.take().is_some();
        if released {
            trace!(address = self.inner.address, size = self.inner.size, "freed memory block");
        }
        Ok(released)
    }

    pub fn read(&self, offset: usize, out: &mut [u8]) -> MemoryResult<()> {
        if out.is_empty() {
            return Ok(());
        }
        let end = self.check_range(offset, out.len())?;
        let guard = self.lock()?;
        let buffer = guard.as_ref().ok_or(MemoryError::Freed)?;
        out.copy_from_slice(&buffer.as_slice()[offset..end]);
        Ok(())
    }

    pub fn write(&self, offset: usize, data: &[u8]) -> MemoryResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let end = self.check_range(offset, data.len())?;
        let mut guard = self.lock_mut()?;
        let buffer = guard.as_mut().ok_or(MemoryError::Freed)?;
        buffer.as_mut_slice()[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Copies `len` bytes from `src` into this block. The ranges may overlap.
    pub fn copy_from(
        &self,
        dst_offset: usize,
        src: &MemoryBlock,
        src_offset: usize,
        len: usize,
    ) -> MemoryResult<()> {
        let mut staging = vec![0u8; len];
        src.read(src_offset, &mut staging)?;
        self.write(dst_offset, &staging)
    }

    pub fn to_vec(&self) -> MemoryResult<Vec<u8>> {
        let mut bytes = vec![0u8; self.size()];
        self.read(0, &mut bytes)?;
        Ok(bytes)
    }

    /// Allocates a new block with the same size and alignment holding a copy of the contents.
    pub fn duplicate(&self) -> MemoryResult<Self> {
        let copy = Self::allocate(self.size(), self.alignment())?;
        copy.copy_from(0, self, 0, self.size())?;
        Ok(copy)
    }

    pub fn region(&self, offset: usize, len: usize) -> MemoryResult<MemoryRegion> {
        self.check_range(offset, len)?;
        Ok(MemoryRegion::new_unchecked(self.clone(), offset, len))
    }

    pub fn whole(&self) -> MemoryRegion {
        MemoryRegion::new_unchecked(self.clone(), 0, self.size())
    }

    fn check_range(&self, offset: usize, len: usize) -> MemoryResult<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.inner.size => Ok(end),
            _ => Err(MemoryError::OutOfRange {
                offset,
                len,
                capacity: self.inner.size,
            }),
        }
    }

    fn lock(&self) -> MemoryResult<RwLockReadGuard<'_, Option<RawBuffer>>> {
        self.inner
            .buffer
            .read()
            .map_err(|_| MemoryError::LockPoisoned)
    }

    fn lock_mut(&self) -> MemoryResult<RwLockWriteGuard<'_, Option<RawBuffer>>> {
        self.inner
            .buffer
            .write()
            .map_err(|_| MemoryError::LockPoisoned)
    }
}

/// Blocks are equal when they cover the same address range.
impl PartialEq for MemoryBlock {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address() && self.size() == other.size()
    }
}

impl fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<MemoryBlock *0x{:014x}:{}:{}>",
            self.address(),
            self.size(),
            self.alignment()
        )
    }
}
