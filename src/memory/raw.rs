//! Aligned heap buffers and non-owning wrappers around foreign memory.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use super::error::{MemoryError, MemoryResult};

pub(crate) struct RawBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
    owned: bool,
}

// The buffer is only reached through the owning block's RwLock.
unsafe impl Send for RawBuffer {}
unsafe impl Sync for RawBuffer {}

impl RawBuffer {
    pub(crate) fn allocate(size: usize, alignment: usize) -> MemoryResult<Self> {
        let layout = checked_layout(size, alignment)?;
        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(MemoryError::AllocationFailed { size, alignment })?;
        Ok(Self {
            ptr,
            layout,
            owned: true,
        })
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `size` bytes for as long as the buffer is
    /// alive, and nothing else may access that memory concurrently.
    pub(crate) unsafe fn borrowed(ptr: *mut u8, size: usize, alignment: usize) -> MemoryResult<Self> {
        let layout = checked_layout(size, alignment)?;
        let ptr = NonNull::new(ptr).ok_or(MemoryError::Freed)?;
        Ok(Self {
            ptr,
            layout,
            owned: false,
        })
    }

    pub(crate) fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: the pointer covers `layout.size()` initialized bytes for our lifetime.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

fn checked_layout(size: usize, alignment: usize) -> MemoryResult<Layout> {
    if size == 0 {
        return Err(MemoryError::ZeroSize);
    }
    if !alignment.is_power_of_two() {
        return Err(MemoryError::InvalidAlignment(alignment));
    }
    Layout::from_size_align(size, alignment)
        .map_err(|_| MemoryError::AllocationFailed { size, alignment })
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: allocated in `allocate` with this exact layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}
