//! Contiguous, resizable sequences of struct elements over one block.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use tracing::{trace, warn};

use crate::layout::{LayoutError, StructDescriptor};
use crate::memory::{Addressable, MemoryBlock, MemoryRegion, MemoryResult};

use super::error::{ViewError, ViewResult};
use super::structure::{StructView, ViewFlags};

/// `length` elements of one descriptor laid out at its aligned size.
///
/// Element views are built lazily by [`fetch`](Self::fetch) and cached per index until the
/// next [`resize`](Self::resize) or [`free`](Self::free). Handles fetched before either call
/// must not be used afterwards; when the old block was owned they fail with
/// [`ViewError::UseAfterFree`].
pub struct StructArray {
    element: Arc<StructDescriptor>,
    length: usize,
    region: MemoryRegion,
    flags: ViewFlags,
    cache: AHashMap<usize, StructView>,
}

impl StructArray {
    /// Allocates `length` zeroed elements.
    pub fn new(element: Arc<StructDescriptor>, length: usize) -> ViewResult<Self> {
        let bytes = byte_length(&element, length)?;
        let block = MemoryBlock::allocate(bytes, element.alignment())?;
        Ok(Self {
            element,
            length,
            region: block.whole(),
            flags: ViewFlags::OWNED,
            cache: AHashMap::new(),
        })
    }

    /// Projects `length` elements over the start of `region` without taking ownership.
    pub fn wrap(
        element: Arc<StructDescriptor>,
        region: MemoryRegion,
        length: usize,
    ) -> ViewResult<Self> {
        let required = byte_length(&element, length)?;
        if region.len() < required {
            return Err(ViewError::InsufficientSize {
                required,
                available: region.len(),
            });
        }
        Ok(Self {
            region: region.subregion(0, required)?,
            element,
            length,
            flags: ViewFlags::empty(),
            cache: AHashMap::new(),
        })
    }

    pub fn element(&self) -> &Arc<StructDescriptor> {
        &self.element
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Distance in bytes between consecutive elements.
    pub fn stride(&self) -> usize {
        self.element.aligned_size()
    }

    pub fn is_owned(&self) -> bool {
        self.flags.contains(ViewFlags::OWNED)
    }

    pub fn is_freed(&self) -> bool {
        self.flags.contains(ViewFlags::RELEASED) || self.region.is_freed()
    }

    pub fn address(&self) -> usize {
        if self.flags.contains(ViewFlags::RELEASED) {
            0
        } else {
            self.region.address()
        }
    }

    pub fn byte_size(&self) -> usize {
        self.length * self.stride()
    }

    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }

    /// Borrowed view of element `index`, cached until the next resize or free.
    pub fn fetch(&mut self, index: usize) -> ViewResult<StructView> {
        self.ensure_live()?;
        self.check_index(index)?;
        if let Some(view) = self.cache.get(&index) {
            return Ok(view.clone());
        }
        let view = self.element_view(index)?;
        self.cache.insert(index, view.clone());
        Ok(view)
    }

    /// Copies element `index` in from `source`, which must cover at least one element.
    pub fn store(&mut self, index: usize, source: &dyn Addressable) -> ViewResult<()> {
        self.fetch(index)?.copy_from(source)
    }

    /// Uncached views of every element in order.
    pub fn iter(&self) -> impl Iterator<Item = ViewResult<StructView>> + '_ {
        (0..self.length).map(move |index| {
            self.ensure_live()?;
            self.element_view(index)
        })
    }

    pub fn to_vec(&self) -> ViewResult<Vec<StructView>> {
        self.iter().collect()
    }

    /// Runs `f` over every element with its index.
    pub fn map_in_place<F>(&mut self, mut f: F) -> ViewResult<()>
    where
        F: FnMut(usize, &mut StructView) -> ViewResult<()>,
    {
        for index in 0..self.length {
            let mut view = self.fetch(index)?;
            f(index, &mut view)?;
        }
        Ok(())
    }

    /// An owning copy in a freshly allocated block.
    pub fn duplicate(&self) -> ViewResult<StructArray> {
        self.ensure_live()?;
        let copy = StructArray::new(self.element.clone(), self.length)?;
        copy.region
            .block()
            .copy_from(0, self.region.block(), self.region.offset(), self.byte_size())?;
        Ok(copy)
    }

    /// Moves the elements into a new block of `new_length` elements, keeping the common
    /// prefix. The old block is freed when this array owned it; a borrowed block is left
    /// untouched and the array owns the new one from then on. Every cached element view is
    /// discarded.
    pub fn resize(&mut self, new_length: usize) -> ViewResult<()> {
        let bytes = byte_length(&self.element, new_length)?;
        let stride = self.stride();
        let block = MemoryBlock::allocate(bytes, self.element.alignment())?;
        let live = !self.is_freed();
        if live {
            let kept = self.length.min(new_length) * stride;
            block.copy_from(0, self.region.block(), self.region.offset(), kept)?;
        }
        if self.is_owned() {
            if live {
                self.region.block().free()?;
            }
        } else {
            warn!(
                address = self.region.address(),
                "resizing an array over borrowed memory; the array now owns a private copy"
            );
        }
        trace!(
            from = self.length,
            to = new_length,
            cached = self.cache.len(),
            "resized struct array"
        );
        self.cache.clear();
        self.region = block.whole();
        self.length = new_length;
        self.flags = ViewFlags::OWNED;
        Ok(())
    }

    /// Drops every cached element view, then the backing block if owned. Later fetches and
    /// stores fail with [`ViewError::UseAfterFree`].
    pub fn free(&mut self) -> ViewResult<()> {
        if self.flags.contains(ViewFlags::RELEASED) {
            return Ok(());
        }
        for (_, mut view) in self.cache.drain() {
            view.release()?;
        }
        if self.is_owned() {
            self.region.block().free()?;
        }
        trace!(address = self.region.address(), "freed struct array");
        self.length = 0;
        self.flags.insert(ViewFlags::RELEASED);
        Ok(())
    }

    fn ensure_live(&self) -> ViewResult<()> {
        if self.is_freed() {
            Err(ViewError::UseAfterFree)
        } else {
            Ok(())
        }
    }

    fn check_index(&self, index: usize) -> ViewResult<()> {
        if index < self.length {
            Ok(())
        } else {
            Err(ViewError::IndexOutOfRange {
                member: self.label().to_owned(),
                index,
                length: self.length,
            })
        }
    }

    fn element_view(&self, index: usize) -> ViewResult<StructView> {
        let stride = self.stride();
        let region = self.region.subregion(index * stride, stride)?;
        Ok(StructView::borrowed(self.element.clone(), region))
    }

    fn label(&self) -> &str {
        self.element.name().unwrap_or("array")
    }
}

/// Bytes needed for `length` elements; at least one element is required.
fn byte_length(element: &StructDescriptor, length: usize) -> ViewResult<usize> {
    let name = element.name().unwrap_or("array");
    if length < 1 {
        return Err(LayoutError::InvalidLength {
            name: name.to_owned(),
            length,
        }
        .into());
    }
    length
        .checked_mul(element.aligned_size())
        .ok_or_else(|| LayoutError::Overflow(name.to_owned()).into())
}

impl Addressable for StructArray {
    fn address(&self) -> usize {
        StructArray::address(self)
    }

    fn byte_size(&self) -> usize {
        StructArray::byte_size(self)
    }

    fn read_bytes(&self, out: &mut [u8]) -> MemoryResult<()> {
        self.region.read(0, out)
    }
}

impl Drop for StructArray {
    fn drop(&mut self) {
        if self.is_owned() && !self.flags.contains(ViewFlags::RELEASED) {
            let _ = self.region.block().free();
        }
    }
}

impl fmt::Debug for StructArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}[{}] *0x{:014x}:{}:{}>",
            self.label(),
            self.length,
            self.address(),
            self.stride(),
            self.element.alignment()
        )
    }
}
