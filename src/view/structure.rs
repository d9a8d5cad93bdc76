//! Typed projections of a memory region through a struct descriptor.
//!
//! A view either owns the block it allocated, and frees it when released or dropped, or
//! borrows a region it was handed and never frees it. Clones and the subviews returned for
//! composite members are always borrowing.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use bitflags::bitflags;
use tracing::trace;

use crate::layout::{MemberDeclaration, StructDescriptor, TypeRecord};
use crate::memory::{Addressable, MemoryBlock, MemoryRegion, MemoryResult};

use super::error::{ViewError, ViewResult};
use super::value::Value;

bitflags! {
    #[derive(Default, Debug, PartialEq, Eq, Copy, Clone)]
    pub(crate) struct ViewFlags: u8 {
        const OWNED    = 0b01;
        const RELEASED = 0b10;
    }
}

pub struct StructView {
    descriptor: Arc<StructDescriptor>,
    region: MemoryRegion,
    flags: ViewFlags,
}

impl StructView {
    /// Allocates a zeroed block of the descriptor's aligned size and takes ownership of it.
    pub fn allocate(descriptor: Arc<StructDescriptor>) -> ViewResult<Self> {
        let block = MemoryBlock::allocate(descriptor.aligned_size(), descriptor.alignment())?;
        Ok(Self {
            region: block.whole(),
            descriptor,
            flags: ViewFlags::OWNED,
        })
    }

    /// Allocates a view and runs `init` on it before handing it out.
    pub fn allocate_with<F>(descriptor: Arc<StructDescriptor>, init: F) -> ViewResult<Self>
    where
        F: FnOnce(&mut StructView) -> ViewResult<()>,
    {
        let mut view = Self::allocate(descriptor)?;
        init(&mut view)?;
        Ok(view)
    }

    /// Projects `descriptor` over the start of a caller-supplied region without taking
    /// ownership.
    pub fn wrap(descriptor: Arc<StructDescriptor>, region: MemoryRegion) -> ViewResult<Self> {
        if region.len() < descriptor.size() {
            return Err(ViewError::InsufficientSize {
                required: descriptor.size(),
                available: region.len(),
            });
        }
        let len = region.len().min(descriptor.aligned_size());
        Ok(Self::borrowed(descriptor, region.subregion(0, len)?))
    }

    pub(crate) fn borrowed(descriptor: Arc<StructDescriptor>, region: MemoryRegion) -> Self {
        Self {
            descriptor,
            region,
            flags: ViewFlags::empty(),
        }
    }

    pub fn descriptor(&self) -> &Arc<StructDescriptor> {
        &self.descriptor
    }

    pub fn region(&self) -> &MemoryRegion {
        &self.region
    }

    pub fn block(&self) -> &MemoryBlock {
        self.region.block()
    }

    pub fn is_owned(&self) -> bool {
        self.flags.contains(ViewFlags::OWNED)
    }

    /// Whether the backing memory is gone, through this view or any other handle.
    pub fn is_released(&self) -> bool {
        self.flags.contains(ViewFlags::RELEASED) || self.region.is_freed()
    }

    /// Address of the first byte, or zero once released.
    pub fn address(&self) -> usize {
        if self.flags.contains(ViewFlags::RELEASED) {
            0
        } else {
            self.region.address()
        }
    }

    pub fn byte_size(&self) -> usize {
        self.region.len()
    }

    pub fn address_of(&self, member: &str) -> ViewResult<usize> {
        self.ensure_live()?;
        let member = self.member(member)?;
        Ok(self.region.address() + member.offset)
    }

    pub fn member(&self, name: &str) -> ViewResult<&MemberDeclaration> {
        self.descriptor
            .member(name)
            .ok_or_else(|| ViewError::UnknownMember(name.to_owned()))
    }

    /// Reads element `index` of `member`. Composite members yield a borrowed view over the
    /// same memory rather than a copy.
    pub fn get(&self, member: &str, index: usize) -> ViewResult<Value> {
        let (decl, offset) = self.slot(member, index)?;
        match &decl.ty {
            TypeRecord::Scalar(scalar) => {
                let mut bytes = [0u8; 8];
                let bytes = &mut bytes[..scalar.byte_size];
                self.region.read(offset, bytes)?;
                Ok(Value::Scalar(scalar.decode(bytes)))
            }
            TypeRecord::Opaque(_) => {
                let mut bytes = vec![0u8; decl.element_size];
                self.region.read(offset, &mut bytes)?;
                Ok(Value::Bytes(bytes))
            }
            TypeRecord::Composite(inner) => {
                let region = self.region.subregion(offset, decl.element_size)?;
                Ok(Value::View(StructView::borrowed(inner.clone(), region)))
            }
        }
    }

    /// Writes element `index` of `member`.
    ///
    /// Scalars accept any numeric [`Value`] except floats into integer slots. Opaque and
    /// composite members accept bytes or another view; their leading bytes are copied in
    /// unless the source already lives at the destination address.
    pub fn set(&self, member: &str, index: usize, value: impl Into<Value>) -> ViewResult<()> {
        let value = value.into();
        let (decl, offset) = self.slot(member, index)?;
        match (&decl.ty, &value) {
            (TypeRecord::Scalar(scalar), Value::Scalar(scalar_value)) => {
                let mut bytes = [0u8; 8];
                let bytes = &mut bytes[..scalar.byte_size];
                if !scalar.encode(*scalar_value, bytes) {
                    return Err(self.mismatch(decl, "integer", value.kind_name()));
                }
                self.region.write(offset, bytes)?;
                Ok(())
            }
            (TypeRecord::Scalar(_), _) => Err(self.mismatch(decl, "scalar", value.kind_name())),
            (_, Value::Bytes(bytes)) => self.copy_in(offset, payload_size(decl), bytes),
            (_, Value::View(view)) => self.copy_in(offset, payload_size(decl), view),
            (TypeRecord::Composite(_), Value::Scalar(_)) => {
                Err(self.mismatch(decl, "struct view", value.kind_name()))
            }
            (TypeRecord::Opaque(_), Value::Scalar(_)) => {
                Err(self.mismatch(decl, "bytes", value.kind_name()))
            }
        }
    }

    /// Copies element `index` of `member` in from anything that exposes an address and a size.
    pub fn set_data(&self, member: &str, index: usize, source: &dyn Addressable) -> ViewResult<()> {
        let (decl, offset) = self.slot(member, index)?;
        self.copy_in(offset, payload_size(decl), source)
    }

    /// Overwrites the whole struct from `source`.
    pub fn copy_from(&self, source: &dyn Addressable) -> ViewResult<()> {
        self.ensure_live()?;
        self.copy_in(0, self.descriptor.size(), source)
    }

    /// Every member with all of its elements, in declaration order.
    pub fn to_map(&self) -> ViewResult<Vec<(String, Vec<Value>)>> {
        self.descriptor
            .members()
            .iter()
            .map(|member| {
                let values = (0..member.length)
                    .map(|index| self.get(&member.name, index))
                    .collect::<ViewResult<Vec<_>>>()?;
                Ok((member.name.clone(), values))
            })
            .collect()
    }

    /// `<Name *0xADDR:size:align>`, followed by every member value when `long` is set.
    pub fn inspect(&self, long: bool) -> String {
        let mut out = format!(
            "<{} *0x{:014x}:{}:{}",
            self.descriptor.name().unwrap_or("anonymous"),
            self.address(),
            self.descriptor.aligned_size(),
            self.descriptor.alignment()
        );
        if long {
            match self.to_map() {
                Ok(entries) => {
                    out.push_str(" {");
                    for (position, (name, values)) in entries.iter().enumerate() {
                        if position > 0 {
                            out.push_str(", ");
                        }
                        let _ = write!(out, "{name}=");
                        match values.as_slice() {
                            [single] => {
                                let _ = write!(out, "{single}");
                            }
                            many => {
                                out.push('[');
                                for (i, value) in many.iter().enumerate() {
                                    if i > 0 {
                                        out.push_str(", ");
                                    }
                                    let _ = write!(out, "{value}");
                                }
                                out.push(']');
                            }
                        }
                    }
                    out.push('}');
                }
                Err(_) => out.push_str(" freed"),
            }
        }
        out.push('>');
        out
    }

    /// An owning copy in a freshly allocated block.
    pub fn duplicate(&self) -> ViewResult<StructView> {
        self.ensure_live()?;
        let copy = StructView::allocate(self.descriptor.clone())?;
        copy.copy_in(0, self.descriptor.size(), self)?;
        Ok(copy)
    }

    /// Frees the backing block if this view owns it. Later accesses through this view fail
    /// with [`ViewError::UseAfterFree`]. Returns whether memory was freed.
    pub fn release(&mut self) -> ViewResult<bool> {
        if self.flags.contains(ViewFlags::RELEASED) {
            return Ok(false);
        }
        self.flags.insert(ViewFlags::RELEASED);
        if self.is_owned() {
            return Ok(self.region.block().free()?);
        }
        Ok(false)
    }

    fn ensure_live(&self) -> ViewResult<()> {
        if self.is_released() {
            Err(ViewError::UseAfterFree)
        } else {
            Ok(())
        }
    }

    /// Resolves `member[index]` to its declaration and byte offset within the view.
    fn slot(&self, member: &str, index: usize) -> ViewResult<(&MemberDeclaration, usize)> {
        self.ensure_live()?;
        let decl = self.member(member)?;
        let offset = decl
            .element_offset(index)
            .ok_or_else(|| ViewError::IndexOutOfRange {
                member: member.to_owned(),
                index,
                length: decl.length,
            })?;
        Ok((decl, offset))
    }

    fn copy_in(&self, offset: usize, len: usize, source: &dyn Addressable) -> ViewResult<()> {
        if source.address() == self.region.address() + offset {
            return Ok(());
        }
        if source.byte_size() < len {
            return Err(ViewError::InsufficientSize {
                required: len,
                available: source.byte_size(),
            });
        }
        let mut staging = vec![0u8; len];
        source.read_bytes(&mut staging)?;
        self.region.write(offset, &staging)?;
        Ok(())
    }

    fn mismatch(
        &self,
        decl: &MemberDeclaration,
        expected: &'static str,
        found: &'static str,
    ) -> ViewError {
        ViewError::TypeMismatch {
            member: decl.name.clone(),
            expected,
            found,
        }
    }
}

/// Bytes copied into one element: the struct payload for composites, without the trailing
/// padding, and the whole element otherwise.
fn payload_size(decl: &MemberDeclaration) -> usize {
    match &decl.ty {
        TypeRecord::Composite(inner) => inner.size(),
        _ => decl.element_size,
    }
}

impl Addressable for StructView {
    fn address(&self) -> usize {
        StructView::address(self)
    }

    fn byte_size(&self) -> usize {
        self.region.len()
    }

    fn read_bytes(&self, out: &mut [u8]) -> MemoryResult<()> {
        self.region.read(0, out)
    }
}

/// Clones borrow: only the original owner frees the block.
impl Clone for StructView {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            region: self.region.clone(),
            flags: self.flags - ViewFlags::OWNED,
        }
    }
}

/// Views are equal when they project the same descriptor over the same bytes.
impl PartialEq for StructView {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.descriptor, &other.descriptor)
            && self.address() == other.address()
            && self.byte_size() == other.byte_size()
    }
}

impl Drop for StructView {
    fn drop(&mut self) {
        if self.is_owned() && !self.flags.contains(ViewFlags::RELEASED) {
            trace!(address = self.region.address(), "dropping owning struct view");
            let _ = self.region.block().free();
        }
    }
}

impl fmt::Debug for StructView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect(false))
    }
}

impl fmt::Display for StructView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect(false))
    }
}

#[cfg(test)]
mod tests {
    //! Views decode scalars in place, hand out live subviews for composites, and track
    //! ownership of their block.
    use super::*;
    use crate::layout::{ScalarValue, TypeRegistry};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .define_struct(Some("Vec2"), "x: float; y: float")
            .unwrap();
        registry.register("Tag", 3, 1).unwrap();
        registry
    }

    #[test]
    fn scalars_round_trip_through_memory() {
        let mut registry = registry();
        let desc = registry
            .define_struct(None, "id: uint16_t; delta: int8_t; weight: double")
            .unwrap();
        let view = StructView::allocate(desc).unwrap();
        view.set("id", 0, 0xBEEFu16).unwrap();
        view.set("delta", 0, -5i8).unwrap();
        view.set("weight", 0, 0.25).unwrap();
        assert_eq!(view.get("id", 0).unwrap().as_u64(), Some(0xBEEF));
        assert_eq!(view.get("delta", 0).unwrap().as_i64(), Some(-5));
        assert_eq!(view.get("weight", 0).unwrap().as_f64(), Some(0.25));
        assert_eq!(view.byte_size(), 16, "owning views allocate the aligned size");
    }

    #[test]
    fn composite_members_are_live_projections() {
        let mut registry = registry();
        let desc = registry
            .define_struct(Some("Segment"), "from: Vec2; to: Vec2")
            .unwrap();
        let view = StructView::allocate(desc).unwrap();
        let to = view.get("to", 0).unwrap().into_view().unwrap();
        to.set("y", 0, 3.5f32).unwrap();
        // the write lands in the parent's block at offset 8 + 4
        let mut raw = [0u8; 4];
        view.region().read(12, &mut raw).unwrap();
        assert_eq!(f32::from_ne_bytes(raw), 3.5);
        assert!(!to.is_owned());
        assert_eq!(view.address_of("to").unwrap(), to.address());
    }

    #[test]
    fn composite_set_copies_unless_self_assigned() {
        let mut registry = registry();
        let segment = registry
            .define_struct(Some("Segment"), "from: Vec2; to: Vec2")
            .unwrap();
        let vec2 = registry.descriptor("Vec2").unwrap().unwrap();
        let point = StructView::allocate(vec2).unwrap();
        point.set("x", 0, 1.0f32).unwrap();
        let view = StructView::allocate(segment).unwrap();
        view.set("from", 0, &point).unwrap();
        let from = view.get("from", 0).unwrap();
        assert_eq!(from.as_view().unwrap().get("x", 0).unwrap().as_f64(), Some(1.0));
        // assigning a member its own projection is a no-op
        view.set("from", 0, from).unwrap();
        assert_eq!(
            view.get("from", 0).unwrap().as_view().unwrap().get("x", 0).unwrap(),
            Value::Scalar(ScalarValue::Float(1.0))
        );
    }

    #[test]
    fn wrong_value_kinds_and_indices_are_rejected() {
        let mut registry = registry();
        let desc = registry
            .define_struct(None, "count: int32_t[2]; tag: Tag; at: Vec2")
            .unwrap();
        let view = StructView::allocate(desc).unwrap();
        assert!(matches!(
            view.set("count", 0, 1.5),
            Err(ViewError::TypeMismatch { expected: "integer", .. })
        ));
        assert!(matches!(
            view.set("at", 0, 4u32),
            Err(ViewError::TypeMismatch { expected: "struct view", .. })
        ));
        assert_eq!(
            view.get("count", 2),
            Err(ViewError::IndexOutOfRange {
                member: "count".into(),
                index: 2,
                length: 2
            })
        );
        assert_eq!(
            view.get("missing", 0),
            Err(ViewError::UnknownMember("missing".into()))
        );
        assert_eq!(
            view.set("tag", 0, vec![1u8]),
            Err(ViewError::InsufficientSize {
                required: 3,
                available: 1
            })
        );
    }

    #[test]
    fn composite_set_accepts_an_unpadded_source() {
        let mut registry = registry();
        let odd = registry
            .define_struct(Some("Odd"), "a: double; b: uint8_t")
            .unwrap();
        let holder = registry.define_struct(None, "o: Odd; tail: uint8_t").unwrap();
        let block = MemoryBlock::allocate(9, 8).unwrap();
        let src = StructView::wrap(odd, block.whole()).unwrap();
        src.set("b", 0, 7u8).unwrap();
        let dst = StructView::allocate(holder).unwrap();
        dst.set("tail", 0, 1u8).unwrap();
        dst.set("o", 0, &src).unwrap();
        let copied = dst.get("o", 0).unwrap().into_view().unwrap();
        assert_eq!(copied.get("b", 0).unwrap().as_u64(), Some(7));
        assert_eq!(dst.get("tail", 0).unwrap().as_u64(), Some(1));
        assert!(matches!(
            dst.set_data("o", 0, &vec![0u8; 8]),
            Err(ViewError::InsufficientSize { required: 9, available: 8 })
        ));
    }

    #[test]
    fn opaque_members_move_raw_bytes() {
        let mut registry = registry();
        let desc = registry.define_struct(None, "tag: Tag; n: uint8_t").unwrap();
        let view = StructView::allocate(desc).unwrap();
        view.set("tag", 0, &b"abc"[..]).unwrap();
        assert_eq!(view.get("tag", 0).unwrap().as_bytes(), Some(&b"abc"[..]));
    }

    #[test]
    fn released_views_refuse_access() {
        let mut registry = registry();
        let desc = registry.define_struct(None, "n: uint32_t").unwrap();
        let mut view = StructView::allocate(desc).unwrap();
        let alias = view.clone();
        assert!(view.release().unwrap());
        assert!(!view.release().unwrap(), "second release does nothing");
        assert_eq!(view.get("n", 0), Err(ViewError::UseAfterFree));
        assert_eq!(alias.set("n", 0, 1u32), Err(ViewError::UseAfterFree));
        assert_eq!(view.address(), 0);
    }

    #[test]
    fn borrowed_views_leave_memory_alone() {
        let mut registry = registry();
        let desc = registry.define_struct(None, "n: uint32_t").unwrap();
        let block = MemoryBlock::allocate(8, 4).unwrap();
        let mut view = StructView::wrap(desc.clone(), block.whole()).unwrap();
        view.set("n", 0, 9u32).unwrap();
        assert!(!view.release().unwrap());
        assert!(!block.is_freed());
        let small = MemoryBlock::allocate(2, 2).unwrap();
        assert!(matches!(
            StructView::wrap(desc, small.whole()),
            Err(ViewError::InsufficientSize { required: 4, .. })
        ));
    }

    #[test]
    fn inspect_lists_member_values_in_long_form() {
        let registry = registry();
        let vec2 = registry.descriptor("Vec2").unwrap().unwrap();
        let view = StructView::allocate_with(vec2, |view| {
            view.set("x", 0, 1.0f32)?;
            view.set("y", 0, 2.0f32)
        })
        .unwrap();
        let short = view.to_string();
        assert!(short.starts_with("<Vec2 *0x"), "unexpected summary {short}");
        assert!(short.ends_with(":8:4>"));
        assert!(view.inspect(true).ends_with(" {x=1, y=2}>"));
        let copy = view.duplicate().unwrap();
        assert_ne!(copy.address(), view.address());
        assert_eq!(copy.to_map().unwrap(), view.to_map().unwrap());
    }
}
