//! C-compatible struct and union layouts over raw memory blocks.
//!
//! Layouts are declared either through the compact encoding text
//! (`"x: float; y: float; tag: uint8_t[4]:4"`) or the scoped [`layout::LayoutBuilder`],
//! resolved into an immutable [`layout::StructDescriptor`], and then projected over a
//! [`memory::MemoryBlock`] as a [`view::StructView`] or [`view::StructArray`].

pub mod config;
pub mod layout;
pub mod memory;
pub mod view;

pub use config::{LayoutConfig, OffsetBaseline};
pub use layout::{
    LayoutBuilder, LayoutError, LayoutResult, MemberDeclaration, ScopeKind, StructDescriptor,
    TypeRegistry,
};
pub use memory::{MemoryBlock, MemoryError, MemoryRegion, MemoryResult};
pub use view::{StructArray, StructView, Value, ViewError, ViewResult};
