//! Type registry, layout declaration front ends, and the shared offset resolver.

pub mod align;
pub mod builder;
pub mod descriptor;
pub mod encoding;
pub mod error;
pub mod member;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod scalar;

pub use align::{align_up, checked_align_up, is_power_of_two};
pub use builder::LayoutBuilder;
pub use descriptor::StructDescriptor;
pub use encoding::{parse, parse_with, render, render_member};
pub use error::{LayoutError, LayoutResult};
pub use member::MemberDeclaration;
pub use record::{OpaqueType, TypeInfo, TypeRecord};
pub use registry::{TypeId, TypeRegistry};
pub use resolver::{LayoutNode, LayoutScope, ResolvedLayout, ScopeKind};
pub use scalar::{ScalarEncoding, ScalarType, ScalarValue};
