//! Canonical type records stored inside the registry.

use std::sync::Arc;

use super::descriptor::StructDescriptor;
use super::scalar::ScalarType;

/// A registered type with no codec: views move it around as raw bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpaqueType {
    pub byte_size: usize,
}

/// All supported type shapes.
#[derive(Clone, Debug)]
pub enum TypeRecord {
    Scalar(ScalarType),
    Composite(Arc<StructDescriptor>),
    Opaque(OpaqueType),
}

impl TypeRecord {
    pub fn as_scalar(&self) -> Option<&ScalarType> {
        if let TypeRecord::Scalar(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn as_composite(&self) -> Option<&Arc<StructDescriptor>> {
        if let TypeRecord::Composite(value) = self {
            Some(value)
        } else {
            None
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeRecord::Scalar(_) => "scalar",
            TypeRecord::Composite(_) => "struct",
            TypeRecord::Opaque(_) => "opaque",
        }
    }
}

// Composites compare by identity: a descriptor is created once per declared type.
impl PartialEq for TypeRecord {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeRecord::Scalar(lhs), TypeRecord::Scalar(rhs)) => lhs == rhs,
            (TypeRecord::Composite(lhs), TypeRecord::Composite(rhs)) => Arc::ptr_eq(lhs, rhs),
            (TypeRecord::Opaque(lhs), TypeRecord::Opaque(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

/// Name, size, and alignment of a registered type. Immutable once registered.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeInfo {
    pub name: String,
    pub size: usize,
    pub alignment: usize,
    pub record: TypeRecord,
}
