//! The frozen, queryable layout of a composite type.

use std::fmt;

use ahash::AHashMap;

use super::member::MemberDeclaration;
use super::resolver::{ResolvedLayout, ScopeKind};

/// Flattened members with absolute offsets plus the type's overall size and alignment.
/// Built once per declared type and never mutated afterwards.
#[derive(Debug)]
pub struct StructDescriptor {
    name: Option<String>,
    kind: ScopeKind,
    encoding: String,
    members: Vec<MemberDeclaration>,
    size: usize,
    aligned_size: usize,
    alignment: usize,
    name_index: AHashMap<String, usize>,
}

impl StructDescriptor {
    pub(crate) fn new(
        name: Option<String>,
        kind: ScopeKind,
        encoding: String,
        layout: ResolvedLayout,
    ) -> Self {
        let name_index = layout
            .members
            .iter()
            .enumerate()
            .map(|(index, member)| (member.name.clone(), index))
            .collect();
        Self {
            name,
            kind,
            encoding,
            members: layout.members,
            size: layout.size,
            aligned_size: layout.aligned_size,
            alignment: layout.alignment,
            name_index,
        }
    }

    /// Registered name, if the type was defined with one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Encoding text the type was declared with, or the rendered form for builder layouts.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn members(&self) -> &[MemberDeclaration] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// `size` rounded up to `alignment`; the stride of consecutive elements.
    pub fn aligned_size(&self) -> usize {
        self.aligned_size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn member(&self, name: &str) -> Option<&MemberDeclaration> {
        self.name_index.get(name).map(|&index| &self.members[index])
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.member(name).map(|m| m.offset)
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.member(name).map(|m| m.type_name.as_str())
    }

    pub fn size_of(&self, name: &str) -> Option<usize> {
        self.member(name).map(|m| m.size)
    }

    pub fn alignment_of(&self, name: &str) -> Option<usize> {
        self.member(name).map(|m| m.alignment)
    }

    pub fn length_of(&self, name: &str) -> Option<usize> {
        self.member(name).map(|m| m.length)
    }
}

impl fmt::Display for StructDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self.kind {
            ScopeKind::Struct => "struct",
            ScopeKind::Union => "union",
        };
        write!(
            f,
            "{keyword} {}:{}:{}",
            self.name.as_deref().unwrap_or("<anonymous>"),
            self.aligned_size,
            self.alignment
        )
    }
}
