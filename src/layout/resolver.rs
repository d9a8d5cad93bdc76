//! Offset and size resolution shared by the encoding parser and the scoped builder.
//!
//! Struct scopes place members sequentially, each at the running offset rounded up to the
//! member's alignment. Union scopes place every member at the scope's base offset rounded up
//! to that member's alignment. A nested scope is placed exactly like a member of its computed
//! size and alignment, then resolved with its own offset as base.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::align::checked_align_up;
use super::error::{LayoutError, LayoutResult};
use super::member::MemberDeclaration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ScopeKind {
    Struct,
    Union,
}

#[derive(Clone, Debug)]
pub enum LayoutNode {
    Member(MemberDeclaration),
    Scope(LayoutScope),
}

impl LayoutNode {
    fn alignment(&self) -> usize {
        match self {
            LayoutNode::Member(member) => member.alignment,
            LayoutNode::Scope(scope) => scope.alignment(),
        }
    }

}

fn scope_overflow() -> LayoutError {
    LayoutError::Overflow("<scope>".to_owned())
}

/// Transient grouping of members used while a layout is under construction.
#[derive(Clone, Debug)]
pub struct LayoutScope {
    pub kind: ScopeKind,
    pub base_offset: usize,
    pub size: usize,
    natural_alignment: usize,
    alignment_override: Option<usize>,
    nodes: Vec<LayoutNode>,
}

impl LayoutScope {
    pub fn new(kind: ScopeKind, alignment_override: Option<usize>) -> Self {
        Self {
            kind,
            base_offset: 0,
            size: 0,
            natural_alignment: 1,
            alignment_override,
            nodes: Vec::new(),
        }
    }

    /// The override when one was supplied, otherwise the largest direct member alignment.
    /// An override smaller than the natural alignment is accepted as-is; keeping it large
    /// enough is the caller's responsibility.
    pub fn alignment(&self) -> usize {
        self.alignment_override.unwrap_or(self.natural_alignment)
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn push_member(&mut self, member: MemberDeclaration) {
        self.natural_alignment = self.natural_alignment.max(member.alignment);
        self.nodes.push(LayoutNode::Member(member));
    }

    /// A closed child scope's alignment acts as a lower bound on this scope's alignment.
    pub fn push_scope(&mut self, child: LayoutScope) {
        self.natural_alignment = self.natural_alignment.max(child.alignment());
        self.nodes.push(LayoutNode::Scope(child));
    }

    pub fn member_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                LayoutNode::Member(_) => 1,
                LayoutNode::Scope(scope) => scope.member_count(),
            })
            .sum()
    }

    fn adjust(&mut self, start_at: usize) -> LayoutResult<()> {
        let base = checked_align_up(start_at, self.alignment()).ok_or_else(scope_overflow)?;
        let mut offset = base;
        self.base_offset = base;
        self.size = 0;
        for node in &mut self.nodes {
            let placed = checked_align_up(offset, node.alignment()).ok_or_else(scope_overflow)?;
            let end = match node {
                LayoutNode::Member(member) => {
                    let end = member.end_at(placed)?;
                    member.offset = placed;
                    end
                }
                LayoutNode::Scope(scope) => {
                    scope.adjust(placed)?;
                    placed.checked_add(scope.size).ok_or_else(scope_overflow)?
                }
            };
            match self.kind {
                ScopeKind::Union => self.size = self.size.max(end - base),
                ScopeKind::Struct => {
                    self.size = end - base;
                    offset = end;
                }
            }
        }
        Ok(())
    }

    fn flatten_into(self, out: &mut Vec<MemberDeclaration>) {
        for node in self.nodes {
            match node {
                LayoutNode::Member(member) => out.push(member),
                LayoutNode::Scope(scope) => scope.flatten_into(out),
            }
        }
    }
}

/// Final offsets plus the overall size and alignment of a top-level type.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedLayout {
    pub members: Vec<MemberDeclaration>,
    pub size: usize,
    pub aligned_size: usize,
    pub alignment: usize,
}

impl ResolvedLayout {
    /// Resolves a scope tree depth-first, assigning absolute offsets, and flattens it.
    pub fn resolve(mut root: LayoutScope) -> LayoutResult<Self> {
        if root.member_count() == 0 {
            return Err(LayoutError::EmptyLayout);
        }
        root.adjust(0)?;
        let alignment = root.alignment();
        let size = root.size;
        let aligned_size = checked_align_up(size, alignment).ok_or_else(scope_overflow)?;
        let mut members = Vec::new();
        root.flatten_into(&mut members);
        Ok(Self {
            members,
            size,
            aligned_size,
            alignment,
        })
    }

    /// Summarizes members whose offsets are already final.
    pub fn from_members(members: Vec<MemberDeclaration>) -> LayoutResult<Self> {
        if members.is_empty() {
            return Err(LayoutError::EmptyLayout);
        }
        let alignment = members.iter().map(|m| m.alignment).max().unwrap_or(1);
        let mut size = 0;
        for member in &members {
            size = size.max(member.end_at(member.offset)?);
        }
        let aligned_size = checked_align_up(size, alignment)
            .ok_or_else(|| LayoutError::Overflow("<layout>".to_owned()))?;
        Ok(Self {
            members,
            size,
            aligned_size,
            alignment,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Resolution laws for struct, union, and nested scopes.
    use super::*;
    use crate::layout::record::{OpaqueType, TypeInfo, TypeRecord};

    fn member(name: &str, size: usize, alignment: usize) -> MemberDeclaration {
        let info = TypeInfo {
            name: format!("blob{size}"),
            size,
            alignment,
            record: TypeRecord::Opaque(OpaqueType { byte_size: size }),
        };
        MemberDeclaration::new(name, &info, 1, alignment, 0).unwrap()
    }

    fn offsets(layout: &ResolvedLayout) -> Vec<usize> {
        layout.members.iter().map(|m| m.offset).collect()
    }

    #[test]
    fn struct_members_are_sequential() {
        let mut root = LayoutScope::new(ScopeKind::Struct, None);
        root.push_member(member("a", 4, 4));
        root.push_member(member("b", 8, 8));
        root.push_member(member("c", 2, 2));
        let layout = ResolvedLayout::resolve(root).unwrap();
        assert_eq!(offsets(&layout), vec![0, 8, 16]);
        assert_eq!(layout.size, 18);
        assert_eq!(layout.alignment, 8);
        assert_eq!(layout.aligned_size, 24);
    }

    #[test]
    fn union_members_overlap() {
        let mut root = LayoutScope::new(ScopeKind::Union, None);
        root.push_member(member("a", 4, 4));
        root.push_member(member("b", 8, 8));
        let layout = ResolvedLayout::resolve(root).unwrap();
        assert_eq!(offsets(&layout), vec![0, 0]);
        assert_eq!(layout.size, 8);
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn nested_union_is_placed_like_a_member() {
        // struct { a(4/4); union { b(8/8); c(2/2) } } puts the union at 8
        let mut inner = LayoutScope::new(ScopeKind::Union, None);
        inner.push_member(member("b", 8, 8));
        inner.push_member(member("c", 2, 2));
        let mut root = LayoutScope::new(ScopeKind::Struct, None);
        root.push_member(member("a", 4, 4));
        root.push_scope(inner);
        let layout = ResolvedLayout::resolve(root).unwrap();
        assert_eq!(offsets(&layout), vec![0, 8, 8]);
        assert_eq!(layout.size, 16);
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn union_members_with_smaller_override_split_apart() {
        // a union aligned to 4 starting at 4 places a u32 at 4 and a u64 at 8
        let mut inner = LayoutScope::new(ScopeKind::Union, Some(4));
        inner.push_member(member("small", 4, 4));
        inner.push_member(member("wide", 8, 8));
        let mut root = LayoutScope::new(ScopeKind::Struct, None);
        root.push_member(member("head", 4, 4));
        root.push_scope(inner);
        let layout = ResolvedLayout::resolve(root).unwrap();
        assert_eq!(offsets(&layout), vec![0, 4, 8]);
        assert_eq!(layout.size, 16, "union spans 4..16");
        assert_eq!(layout.alignment, 4, "override caps the propagated alignment");
    }

    #[test]
    fn empty_scopes_are_rejected() {
        let mut root = LayoutScope::new(ScopeKind::Struct, None);
        root.push_scope(LayoutScope::new(ScopeKind::Union, None));
        assert_eq!(ResolvedLayout::resolve(root), Err(LayoutError::EmptyLayout));
        assert_eq!(
            ResolvedLayout::from_members(Vec::new()),
            Err(LayoutError::EmptyLayout)
        );
    }

    #[test]
    fn summary_uses_furthest_member_end() {
        // explicit offsets can place an earlier-declared member further out
        let mut far = member("far", 4, 4);
        far.offset = 12;
        let near = member("near", 2, 2);
        let layout = ResolvedLayout::from_members(vec![far, near]).unwrap();
        assert_eq!(layout.size, 16);
        assert_eq!(layout.aligned_size, 16);
    }

    #[test]
    fn placement_past_the_address_space_fails() {
        let mut root = LayoutScope::new(ScopeKind::Struct, None);
        root.push_member(member("head", 8, 8));
        root.push_member(member("tail", usize::MAX - 4, 1));
        assert_eq!(
            ResolvedLayout::resolve(root),
            Err(LayoutError::Overflow("tail".into()))
        );
    }
}
