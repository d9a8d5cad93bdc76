//! Fluent, scope-stacked construction of struct and union layouts without encoding text.

use ahash::AHashSet;
use smallvec::SmallVec;

use super::align::{check_alignment, check_length};
use super::error::{LayoutError, LayoutResult};
use super::member::MemberDeclaration;
use super::registry::TypeRegistry;
use super::resolver::{LayoutScope, ResolvedLayout, ScopeKind};

/// Declares members into a stack of nested scopes. Member names must be unique across the
/// whole tree; every check runs at declaration time.
///
/// ```ignore
/// let layout = registry
///     .builder(ScopeKind::Struct)
///     .member("tag", "uint32_t")?
///     .union(None, |u| u.member("i", "int64_t")?.member("f", "double"))?
///     .finish()?;
/// ```
pub struct LayoutBuilder<'reg> {
    registry: &'reg TypeRegistry,
    scopes: SmallVec<[LayoutScope; 4]>,
    names: AHashSet<String>,
}

impl<'reg> LayoutBuilder<'reg> {
    pub fn new(registry: &'reg TypeRegistry, kind: ScopeKind) -> Self {
        let mut scopes = SmallVec::new();
        scopes.push(LayoutScope::new(kind, None));
        Self {
            registry,
            scopes,
            names: AHashSet::new(),
        }
    }

    /// Declares a single element with the type's default alignment.
    pub fn member(self, name: impl AsRef<str>, type_name: &str) -> LayoutResult<Self> {
        self.member_with(name, type_name, 1, None)
    }

    pub fn array(self, name: impl AsRef<str>, type_name: &str, length: usize) -> LayoutResult<Self> {
        self.member_with(name, type_name, length, None)
    }

    /// Multi-dimensional members are stored flat with the product of `dims` as their length.
    pub fn member_dims(
        self,
        name: impl AsRef<str>,
        type_name: &str,
        dims: &[usize],
        alignment: Option<usize>,
    ) -> LayoutResult<Self> {
        let length = dims
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| LayoutError::Overflow(name.as_ref().to_owned()))?;
        self.member_with(name, type_name, length, alignment)
    }

    pub fn member_with(
        mut self,
        name: impl AsRef<str>,
        type_name: &str,
        length: usize,
        alignment: Option<usize>,
    ) -> LayoutResult<Self> {
        let name = name.as_ref();
        if self.names.contains(name) {
            return Err(LayoutError::DuplicateMember(name.to_owned()));
        }
        let info = self.registry.lookup(type_name)?;
        let length = check_length(name, length)?;
        let alignment = check_alignment(name, alignment.unwrap_or(info.alignment))?;
        let member = MemberDeclaration::new(name, info, length, alignment, 0)?;
        self.names.insert(name.to_owned());
        self.current().push_member(member);
        Ok(self)
    }

    /// Opens a nested scope; members declared until the matching [`end_scope`] belong to it.
    ///
    /// [`end_scope`]: LayoutBuilder::end_scope
    pub fn begin_scope(mut self, kind: ScopeKind, alignment: Option<usize>) -> LayoutResult<Self> {
        if let Some(value) = alignment {
            let label = match kind {
                ScopeKind::Struct => "<struct>",
                ScopeKind::Union => "<union>",
            };
            check_alignment(label, value)?;
        }
        self.scopes.push(LayoutScope::new(kind, alignment));
        Ok(self)
    }

    /// Closes the innermost nested scope, making it one member of its parent.
    pub fn end_scope(mut self) -> LayoutResult<Self> {
        if self.scopes.len() < 2 {
            return Err(LayoutError::ScopeMismatch("end_scope without an open nested scope"));
        }
        if let Some(child) = self.scopes.pop() {
            self.current().push_scope(child);
        }
        Ok(self)
    }

    pub fn union<F>(self, alignment: Option<usize>, body: F) -> LayoutResult<Self>
    where
        F: FnOnce(Self) -> LayoutResult<Self>,
    {
        self.scoped(ScopeKind::Union, alignment, body)
    }

    pub fn structure<F>(self, alignment: Option<usize>, body: F) -> LayoutResult<Self>
    where
        F: FnOnce(Self) -> LayoutResult<Self>,
    {
        self.scoped(ScopeKind::Struct, alignment, body)
    }

    fn scoped<F>(self, kind: ScopeKind, alignment: Option<usize>, body: F) -> LayoutResult<Self>
    where
        F: FnOnce(Self) -> LayoutResult<Self>,
    {
        let depth = self.scopes.len();
        let inner = body(self.begin_scope(kind, alignment)?)?;
        if inner.scopes.len() != depth + 1 {
            return Err(LayoutError::ScopeMismatch("scope body left nested scopes unbalanced"));
        }
        inner.end_scope()
    }

    /// Resolves offsets for the whole tree and flattens it depth-first.
    pub fn finish(mut self) -> LayoutResult<ResolvedLayout> {
        if self.scopes.len() != 1 {
            return Err(LayoutError::ScopeMismatch("finish called with nested scopes still open"));
        }
        match self.scopes.pop() {
            Some(root) => ResolvedLayout::resolve(root),
            None => Err(LayoutError::EmptyLayout),
        }
    }

    fn current(&mut self) -> &mut LayoutScope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}

#[cfg(test)]
mod tests {
    //! Builder smoke tests mirroring the resolution laws through the public front end.
    use super::*;

    fn offsets(layout: &ResolvedLayout) -> Vec<(String, usize)> {
        layout
            .members
            .iter()
            .map(|m| (m.name.clone(), m.offset))
            .collect()
    }

    #[test]
    fn nested_union_through_closures() {
        // struct { int32_t a; union { int64_t b; int16_t c; } }
        let registry = TypeRegistry::new();
        let layout = LayoutBuilder::new(&registry, ScopeKind::Struct)
            .member("a", "int32_t")
            .and_then(|b| b.union(None, |u| u.member("b", "int64_t")?.member("c", "int16_t")))
            .and_then(LayoutBuilder::finish)
            .unwrap();
        assert_eq!(
            offsets(&layout),
            vec![("a".into(), 0), ("b".into(), 8), ("c".into(), 8)]
        );
        assert_eq!(layout.size, 16);
        assert_eq!(layout.alignment, 8);
    }

    #[test]
    fn imperative_scopes_match_closure_form() {
        let registry = TypeRegistry::new();
        let layout = LayoutBuilder::new(&registry, ScopeKind::Struct)
            .member("a", "int32_t")
            .and_then(|b| b.begin_scope(ScopeKind::Union, None))
            .and_then(|b| b.member("b", "int64_t"))
            .and_then(|b| b.member("c", "int16_t"))
            .and_then(LayoutBuilder::end_scope)
            .and_then(LayoutBuilder::finish)
            .unwrap();
        assert_eq!(layout.members[1].offset, 8);
        assert_eq!(layout.aligned_size, 16);
    }

    #[test]
    fn duplicate_names_are_rejected_across_scopes() {
        // the inner union may not reuse a name from the outer struct
        let registry = TypeRegistry::new();
        let result = LayoutBuilder::new(&registry, ScopeKind::Struct)
            .member("x", "int")
            .and_then(|b| b.union(None, |u| u.member("x", "float")));
        assert!(matches!(result, Err(LayoutError::DuplicateMember(name)) if name == "x"));
    }

    #[test]
    fn invalid_declarations_fail_immediately() {
        let registry = TypeRegistry::new();
        let builder = LayoutBuilder::new(&registry, ScopeKind::Struct);
        assert!(matches!(
            builder.member_with("a", "int", 1, Some(3)),
            Err(LayoutError::InvalidAlignment { alignment: 3, .. })
        ));
        let builder = LayoutBuilder::new(&registry, ScopeKind::Struct);
        assert!(matches!(
            builder.member_with("a", "int", 0, None),
            Err(LayoutError::InvalidLength { length: 0, .. })
        ));
        let builder = LayoutBuilder::new(&registry, ScopeKind::Struct);
        assert!(matches!(
            builder.begin_scope(ScopeKind::Union, Some(0)),
            Err(LayoutError::InvalidAlignment { alignment: 0, .. })
        ));
    }

    #[test]
    fn scope_balance_is_enforced() {
        let registry = TypeRegistry::new();
        let builder = LayoutBuilder::new(&registry, ScopeKind::Struct);
        assert!(matches!(builder.end_scope(), Err(LayoutError::ScopeMismatch(_))));
        let open = LayoutBuilder::new(&registry, ScopeKind::Struct)
            .member("a", "int")
            .and_then(|b| b.begin_scope(ScopeKind::Union, None))
            .unwrap();
        assert!(matches!(open.finish(), Err(LayoutError::ScopeMismatch(_))));
    }

    #[test]
    fn empty_builder_reports_empty_layout() {
        let registry = TypeRegistry::new();
        let result = LayoutBuilder::new(&registry, ScopeKind::Union).finish();
        assert_eq!(result, Err(LayoutError::EmptyLayout));
    }

    #[test]
    fn dims_multiply_into_length() {
        let registry = TypeRegistry::new();
        let layout = LayoutBuilder::new(&registry, ScopeKind::Struct)
            .member_dims("matrix", "float", &[3, 4], None)
            .and_then(LayoutBuilder::finish)
            .unwrap();
        assert_eq!(layout.members[0].length, 12);
        assert_eq!(layout.size, 48);
    }

    #[test]
    fn overflowing_dims_are_refused() {
        let registry = TypeRegistry::new();
        let result = LayoutBuilder::new(&registry, ScopeKind::Struct).member_dims(
            "grid",
            "double",
            &[usize::MAX, 2],
            None,
        );
        assert_eq!(result.err(), Some(LayoutError::Overflow("grid".into())));
        // the product fits but the byte size does not
        let result = LayoutBuilder::new(&registry, ScopeKind::Struct).member_dims(
            "grid",
            "double",
            &[usize::MAX / 4, 2],
            None,
        );
        assert_eq!(result.err(), Some(LayoutError::Overflow("grid".into())));
    }
}
