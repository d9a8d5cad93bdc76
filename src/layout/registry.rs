//! Canonical table of named types plus the aliases that resolve onto them.

use std::num::NonZeroU32;
use std::sync::{Arc, OnceLock, RwLock};

use ahash::AHashMap;
use tracing::debug;

use crate::config::LayoutConfig;

use super::align::{check_alignment, check_length};
use super::builder::LayoutBuilder;
use super::descriptor::StructDescriptor;
use super::encoding;
use super::error::{LayoutError, LayoutResult};
use super::record::{OpaqueType, TypeInfo, TypeRecord};
use super::resolver::{ResolvedLayout, ScopeKind};
use super::scalar::{self, ScalarType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(NonZeroU32);

impl TypeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index as u32))
    }

    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Types are registered once and live as long as the registry. Names and aliases share one
/// namespace, and every composite must be registered before another layout can use it.
#[derive(Debug)]
pub struct TypeRegistry {
    config: LayoutConfig,
    records: Vec<TypeInfo>,
    names: AHashMap<String, TypeId>,
    aliases: AHashMap<String, String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        let mut registry = Self {
            config,
            records: Vec::new(),
            names: AHashMap::new(),
            aliases: AHashMap::new(),
        };
        if registry.config.prelude {
            registry.install_prelude();
        }
        registry
    }

    /// Lazily created process-wide registry for hosts that prefer ambient state.
    pub fn global() -> &'static RwLock<TypeRegistry> {
        static GLOBAL: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(TypeRegistry::new()))
    }

    fn install_prelude(&mut self) {
        for native in scalar::native_scalars() {
            self.insert(TypeInfo {
                name: native.name.to_owned(),
                size: native.scalar.byte_size,
                alignment: native.alignment,
                record: TypeRecord::Scalar(native.scalar),
            });
        }
        for (short, long) in scalar::SHORT_NAMES {
            if self.names.contains_key(*long) {
                self.aliases.insert((*short).to_owned(), (*long).to_owned());
            }
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `None` for ids handed out by a different registry.
    pub fn get(&self, id: TypeId) -> Option<&TypeInfo> {
        self.records.get(id.index())
    }

    /// Whether `name` is taken by a type or an alias.
    pub fn is_defined(&self, name: &str) -> bool {
        self.names.contains_key(name) || self.aliases.contains_key(name)
    }

    /// Registers an opaque type of the given size and alignment.
    pub fn register(&mut self, name: &str, size: usize, alignment: usize) -> LayoutResult<TypeId> {
        self.ensure_available(name)?;
        let alignment = check_alignment(name, alignment)?;
        debug!(name, size, alignment, "registering opaque type");
        Ok(self.insert(TypeInfo {
            name: name.to_owned(),
            size,
            alignment,
            record: TypeRecord::Opaque(OpaqueType { byte_size: size }),
        }))
    }

    pub fn register_scalar(
        &mut self,
        name: &str,
        scalar: ScalarType,
        alignment: usize,
    ) -> LayoutResult<TypeId> {
        self.ensure_available(name)?;
        let alignment = check_alignment(name, alignment)?;
        debug!(name, size = scalar.byte_size, alignment, "registering scalar type");
        Ok(self.insert(TypeInfo {
            name: name.to_owned(),
            size: scalar.byte_size,
            alignment,
            record: TypeRecord::Scalar(scalar),
        }))
    }

    /// Makes a composite usable as a member type. The registered size is the descriptor's
    /// aligned size, matching `sizeof` for the equivalent C declaration.
    pub fn register_composite(
        &mut self,
        name: &str,
        descriptor: Arc<StructDescriptor>,
    ) -> LayoutResult<TypeId> {
        self.ensure_available(name)?;
        debug!(
            name,
            size = descriptor.aligned_size(),
            alignment = descriptor.alignment(),
            "registering composite type"
        );
        Ok(self.insert(TypeInfo {
            name: name.to_owned(),
            size: descriptor.aligned_size(),
            alignment: descriptor.alignment(),
            record: TypeRecord::Composite(descriptor),
        }))
    }

    /// Adds `new_name` as another spelling of `existing`. Aliasing a name to itself is a
    /// no-op.
    pub fn alias(&mut self, new_name: &str, existing: &str) -> LayoutResult<()> {
        let canonical = self.resolve(existing)?.to_owned();
        if new_name == existing {
            return Ok(());
        }
        self.ensure_available(new_name)?;
        debug!(alias = new_name, target = %canonical, "registering type alias");
        self.aliases.insert(new_name.to_owned(), canonical);
        Ok(())
    }

    /// Follows the alias chain from `name` to a registered type name.
    pub fn resolve<'a>(&'a self, name: &'a str) -> LayoutResult<&'a str> {
        let mut current = name;
        for _ in 0..=self.aliases.len() {
            if let Some((canonical, _)) = self.names.get_key_value(current) {
                return Ok(canonical.as_str());
            }
            match self.aliases.get(current) {
                Some(next) => current = next.as_str(),
                None => break,
            }
        }
        Err(LayoutError::UnknownType(name.to_owned()))
    }

    pub fn id_of(&self, name: &str) -> LayoutResult<TypeId> {
        let canonical = self.resolve(name)?;
        self.names
            .get(canonical)
            .copied()
            .ok_or_else(|| LayoutError::UnknownType(name.to_owned()))
    }

    pub fn lookup(&self, name: &str) -> LayoutResult<&TypeInfo> {
        let id = self.id_of(name)?;
        self.get(id)
            .ok_or_else(|| LayoutError::UnknownType(name.to_owned()))
    }

    pub fn size_of(&self, name: &str) -> LayoutResult<usize> {
        self.lookup(name).map(|info| info.size)
    }

    pub fn alignment_of(&self, name: &str) -> LayoutResult<usize> {
        self.lookup(name).map(|info| info.alignment)
    }

    /// Registered composite descriptor for `name`, if it names one.
    pub fn descriptor(&self, name: &str) -> LayoutResult<Option<Arc<StructDescriptor>>> {
        self.lookup(name)
            .map(|info| info.record.as_composite().cloned())
    }

    /// Renders a single member declaration, defaulting the alignment from the registry.
    pub fn member_encoding(
        &self,
        name: &str,
        type_name: &str,
        length: usize,
        alignment: Option<usize>,
    ) -> LayoutResult<String> {
        let info = self.lookup(type_name)?;
        let length = check_length(name, length)?;
        let alignment = check_alignment(name, alignment.unwrap_or(info.alignment))?;
        Ok(format!("{name}:{}[{length}]:{alignment}", info.name))
    }

    pub fn builder(&self, kind: ScopeKind) -> LayoutBuilder<'_> {
        LayoutBuilder::new(self, kind)
    }

    /// Parses `encoding` into a struct descriptor. A named descriptor is registered and can be
    /// used as a member type by later declarations.
    pub fn define_struct(
        &mut self,
        name: Option<&str>,
        encoding: &str,
    ) -> LayoutResult<Arc<StructDescriptor>> {
        if let Some(name) = name {
            self.ensure_available(name)?;
        }
        let members = encoding::parse(self, encoding)?;
        let layout = ResolvedLayout::from_members(members)?;
        self.finish_definition(name, ScopeKind::Struct, encoding.to_owned(), layout)
    }

    /// Builds a descriptor through a [`LayoutBuilder`] rooted at `kind`.
    pub fn define_with<F>(
        &mut self,
        name: Option<&str>,
        kind: ScopeKind,
        body: F,
    ) -> LayoutResult<Arc<StructDescriptor>>
    where
        F: FnOnce(LayoutBuilder<'_>) -> LayoutResult<LayoutBuilder<'_>>,
    {
        if let Some(name) = name {
            self.ensure_available(name)?;
        }
        let layout = body(LayoutBuilder::new(self, kind))?.finish()?;
        let encoding = encoding::render(&layout.members);
        self.finish_definition(name, kind, encoding, layout)
    }

    fn finish_definition(
        &mut self,
        name: Option<&str>,
        kind: ScopeKind,
        encoding: String,
        layout: ResolvedLayout,
    ) -> LayoutResult<Arc<StructDescriptor>> {
        let descriptor = Arc::new(StructDescriptor::new(
            name.map(str::to_owned),
            kind,
            encoding,
            layout,
        ));
        match name {
            Some(name) => {
                self.register_composite(name, descriptor.clone())?;
            }
            None => debug!(
                members = descriptor.len(),
                size = descriptor.size(),
                "defined anonymous composite"
            ),
        }
        Ok(descriptor)
    }

    fn ensure_available(&self, name: &str) -> LayoutResult<()> {
        if self.is_defined(name) {
            Err(LayoutError::DuplicateType(name.to_owned()))
        } else {
            Ok(())
        }
    }

    fn insert(&mut self, info: TypeInfo) -> TypeId {
        let id = TypeId::from_index(self.records.len());
        self.names.insert(info.name.clone(), id);
        self.records.push(info);
        id
    }
}
