use super::error::{LayoutError, LayoutResult};
use super::record::{TypeInfo, TypeRecord};

/// One named field with its element type, array length, alignment, and absolute byte offset.
#[derive(Clone, Debug, PartialEq)]
pub struct MemberDeclaration {
    pub name: String,
    /// Canonical name of the element type.
    pub type_name: String,
    pub ty: TypeRecord,
    pub element_size: usize,
    /// `element_size * length`.
    pub size: usize,
    pub length: usize,
    pub alignment: usize,
    pub offset: usize,
}

impl MemberDeclaration {
    /// Fails with [`LayoutError::Overflow`] when the member would extend past `usize::MAX`.
    pub(crate) fn new(
        name: impl Into<String>,
        info: &TypeInfo,
        length: usize,
        alignment: usize,
        offset: usize,
    ) -> LayoutResult<Self> {
        let name = name.into();
        let size = info
            .size
            .checked_mul(length)
            .filter(|size| offset.checked_add(*size).is_some());
        match size {
            Some(size) => Ok(Self {
                name,
                type_name: info.name.clone(),
                ty: info.record.clone(),
                element_size: info.size,
                size,
                length,
                alignment,
                offset,
            }),
            None => Err(LayoutError::Overflow(name)),
        }
    }

    /// First byte past the member.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.size)
    }

    /// First byte past the member placed at `offset`, if that fits.
    pub(crate) fn end_at(&self, offset: usize) -> LayoutResult<usize> {
        offset
            .checked_add(self.size)
            .ok_or_else(|| LayoutError::Overflow(self.name.clone()))
    }

    pub fn element_offset(&self, index: usize) -> Option<usize> {
        (index < self.length).then(|| self.offset + index * self.element_size)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.ty, TypeRecord::Composite(_))
    }
}
