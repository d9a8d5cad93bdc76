use thiserror::Error;

use crate::layout::LayoutError;
use crate::memory::MemoryError;

pub type ViewResult<T> = Result<T, ViewError>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("index {index} out of range for member `{member}` of length {length}")]
    IndexOutOfRange {
        member: String,
        index: usize,
        length: usize,
    },
    #[error("view used after its memory was freed")]
    UseAfterFree,
    #[error("member `{member}` expects {expected}, got {found}")]
    TypeMismatch {
        member: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("no member named `{0}`")]
    UnknownMember(String),
    #[error("source of {available} bytes is too small; {required} bytes required")]
    InsufficientSize { required: usize, available: usize },
    #[error(transparent)]
    Memory(MemoryError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl From<MemoryError> for ViewError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Freed => ViewError::UseAfterFree,
            other => ViewError::Memory(other),
        }
    }
}
