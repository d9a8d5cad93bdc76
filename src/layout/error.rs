use thiserror::Error;

pub type LayoutResult<T> = Result<T, LayoutError>;

/// Failures raised while declaring types or resolving layouts. Every check happens at the
/// point of declaration so a failed construction never yields a partial layout.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("invalid length {length} for `{name}`: must be at least 1")]
    InvalidLength { name: String, length: usize },
    #[error("invalid alignment {alignment} for `{name}`: must be a non-zero power of two")]
    InvalidAlignment { name: String, alignment: usize },
    #[error("member `{0}` is already declared in this layout")]
    DuplicateMember(String),
    #[error("type `{0}` is already defined")]
    DuplicateType(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("no valid member declarations found in encoding")]
    EmptyEncoding,
    #[error("layout declares no members")]
    EmptyLayout,
    #[error("`{0}` does not fit in the address space")]
    Overflow(String),
    #[error("scope mismatch: {0}")]
    ScopeMismatch(&'static str),
}
