use thiserror::Error;

pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("zero-byte blocks are not permitted")]
    ZeroSize,
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(usize),
    #[error("allocation of {size} bytes aligned to {alignment} failed")]
    AllocationFailed { size: usize, alignment: usize },
    #[error("access offset 0x{offset:X} len {len} exceeds capacity 0x{capacity:X}")]
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },
    #[error("memory block has been freed")]
    Freed,
    #[error("memory block lock has been poisoned due to a prior error")]
    LockPoisoned,
}
