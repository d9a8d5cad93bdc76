//! The memory block capability consumed by typed views: aligned allocation, explicit free,
//! byte copies, and addresses.

pub mod block;
pub mod error;
mod raw;
pub mod region;

pub use block::MemoryBlock;
pub use error::{MemoryError, MemoryResult};
pub use region::{Addressable, MemoryRegion};
