//! Typed views: read/write projections of memory through struct descriptors.

pub mod array;
pub mod error;
pub mod structure;
pub mod value;

pub use array::StructArray;
pub use error::{ViewError, ViewResult};
pub use structure::StructView;
pub use value::Value;
