//! Item store backends.

pub mod dynamodb;
pub mod item;
pub mod memory;
