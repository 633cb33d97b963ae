//! Object storage backends.

pub mod backend;
pub mod memory;
pub mod s3;
