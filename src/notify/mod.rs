//! Notification bus backends.

pub mod bus;
pub mod memory;
pub mod sns;
