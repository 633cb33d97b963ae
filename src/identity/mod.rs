//! Identity provider backends.

pub mod cognito;
pub mod memory;
pub mod provider;
