//! CLI command implementations

pub mod backend;
pub mod gateway;
