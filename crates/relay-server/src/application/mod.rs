//! Application layer: the shared mutable state every transport writes into.

pub mod file_index;
pub mod registry;
