//! Persistence concerns: configuration on disk.

pub mod config;
