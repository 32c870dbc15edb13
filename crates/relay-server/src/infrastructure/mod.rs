//! Infrastructure layer: sockets, timers, disk, and the operator surface.

pub mod console;
pub mod control;
pub mod network;
pub mod storage;
