//! Network services: the TCP command channel, the UDP liveness channel,
//! and the periodic liveness monitor.

pub mod heartbeat;
pub mod monitor;
pub mod stream;
