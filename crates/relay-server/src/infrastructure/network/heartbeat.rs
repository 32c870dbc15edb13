//! UDP liveness channel.
//!
//! Campus clients send `Campus:<name>;HB:online` datagrams periodically.
//! The listener binds once at startup and runs for the life of the process,
//! refreshing the sender's registry entry, or creating a provisional,
//! heartbeat-only entry for an unrecognized name if capacity allows.
//!
//! Semantics are strictly fire-and-forget: no acknowledgment, no retry,
//! at most one registry update per datagram. Malformed payloads are
//! dropped silently; a full registry is logged and the datagram dropped.

use std::sync::Arc;
use std::time::Instant;

use relay_core::parse_heartbeat;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::application::registry::{HeartbeatOutcome, SessionRegistry};

/// Largest datagram the listener will consider. Anything longer than a
/// frame is not a heartbeat.
const MAX_DATAGRAM_LEN: usize = 512;

/// Receive loop over the liveness socket. Runs until process shutdown.
pub async fn run_heartbeat_listener(socket: UdpSocket, registry: Arc<SessionRegistry>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("heartbeat recv error: {e}");
                continue;
            }
        };

        let Some(name) = parse_heartbeat(&buf[..len]) else {
            debug!("ignoring malformed datagram from {src}");
            continue;
        };

        match registry.record_heartbeat(&name, src, Instant::now()) {
            Ok(HeartbeatOutcome::Registered) => {
                info!("registered provisional session from heartbeat: {name} ({src})");
            }
            Ok(HeartbeatOutcome::Refreshed) => {
                debug!("heartbeat from {name} ({src})");
            }
            Err(e) => {
                // Non-fatal: the sender simply stays unknown until a slot frees.
                warn!("heartbeat from {name} dropped: {e}");
            }
        }
    }
}
