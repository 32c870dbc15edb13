//! Liveness monitor: fixed-interval, read-only reporter over the registry.
//!
//! Every period it takes a snapshot and logs one line per session with its
//! connectivity kind and heartbeat age. When the registry is empty it
//! produces no output at all, so an idle server stays quiet. It never
//! mutates the registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::application::registry::{ConnectivityKind, SessionRegistry, SessionSnapshot};

/// Periodic reporting loop. Runs until process shutdown.
pub async fn run_liveness_monitor(registry: Arc<SessionRegistry>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick fires immediately; skip it so a fresh server does not
    // report before anyone could have registered.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let sessions = registry.snapshot();
        if sessions.is_empty() {
            continue;
        }

        let now = Instant::now();
        info!("liveness summary ({} sessions):", sessions.len());
        for session in &sessions {
            info!("  {}", describe(session, now));
        }
    }
}

/// One summary line: name, connectivity kind, heartbeat age or "never".
fn describe(session: &SessionSnapshot, now: Instant) -> String {
    let kind = match session.kind {
        ConnectivityKind::Stream => "stream",
        ConnectivityKind::Provisional => "provisional",
    };
    match session.heartbeat_age(now) {
        Some(age) => format!("{} ({kind}) | last heartbeat {}s ago", session.name, age.as_secs()),
        None => format!("{} ({kind}) | last heartbeat never", session.name),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
