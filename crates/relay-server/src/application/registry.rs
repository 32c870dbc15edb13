//! SessionRegistry: the single source of truth for routing and liveness.
//!
//! Every transport writes into this one table: the stream handler registers
//! and removes sessions, the heartbeat listener refreshes liveness, the
//! monitor and control plane read snapshots. All of that crosses task
//! boundaries, so every access goes through the registry's one mutex.
//!
//! The critical section is bounded local work only: hash map operations
//! and non-blocking channel pushes. Delivery to a peer is a push onto that
//! peer's outbound channel; the actual socket write happens on the peer's
//! own writer task, outside the lock, so one slow session cannot stall
//! routing for everyone else.
//!
//! A session entry is removed only by the stream handler that owns it,
//! identified by [`ConnId`]. This guards against a race where a client
//! disconnects and reconnects before the old handler finishes cleanup: the
//! stale handler's `remove_stream` no longer matches and leaves the fresh
//! session alone.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc;

/// Outbound write channel of one stream connection. Unbounded so a push
/// never blocks inside the registry critical section.
pub type OutboundSender = mpsc::UnboundedSender<Vec<u8>>;

/// Error type for registry mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// An entry (stream or provisional) already holds this name.
    #[error("a session named '{0}' is already registered")]
    DuplicateName(String),

    /// The table is full; registration never evicts existing entries.
    #[error("registry at capacity ({0} sessions)")]
    CapacityExceeded(usize),
}

/// Process-unique identifier for one accepted stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

impl ConnId {
    /// Allocates the next connection id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a session is currently reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityKind {
    /// Backed by an open stream connection.
    Stream,
    /// Known only via heartbeat; no stream to deliver into.
    Provisional,
}

/// Outcome of an atomic lookup-then-forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The frame was handed to the target's writer task.
    Delivered,
    /// The target is absent, provisional, or its writer is gone. The frame
    /// is dropped; there is no queueing and no retry.
    Offline,
}

/// Outcome of recording a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// An existing entry's liveness fields were updated.
    Refreshed,
    /// A new provisional entry was created for an unrecognized name.
    Registered,
}

/// One session entry. The name lives in the map key.
struct CampusSession {
    transport: Transport,
    last_heartbeat: Option<Instant>,
    datagram_addr: Option<SocketAddr>,
}

enum Transport {
    Provisional,
    Stream { conn: ConnId, tx: OutboundSender },
}

/// Read-only copy of one entry, handed out by [`SessionRegistry::snapshot`].
/// Never a live reference into the table.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub name: String,
    pub kind: ConnectivityKind,
    pub last_heartbeat: Option<Instant>,
    pub datagram_addr: Option<SocketAddr>,
}

impl SessionSnapshot {
    /// Age of the most recent heartbeat, or `None` if one never arrived.
    pub fn heartbeat_age(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat.map(|hb| now.saturating_duration_since(hb))
    }
}

/// Bounded, name-keyed session table shared across all tasks.
pub struct SessionRegistry {
    capacity: usize,
    inner: Mutex<HashMap<String, CampusSession>>,
}

impl SessionRegistry {
    /// Creates an empty registry holding at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Maximum number of simultaneous sessions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registers a stream-connected session under `name`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateName`] if any entry (stream or
    /// provisional) already holds the name; [`RegistryError::CapacityExceeded`]
    /// if the table is full. Existing entries are never evicted.
    pub fn register_stream(
        &self,
        name: &str,
        conn: ConnId,
        tx: OutboundSender,
    ) -> Result<(), RegistryError> {
        let name = name.trim();
        let mut table = self.lock();

        if table.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string()));
        }
        if table.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded(self.capacity));
        }

        table.insert(
            name.to_string(),
            CampusSession {
                transport: Transport::Stream { conn, tx },
                last_heartbeat: None,
                datagram_addr: None,
            },
        );
        Ok(())
    }

    /// Records a heartbeat for `name`: refreshes an existing entry's
    /// liveness fields, or creates a provisional entry if the name is
    /// unrecognized and capacity allows.
    ///
    /// Repeated heartbeats from one name never create duplicate entries.
    ///
    /// # Errors
    ///
    /// [`RegistryError::CapacityExceeded`] when an unrecognized name cannot
    /// be given a slot. Non-fatal; the caller logs and drops the datagram.
    pub fn record_heartbeat(
        &self,
        name: &str,
        addr: SocketAddr,
        now: Instant,
    ) -> Result<HeartbeatOutcome, RegistryError> {
        let name = name.trim();
        let mut table = self.lock();

        if let Some(session) = table.get_mut(name) {
            session.last_heartbeat = Some(now);
            session.datagram_addr = Some(addr);
            return Ok(HeartbeatOutcome::Refreshed);
        }

        if table.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded(self.capacity));
        }
        table.insert(
            name.to_string(),
            CampusSession {
                transport: Transport::Provisional,
                last_heartbeat: Some(now),
                datagram_addr: Some(addr),
            },
        );
        Ok(HeartbeatOutcome::Registered)
    }

    /// Frees the slot held by `name`, but only if its current stream
    /// connection is still `conn`. Returns whether an entry was removed.
    ///
    /// A stale handler (its client already reconnected under a new
    /// connection) finds a different `ConnId` and removes nothing.
    pub fn remove_stream(&self, name: &str, conn: ConnId) -> bool {
        let name = name.trim();
        let mut table = self.lock();

        let owns_entry = matches!(
            table.get(name),
            Some(CampusSession {
                transport: Transport::Stream { conn: current, .. },
                ..
            }) if *current == conn
        );
        if owns_entry {
            table.remove(name);
        }
        owns_entry
    }

    /// Atomically looks up `target` and, if it has an active stream, pushes
    /// `frame` onto its outbound channel. Lookup and push happen in one
    /// critical section so a concurrent deregistration cannot interleave.
    pub fn deliver(&self, target: &str, frame: Vec<u8>) -> DeliveryStatus {
        let table = self.lock();

        match table.get(target.trim()) {
            Some(CampusSession {
                transport: Transport::Stream { tx, .. },
                ..
            }) => {
                // A closed channel means the writer task is gone and the
                // session is mid-teardown: the target is offline.
                if tx.send(frame).is_ok() {
                    DeliveryStatus::Delivered
                } else {
                    DeliveryStatus::Offline
                }
            }
            _ => DeliveryStatus::Offline,
        }
    }

    /// Returns a copy of the entry for `name`, if present.
    pub fn lookup(&self, name: &str) -> Option<SessionSnapshot> {
        let table = self.lock();
        table
            .get(name.trim())
            .map(|session| snapshot_of(name.trim(), session))
    }

    /// Read-only copy of all active entries, sorted by name for stable
    /// iteration. Never hands out live references.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let table = self.lock();
        let mut entries: Vec<SessionSnapshot> = table
            .iter()
            .map(|(name, session)| snapshot_of(name, session))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Number of currently registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no session is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// A poisoned mutex only means another handler panicked mid-update of
    /// plain data; the table itself is still structurally sound.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CampusSession>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot_of(name: &str, session: &CampusSession) -> SessionSnapshot {
    SessionSnapshot {
        name: name.to_string(),
        kind: match session.transport {
            Transport::Stream { .. } => ConnectivityKind::Stream,
            Transport::Provisional => ConnectivityKind::Provisional,
        },
        last_heartbeat: session.last_heartbeat,
        datagram_addr: session.datagram_addr,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
