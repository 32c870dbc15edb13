//! Control plane: broadcast dispatch and file-index inspection.
//!
//! This is the library surface behind the operator console. Broadcasts go
//! out over a fresh ephemeral UDP socket to every session with a recorded
//! datagram address, regardless of its stream status; the registry is only
//! snapshotted, so no send ever happens inside its critical section. File
//! access is read-only over the reception index.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::application::file_index::{FileReceptionIndex, ReceivedFileRecord};
use crate::application::registry::{SessionRegistry, SessionSnapshot};

/// Error type for control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The broadcast socket could not be created.
    #[error("broadcast socket error: {0}")]
    Socket(#[from] std::io::Error),

    /// No file record exists at the requested index.
    #[error("no received file at index {0}")]
    NoSuchFile(usize),

    /// The stored file could not be read back from disk.
    #[error("failed to read stored file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Operator-facing handle over the registry and file index.
pub struct ControlPlane {
    registry: Arc<SessionRegistry>,
    index: Arc<FileReceptionIndex>,
}

impl ControlPlane {
    pub fn new(registry: Arc<SessionRegistry>, index: Arc<FileReceptionIndex>) -> Self {
        Self { registry, index }
    }

    /// Read-only view of all sessions, for operator listing.
    pub fn sessions(&self) -> Vec<SessionSnapshot> {
        self.registry.snapshot()
    }

    /// Sends `text` as a datagram to every session with a recorded
    /// datagram address. Returns the number of datagrams sent.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Socket`] if the ephemeral socket cannot be
    /// created. Individual send failures are logged and skipped.
    pub async fn broadcast(&self, text: &str) -> Result<usize, ControlError> {
        let targets: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|s| s.datagram_addr.map(|addr| (s.name, addr)))
            .collect();
        if targets.is_empty() {
            info!("broadcast skipped: no session has a datagram address");
            return Ok(0);
        }

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let mut sent = 0;
        for (name, addr) in targets {
            match socket.send_to(text.as_bytes(), addr).await {
                Ok(_) => sent += 1,
                Err(e) => warn!("broadcast to {name} ({addr}) failed: {e}"),
            }
        }
        info!("broadcast sent to {sent} session(s)");
        Ok(sent)
    }

    /// All received-file records in reception order.
    pub fn list_files(&self) -> Vec<ReceivedFileRecord> {
        self.index.list()
    }

    /// Reads back the stored content of the file at `file_index`.
    ///
    /// # Errors
    ///
    /// [`ControlError::NoSuchFile`] for an out-of-range index,
    /// [`ControlError::Read`] if the stored file is unreadable.
    pub async fn open_file(
        &self,
        file_index: usize,
    ) -> Result<(ReceivedFileRecord, Vec<u8>), ControlError> {
        let record = self
            .index
            .get(file_index)
            .ok_or(ControlError::NoSuchFile(file_index))?;
        let content = tokio::fs::read(&record.stored_path)
            .await
            .map_err(|source| ControlError::Read {
                path: record.stored_path.clone(),
                source,
            })?;
        Ok((record, content))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant, SystemTime};

    fn control_plane() -> ControlPlane {
        ControlPlane::new(
            Arc::new(SessionRegistry::new(8)),
            Arc::new(FileReceptionIndex::new(8)),
        )
    }

    #[tokio::test]
    async fn test_broadcast_with_no_known_addresses_sends_nothing() {
        let cp = control_plane();
        let sent = cp.broadcast("hello campuses").await.unwrap();
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_sessions_with_datagram_addresses() {
        let cp = control_plane();

        // Stand in for a campus client's UDP endpoint.
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();
        cp.registry
            .record_heartbeat("Lahore", addr, Instant::now())
            .unwrap();

        let sent = cp.broadcast("exam schedule posted").await.unwrap();
        assert_eq!(sent, 1);

        let mut buf = [0u8; 128];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("datagram must arrive")
            .unwrap();
        assert_eq!(&buf[..len], b"exam schedule posted");
    }

    #[tokio::test]
    async fn test_open_file_out_of_range_is_distinct_error() {
        let cp = control_plane();
        let err = cp.open_file(3).await.unwrap_err();
        assert!(matches!(err, ControlError::NoSuchFile(3)));
    }

    #[tokio::test]
    async fn test_open_file_reads_stored_content() {
        let cp = control_plane();
        let path = std::env::temp_dir().join(format!(
            "relay_control_test_{}",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, b"file body").unwrap();
        cp.index
            .append(ReceivedFileRecord {
                stored_path: path.clone(),
                original_name: "body.txt".to_string(),
                sender: "Karachi".to_string(),
                received_at: SystemTime::now(),
            })
            .unwrap();

        let (record, content) = cp.open_file(0).await.unwrap();
        assert_eq!(record.sender, "Karachi");
        assert_eq!(content, b"file body");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_list_files_reflects_index() {
        let cp = control_plane();
        assert!(cp.list_files().is_empty());
        cp.index
            .append(ReceivedFileRecord {
                stored_path: PathBuf::from("x"),
                original_name: "x".to_string(),
                sender: "CFD".to_string(),
                received_at: SystemTime::now(),
            })
            .unwrap();
        assert_eq!(cp.list_files().len(), 1);
    }
}
