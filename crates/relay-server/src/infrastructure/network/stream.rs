//! Stream protocol handler: one task per accepted TCP connection.
//!
//! Each connection walks a three-state machine:
//!
//! ```text
//! AwaitingAuth ──► Authenticated ──► Closed
//! ```
//!
//! - **AwaitingAuth**: exactly one `Campus:<name>;Pass:<secret>` frame is
//!   read. Exactly one reply code is written; any failure closes the
//!   connection without registering a session.
//! - **Authenticated**: command frames are processed strictly in arrival
//!   order; every command gets a synchronous reply before the next frame
//!   is read.
//! - **Closed**: end-of-stream or a read error deregisters the session,
//!   but only if this handler still owns the registry's entry for the name.
//!
//! Socket writes are owned by a dedicated writer task per connection, fed
//! by an unbounded channel. The handler's replies and frames forwarded
//! from other sessions funnel through that one channel, so writes never
//! interleave mid-frame and the registry's critical section only ever
//! pushes onto a channel, never touches the network.
//!
//! Framing: one transport read yields one frame (no length prefix), for
//! compatibility with existing campus clients. This is fragile under
//! partial reads of frames approaching `MAX_FRAME_LEN`; kept deliberately.
//!
//! Deregistration is guaranteed by [`SessionGuard`], a drop guard created
//! immediately after registration, so every exit path (clean EOF, read
//! error, writer teardown) releases the slot exactly once.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use relay_core::{
    decode_frame, tagged_delivery, ClientFrame, CredentialTable, FrameError, ServerReply,
    MAX_FRAME_LEN,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::file_index::{FileReceptionIndex, ReceivedFileRecord};
use crate::application::registry::{ConnId, DeliveryStatus, RegistryError, SessionRegistry};

/// Shared handles every connection handler operates on.
pub struct ServerContext {
    pub registry: Arc<SessionRegistry>,
    pub file_index: Arc<FileReceptionIndex>,
    pub credentials: CredentialTable,
    /// The server's reserved identity; SEND/FILE targets equal to this are
    /// handled locally instead of routed.
    pub identity: String,
    /// Directory server-addressed files are persisted into.
    pub files_dir: PathBuf,
}

/// Accept loop: spawns one handler task per connection. Runs until the
/// process shuts down.
pub async fn run_stream_listener(listener: TcpListener, ctx: Arc<ServerContext>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(stream, peer, ctx).await;
                });
            }
            Err(e) => {
                // Transient accept failures (fd pressure, aborted handshake)
                // affect no existing session.
                warn!("accept failed: {e}");
            }
        }
    }
}

/// Drop guard releasing this connection's registry slot on every exit path.
struct SessionGuard {
    registry: Arc<SessionRegistry>,
    name: String,
    conn: ConnId,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.registry.remove_stream(&self.name, self.conn) {
            info!("session deregistered: {} ({})", self.name, self.conn);
        }
    }
}

/// Runs one connection through the full state machine.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ServerContext>) {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; MAX_FRAME_LEN];

    // ── AwaitingAuth ──────────────────────────────────────────────────────────
    let n = match reader.read(&mut buf).await {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            debug!("read from {peer} failed before auth: {e}");
            return;
        }
    };

    let campus = match authenticate(&buf[..n], &ctx) {
        Ok(campus) => campus,
        Err(reply) => {
            info!("rejected authentication from {peer}: {reply}");
            let _ = writer.write_all(reply.as_bytes()).await;
            return;
        }
    };

    let conn = ConnId::next();
    let (tx, rx) = mpsc::unbounded_channel();
    if let Err(e) = ctx.registry.register_stream(&campus, conn, tx.clone()) {
        let reply = match e {
            RegistryError::DuplicateName(_) => ServerReply::AuthFailDuplicate,
            RegistryError::CapacityExceeded(_) => ServerReply::ServerFull,
        };
        info!("rejected registration for {campus} from {peer}: {e}");
        let _ = writer.write_all(reply.as_bytes()).await;
        return;
    }

    // Registered: from here on the slot must be released on every path.
    let _guard = SessionGuard {
        registry: Arc::clone(&ctx.registry),
        name: campus.clone(),
        conn,
    };
    tokio::spawn(run_writer(writer, rx));

    info!("authenticated stream session: {campus} ({conn}, {peer})");
    if tx.send(ServerReply::AuthOk.as_bytes().to_vec()).is_err() {
        return;
    }

    // ── Authenticated ─────────────────────────────────────────────────────────
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("read error on session {campus}: {e}");
                break;
            }
        };

        let reply = dispatch_frame(&buf[..n], &campus, &ctx).await;
        if tx.send(reply.as_bytes().to_vec()).is_err() {
            // Writer task is gone; the peer can no longer see outcomes.
            break;
        }
    }

    // ── Closed ────────────────────────────────────────────────────────────────
    info!("stream session closed: {campus}");
    // _guard drops here; once the registry's sender clone goes with it, the
    // writer task drains and exits on its own.
}

/// Writer task: sole owner of the socket's write half.
async fn run_writer(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            debug!("socket write failed: {e}");
            break;
        }
    }
}

/// Validates the one-shot authentication frame.
///
/// # Errors
///
/// Returns the exact reply code to send before closing: `AUTH_FAIL` for a
/// non-auth frame, bad credentials, or a reserved-identity claim.
fn authenticate(frame: &[u8], ctx: &ServerContext) -> Result<String, ServerReply> {
    let ClientFrame::Auth { campus, secret } =
        decode_frame(frame).map_err(|_| ServerReply::AuthFail)?
    else {
        return Err(ServerReply::AuthFail);
    };

    if campus == ctx.identity {
        // The server's own name is never acceptable as a client identity.
        return Err(ServerReply::AuthFail);
    }
    if !ctx.credentials.verify(&campus, &secret) {
        return Err(ServerReply::AuthFail);
    }
    Ok(campus)
}

/// Dispatches one authenticated command frame and returns the reply code.
///
/// `raw` is kept alongside the decoded form because FILE forwarding relays
/// the identical frame bytes, so the recipient decodes exactly what the
/// sender produced.
async fn dispatch_frame(raw: &[u8], campus: &str, ctx: &ServerContext) -> ServerReply {
    match decode_frame(raw) {
        Ok(ClientFrame::Send { target, text }) => {
            if target == ctx.identity {
                info!("message to server from {campus}: {text}");
                return ServerReply::DeliveredToServer;
            }
            match ctx.registry.deliver(&target, tagged_delivery(campus, &text)) {
                DeliveryStatus::Delivered => {
                    info!("routed message from {campus} to {target}");
                    ServerReply::Delivered
                }
                DeliveryStatus::Offline => {
                    info!("message from {campus} to {target} dropped (offline)");
                    ServerReply::TargetOffline
                }
            }
        }

        Ok(ClientFrame::File {
            target,
            filename,
            content,
        }) => {
            if target == ctx.identity {
                return save_incoming_file(campus, &filename, &content, ctx).await;
            }
            match ctx.registry.deliver(&target, raw.to_vec()) {
                DeliveryStatus::Delivered => {
                    info!("forwarded file '{filename}' from {campus} to {target}");
                    ServerReply::FileForwarded
                }
                DeliveryStatus::Offline => {
                    info!("file forward from {campus} to {target} dropped (offline)");
                    ServerReply::TargetOffline
                }
            }
        }

        // A second auth frame after authentication is not a command.
        Ok(ClientFrame::Auth { .. }) => ServerReply::UnknownCmd,

        Err(FrameError::MalformedSend) => ServerReply::BadFormat,
        Err(FrameError::MalformedFile) => ServerReply::InvalidFileFormat,
        Err(_) => ServerReply::UnknownCmd,
    }
}

/// Persists a server-addressed file and appends it to the reception index.
///
/// Index overflow is reported to the log only; the file already landed on
/// disk, so the sender still sees success. A write failure surfaces as
/// `SERVER_SAVE_ERR` to this sender and affects nothing else.
async fn save_incoming_file(
    campus: &str,
    filename: &str,
    content: &[u8],
    ctx: &ServerContext,
) -> ServerReply {
    let path = ctx.files_dir.join(stored_file_name(campus, filename));

    match tokio::fs::write(&path, content).await {
        Ok(()) => {
            let record = ReceivedFileRecord {
                stored_path: path.clone(),
                original_name: filename.to_string(),
                sender: campus.to_string(),
                received_at: SystemTime::now(),
            };
            if let Err(e) = ctx.file_index.append(record) {
                warn!("file saved but not indexed: {e}");
            }
            info!("saved file from {campus} as {}", path.display());
            ServerReply::FileSavedOnServer
        }
        Err(e) => {
            warn!("failed to save file '{filename}' from {campus}: {e}");
            ServerReply::ServerSaveErr
        }
    }
}

/// Deterministic stored name: `received_from_<sender>_<filename>`, with
/// path separators stripped so a peer cannot escape the files directory.
/// Collisions overwrite; last write wins.
fn stored_file_name(sender: &str, filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("received_from_{sender}_{sanitized}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
