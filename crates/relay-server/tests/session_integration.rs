//! Integration tests for the stream protocol handler and session registry.
//!
//! # Purpose
//!
//! These tests run the real accept loop on a loopback listener and speak the
//! wire protocol through plain `TcpStream`s, the way campus clients do. They
//! verify:
//!
//! - The happy path: authenticate, route a message, receive the tagged push.
//! - The error paths: bad credentials, reserved-identity claims, duplicate
//!   names, offline targets, malformed frames, and a full registry.
//! - File handling: server-addressed FILE frames are persisted and indexed
//!   exactly once and never forwarded; peer-addressed FILE frames arrive
//!   byte-identical.
//! - Cleanup: a disconnect frees the name for a fresh registration.
//!
//! Each test gets its own server on an ephemeral port and its own files
//! directory, so they can run concurrently.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relay_core::protocol::frame::{encode_auth, encode_file, encode_send};
use relay_core::CredentialTable;
use relay_server::application::file_index::FileReceptionIndex;
use relay_server::application::registry::SessionRegistry;
use relay_server::infrastructure::network::stream::{run_stream_listener, ServerContext};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    ctx: Arc<ServerContext>,
    files_dir: PathBuf,
}

impl TestServer {
    /// Starts a relay on an ephemeral loopback port with the default
    /// credential roster.
    async fn start() -> Self {
        Self::start_with_capacity(10).await
    }

    async fn start_with_capacity(max_sessions: usize) -> Self {
        let files_dir = std::env::temp_dir().join(format!("relay_it_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&files_dir).expect("create files dir");

        let ctx = Arc::new(ServerContext {
            registry: Arc::new(SessionRegistry::new(max_sessions)),
            file_index: Arc::new(FileReceptionIndex::new(10)),
            credentials: CredentialTable::default_table(),
            identity: "Islamabad".to_string(),
            files_dir: files_dir.clone(),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(run_stream_listener(listener, Arc::clone(&ctx)));

        Self {
            addr,
            ctx,
            files_dir,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.files_dir).ok();
    }
}

/// One wire-level campus client. Every read is bounded by a timeout so a
/// broken server fails the test instead of hanging it.
struct Client {
    stream: TcpStream,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self { stream }
    }

    /// Connects and authenticates, returning the client and the auth reply.
    async fn authenticate(addr: SocketAddr, campus: &str, secret: &str) -> (Self, Vec<u8>) {
        let mut client = Self::connect(addr).await;
        client.send_frame(&encode_auth(campus, secret)).await;
        let reply = client.read_frame().await;
        (client, reply)
    }

    async fn send_frame(&mut self, frame: &[u8]) {
        self.stream.write_all(frame).await.expect("write frame");
    }

    async fn read_frame(&mut self) -> Vec<u8> {
        let mut buf = vec![0u8; 8192];
        let n = tokio::time::timeout(READ_TIMEOUT, self.stream.read(&mut buf))
            .await
            .expect("read timed out")
            .expect("read frame");
        buf.truncate(n);
        buf
    }
}

/// Polls until `predicate` holds or the deadline passes.
async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..100 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within deadline");
}

// ── Authentication ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_valid_credentials_get_auth_ok() {
    let server = TestServer::start().await;
    let (_client, reply) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply, b"AUTH_OK");
}

#[tokio::test]
async fn test_bad_credentials_get_auth_fail() {
    let server = TestServer::start().await;
    let (_client, reply) = Client::authenticate(server.addr, "Lahore", "wrong").await;
    assert_eq!(reply, b"AUTH_FAIL");
}

#[tokio::test]
async fn test_reserved_server_identity_is_never_acceptable() {
    let server = TestServer::start().await;
    let (_client, reply) = Client::authenticate(server.addr, "Islamabad", "anything").await;
    assert_eq!(reply, b"AUTH_FAIL");
}

#[tokio::test]
async fn test_duplicate_name_rejected_while_first_is_connected() {
    let server = TestServer::start().await;

    let (_a, reply_a) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply_a, b"AUTH_OK");

    let (_b, reply_b) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply_b, b"AUTH_FAIL_DUPLICATE");

    // The first session is untouched.
    assert!(server.ctx.registry.lookup("Lahore").is_some());
}

#[tokio::test]
async fn test_full_registry_rejects_with_server_full_and_keeps_existing() {
    let server = TestServer::start_with_capacity(1).await;

    let (_a, reply_a) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply_a, b"AUTH_OK");

    let (_b, reply_b) = Client::authenticate(server.addr, "Karachi", "NU-KHI-123").await;
    assert_eq!(reply_b, b"SERVER_FULL");

    assert_eq!(server.ctx.registry.len(), 1);
    assert!(server.ctx.registry.lookup("Lahore").is_some());
}

// ── Message routing ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_spec_scenario_duplicate_offline_then_delivery() {
    let server = TestServer::start().await;

    // A authenticates as Lahore.
    let (mut a, reply) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply, b"AUTH_OK");

    // B tries the same name while A is connected.
    let (_b, reply) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply, b"AUTH_FAIL_DUPLICATE");

    // Karachi is absent: the message is dropped, not queued.
    a.send_frame(&encode_send("Karachi", "hello")).await;
    assert_eq!(a.read_frame().await, b"TARGET_OFFLINE");

    // C authenticates as Karachi; the resend now routes.
    let (mut c, reply) = Client::authenticate(server.addr, "Karachi", "NU-KHI-123").await;
    assert_eq!(reply, b"AUTH_OK");

    a.send_frame(&encode_send("Karachi", "hello")).await;
    assert_eq!(a.read_frame().await, b"DELIVERED");
    assert_eq!(c.read_frame().await, b"From Lahore: hello");
}

#[tokio::test]
async fn test_send_to_server_identity_is_recorded_locally() {
    let server = TestServer::start().await;
    let (mut a, _) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;

    a.send_frame(&encode_send("Islamabad", "hello server")).await;
    assert_eq!(a.read_frame().await, b"DELIVERED_TO_SERVER");
}

#[tokio::test]
async fn test_malformed_frames_get_error_replies_and_connection_stays_open() {
    let server = TestServer::start().await;
    let (mut a, _) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;

    a.send_frame(b"NONSENSE").await;
    assert_eq!(a.read_frame().await, b"UNKNOWN_CMD");

    a.send_frame(b"SEND|missing-text").await;
    assert_eq!(a.read_frame().await, b"BAD_FORMAT");

    a.send_frame(b"FILE|only|two-fields").await;
    assert_eq!(a.read_frame().await, b"INVALID_FILE_FORMAT");

    // Still authenticated and processing commands in order.
    a.send_frame(&encode_send("Islamabad", "still here")).await;
    assert_eq!(a.read_frame().await, b"DELIVERED_TO_SERVER");
}

// ── File transfer ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_spec_scenario_server_addressed_file_saved_and_indexed_once() {
    let server = TestServer::start().await;
    let (mut a, _) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;

    a.send_frame(&encode_file("Islamabad", "notes.txt", b"hi there"))
        .await;
    assert_eq!(a.read_frame().await, b"FILE_SAVED_ON_SERVER");

    let records = server.ctx.file_index.list();
    assert_eq!(records.len(), 1, "exactly one record per success");
    assert_eq!(records[0].sender, "Lahore");
    assert_eq!(records[0].original_name, "notes.txt");

    let stored = std::fs::read(&records[0].stored_path).expect("stored file on disk");
    assert_eq!(stored, b"hi there");
}

#[tokio::test]
async fn test_file_forwarded_to_peer_byte_identical() {
    let server = TestServer::start().await;
    let (mut a, _) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    let (mut c, _) = Client::authenticate(server.addr, "Karachi", "NU-KHI-123").await;

    let frame = encode_file("Karachi", "report.bin", &[0u8, 1, 2, b'|', 0xFF]);
    a.send_frame(&frame).await;
    assert_eq!(a.read_frame().await, b"FILE_FORWARDED");
    assert_eq!(c.read_frame().await, frame);

    // Forwarding never touches the server's index or disk.
    assert!(server.ctx.file_index.is_empty());
}

#[tokio::test]
async fn test_file_to_offline_target_is_dropped() {
    let server = TestServer::start().await;
    let (mut a, _) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;

    a.send_frame(&encode_file("Peshawar", "notes.txt", b"unseen"))
        .await;
    assert_eq!(a.read_frame().await, b"TARGET_OFFLINE");
    assert!(server.ctx.file_index.is_empty());
}

// ── Lifecycle ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_frees_name_for_reconnection() {
    let server = TestServer::start().await;

    let (a, reply) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply, b"AUTH_OK");
    drop(a);

    let registry = Arc::clone(&server.ctx.registry);
    wait_until(move || registry.lookup("Lahore").is_none()).await;

    let (_a2, reply) = Client::authenticate(server.addr, "Lahore", "NU-LHR-123").await;
    assert_eq!(reply, b"AUTH_OK");
}

#[tokio::test]
async fn test_failed_auth_leaves_no_session_behind() {
    let server = TestServer::start().await;
    let (_x, reply) = Client::authenticate(server.addr, "Lahore", "wrong").await;
    assert_eq!(reply, b"AUTH_FAIL");
    assert!(server.ctx.registry.is_empty());
}
