//! # relay-core
//!
//! Shared library for the campus relay containing the text wire protocol
//! (frame decode/encode, server reply codes, heartbeat datagrams) and the
//! static credential table.
//!
//! This crate is used by the relay server and by campus client tooling.
//! It has zero dependencies on sockets, async runtimes, or the filesystem,
//! which keeps the protocol fully unit-testable.
//!
//! - **`protocol`** – how bytes travel over the wire. One TCP read is one
//!   frame; frames are decoded into a typed [`ClientFrame`] and replies are
//!   drawn from the fixed [`ServerReply`] code table. UDP heartbeats have
//!   their own tiny parser.
//!
//! - **`domain`** – pure business rules: the credential table and the
//!   reserved server identity.

pub mod domain;
pub mod protocol;

pub use domain::credentials::{CredentialEntry, CredentialTable, DEFAULT_SERVER_IDENTITY};
pub use protocol::frame::{decode_frame, tagged_delivery, ClientFrame, FrameError, ServerReply};
pub use protocol::heartbeat::parse_heartbeat;
pub use protocol::MAX_FRAME_LEN;
