//! Text codec for campus relay stream frames.
//!
//! Wire format (one transport read = one frame, no length prefix):
//!
//! ```text
//! Campus:<name>;Pass:<secret>          first frame on a connection only
//! SEND|<target>|<text>                 text may itself contain '|'
//! FILE|<target>|<filename>|<content>   content is the remainder, any bytes
//! ```
//!
//! Header fields (command word, target, filename, auth fields) must be
//! UTF-8; FILE content is carried as raw bytes. Decoding produces a tagged
//! [`ClientFrame`] variant so malformed input surfaces as a distinct
//! [`FrameError`] instead of being mis-sliced silently.

use std::fmt;

use thiserror::Error;

/// Errors produced while decoding a client frame.
///
/// Each variant maps onto the reply code the server sends for that class
/// of malformed input, so the handler can translate mechanically.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame did not match the `Campus:<name>;Pass:<secret>` shape,
    /// or the campus name was empty after trimming.
    #[error("malformed authentication frame")]
    MalformedAuth,

    /// A `SEND|` frame was missing its target delimiter or carried
    /// non-UTF-8 header bytes.
    #[error("malformed SEND frame")]
    MalformedSend,

    /// A `FILE|` frame was missing one of its two header delimiters or
    /// carried non-UTF-8 target/filename bytes.
    #[error("malformed FILE frame")]
    MalformedFile,

    /// The frame matched none of the known shapes.
    #[error("unknown command")]
    UnknownCommand,
}

/// One decoded client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// `Campus:<name>;Pass:<secret>` – the one-shot authentication frame.
    Auth { campus: String, secret: String },
    /// `SEND|<target>|<text>` – text message addressed to a campus or to
    /// the server identity.
    Send { target: String, text: String },
    /// `FILE|<target>|<filename>|<content>` – file transfer. `content` is
    /// the undecoded remainder of the frame.
    File {
        target: String,
        filename: String,
        content: Vec<u8>,
    },
}

/// Fixed table of server reply codes.
///
/// Every command is synchronous request/response: the server writes exactly
/// one of these codes back before reading the next frame from that peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerReply {
    AuthOk,
    AuthFail,
    AuthFailDuplicate,
    ServerFull,
    Delivered,
    DeliveredToServer,
    TargetOffline,
    BadFormat,
    FileSavedOnServer,
    FileForwarded,
    InvalidFileFormat,
    ServerSaveErr,
    UnknownCmd,
}

impl ServerReply {
    /// The exact byte string written to the wire for this code.
    pub fn as_str(self) -> &'static str {
        match self {
            ServerReply::AuthOk => "AUTH_OK",
            ServerReply::AuthFail => "AUTH_FAIL",
            ServerReply::AuthFailDuplicate => "AUTH_FAIL_DUPLICATE",
            ServerReply::ServerFull => "SERVER_FULL",
            ServerReply::Delivered => "DELIVERED",
            ServerReply::DeliveredToServer => "DELIVERED_TO_SERVER",
            ServerReply::TargetOffline => "TARGET_OFFLINE",
            ServerReply::BadFormat => "BAD_FORMAT",
            ServerReply::FileSavedOnServer => "FILE_SAVED_ON_SERVER",
            ServerReply::FileForwarded => "FILE_FORWARDED",
            ServerReply::InvalidFileFormat => "INVALID_FILE_FORMAT",
            ServerReply::ServerSaveErr => "SERVER_SAVE_ERR",
            ServerReply::UnknownCmd => "UNKNOWN_CMD",
        }
    }

    /// The wire bytes for this code.
    pub fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

impl fmt::Display for ServerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Decode ────────────────────────────────────────────────────────────────────

/// Decodes one [`ClientFrame`] from a complete frame's bytes.
///
/// # Errors
///
/// Returns a [`FrameError`] naming the class of malformed input.
///
/// # Examples
///
/// ```rust
/// use relay_core::protocol::frame::{decode_frame, ClientFrame};
///
/// let frame = decode_frame(b"SEND|Karachi|hello there").unwrap();
/// assert_eq!(
///     frame,
///     ClientFrame::Send {
///         target: "Karachi".to_string(),
///         text: "hello there".to_string(),
///     }
/// );
/// ```
pub fn decode_frame(bytes: &[u8]) -> Result<ClientFrame, FrameError> {
    if bytes.starts_with(b"SEND|") {
        return decode_send(&bytes[5..]);
    }
    if bytes.starts_with(b"FILE|") {
        return decode_file(&bytes[5..]);
    }
    // Anything that is not a command is only plausible as an auth frame.
    if let Ok(text) = std::str::from_utf8(bytes) {
        if text.contains("Campus:") && text.contains(";Pass:") {
            return decode_auth(text);
        }
    }
    Err(FrameError::UnknownCommand)
}

/// Parses `Campus:<name>;Pass:<secret>`. The campus name is trimmed; the
/// secret is taken verbatim.
fn decode_auth(text: &str) -> Result<ClientFrame, FrameError> {
    let campus_at = text.find("Campus:").ok_or(FrameError::MalformedAuth)?;
    let pass_at = text.find(";Pass:").ok_or(FrameError::MalformedAuth)?;
    if pass_at < campus_at + 7 {
        return Err(FrameError::MalformedAuth);
    }

    let campus = text[campus_at + 7..pass_at].trim();
    let secret = &text[pass_at + 6..];
    if campus.is_empty() {
        return Err(FrameError::MalformedAuth);
    }

    Ok(ClientFrame::Auth {
        campus: campus.to_string(),
        secret: secret.to_string(),
    })
}

/// Parses the body of a `SEND|` frame: `<target>|<text>`.
fn decode_send(body: &[u8]) -> Result<ClientFrame, FrameError> {
    let sep = body
        .iter()
        .position(|&b| b == b'|')
        .ok_or(FrameError::MalformedSend)?;
    let target =
        std::str::from_utf8(&body[..sep]).map_err(|_| FrameError::MalformedSend)?;
    let text =
        std::str::from_utf8(&body[sep + 1..]).map_err(|_| FrameError::MalformedSend)?;

    Ok(ClientFrame::Send {
        target: target.to_string(),
        text: text.to_string(),
    })
}

/// Parses the body of a `FILE|` frame: `<target>|<filename>|<content>`.
/// Content is kept as raw bytes and never validated.
fn decode_file(body: &[u8]) -> Result<ClientFrame, FrameError> {
    let first = body
        .iter()
        .position(|&b| b == b'|')
        .ok_or(FrameError::MalformedFile)?;
    let rest = &body[first + 1..];
    let second = rest
        .iter()
        .position(|&b| b == b'|')
        .ok_or(FrameError::MalformedFile)?;

    let target =
        std::str::from_utf8(&body[..first]).map_err(|_| FrameError::MalformedFile)?;
    let filename =
        std::str::from_utf8(&rest[..second]).map_err(|_| FrameError::MalformedFile)?;
    let content = rest[second + 1..].to_vec();

    Ok(ClientFrame::File {
        target: target.to_string(),
        filename: filename.to_string(),
        content,
    })
}

// ── Encode ────────────────────────────────────────────────────────────────────

/// Encodes an authentication frame.
pub fn encode_auth(campus: &str, secret: &str) -> Vec<u8> {
    format!("Campus:{campus};Pass:{secret}").into_bytes()
}

/// Encodes a `SEND|` frame.
pub fn encode_send(target: &str, text: &str) -> Vec<u8> {
    format!("SEND|{target}|{text}").into_bytes()
}

/// Encodes a `FILE|` frame. Content is appended as raw bytes.
pub fn encode_file(target: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut frame = format!("FILE|{target}|{filename}|").into_bytes();
    frame.extend_from_slice(content);
    frame
}

/// Formats the sender-tagged push delivery the server writes to a message
/// recipient: `From <sender>: <text>`.
pub fn tagged_delivery(sender: &str, text: &str) -> Vec<u8> {
    format!("From {sender}: {text}").into_bytes()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
