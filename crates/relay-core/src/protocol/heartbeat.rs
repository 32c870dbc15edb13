//! Heartbeat datagram parsing.
//!
//! Campus clients announce liveness over UDP with a fire-and-forget
//! datagram of the form `Campus:<name>;HB:online`. There is no
//! acknowledgment and no retry; a lost datagram simply delays the next
//! liveness refresh by one period.
//!
//! Parsing is deliberately lenient about field values: the `HB:` field must
//! be present but its value is not interpreted, so a future client can
//! carry extra state without breaking older servers. Anything that does not
//! carry both fields is treated as network noise and ignored.

/// Extracts the campus name from a heartbeat datagram.
///
/// Returns `None` for malformed payloads; the liveness channel drops them
/// silently rather than reporting an error to anyone.
///
/// # Examples
///
/// ```rust
/// use relay_core::protocol::heartbeat::parse_heartbeat;
///
/// assert_eq!(
///     parse_heartbeat(b"Campus:Lahore;HB:online"),
///     Some("Lahore".to_string())
/// );
/// assert_eq!(parse_heartbeat(b"garbage"), None);
/// ```
pub fn parse_heartbeat(datagram: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(datagram).ok()?;

    let campus_at = text.find("Campus:")?;
    let after = &text[campus_at + 7..];
    let semi = after.find(';')?;
    let name = after[..semi].trim();

    // The remainder must at least declare the heartbeat field.
    if !after[semi + 1..].contains("HB:") {
        return None;
    }
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

/// Encodes the heartbeat datagram a client sends every liveness period.
pub fn encode_heartbeat(campus: &str) -> Vec<u8> {
    format!("Campus:{campus};HB:online").into_bytes()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
