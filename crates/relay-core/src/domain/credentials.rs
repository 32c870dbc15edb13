//! Static campus credential table.
//!
//! Credentials are fixed at startup (from config, or the built-in default
//! table) and read-only afterwards, so the table is shared across connection
//! handlers without synchronization. Dynamic credential management is an
//! explicit non-goal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The server's own reserved identity. It can be addressed as a message or
/// file target, but no client may ever authenticate under this name.
pub const DEFAULT_SERVER_IDENTITY: &str = "Islamabad";

/// One `campus -> secret` pair as it appears in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub campus: String,
    pub secret: String,
}

/// Read-only map of campus names to their shared secrets.
#[derive(Debug, Clone)]
pub struct CredentialTable {
    entries: HashMap<String, String>,
}

impl CredentialTable {
    /// Builds a table from config entries. Campus names are trimmed so they
    /// compare equal to trimmed names arriving on the wire.
    pub fn new(entries: impl IntoIterator<Item = CredentialEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| (e.campus.trim().to_string(), e.secret))
            .collect();
        Self { entries }
    }

    /// The built-in campus roster used when no credentials are configured.
    pub fn default_table() -> Self {
        Self::new([
            entry("Lahore", "NU-LHR-123"),
            entry("Karachi", "NU-KHI-123"),
            entry("Multan", "NU-MULT-123"),
            entry("Peshawar", "NU-PSH-123"),
            entry("CFD", "NU-CFD-123"),
        ])
    }

    /// Checks a `(campus, secret)` pair. Deterministic: the same pair always
    /// produces the same answer.
    pub fn verify(&self, campus: &str, secret: &str) -> bool {
        self.entries.get(campus).is_some_and(|s| s == secret)
    }

    /// Number of campuses in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no credentials at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CredentialTable {
    fn default() -> Self {
        Self::default_table()
    }
}

fn entry(campus: &str, secret: &str) -> CredentialEntry {
    CredentialEntry {
        campus: campus.to_string(),
        secret: secret.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
