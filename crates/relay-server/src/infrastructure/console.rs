//! Operator console: a thin, line-oriented wrapper over the control plane.
//!
//! Commands:
//!
//! ```text
//! clients            list all sessions
//! broadcast <text>   send <text> to every session with a known address
//! files              list received files
//! open <n>           print the content of received file n
//! help               show this list
//! ```
//!
//! The console renders directly to stdout: it is the operator's surface,
//! not part of the relay core, and the server runs fine with stdin closed.

use std::time::Instant;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::application::registry::ConnectivityKind;
use crate::infrastructure::control::ControlPlane;

/// Command loop over stdin. Exits when stdin closes.
pub async fn run_console(control: ControlPlane) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        handle_command(line.trim(), &control).await;
    }
}

async fn handle_command(line: &str, control: &ControlPlane) {
    let (command, rest) = match line.split_once(' ') {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    match command {
        "clients" => {
            let sessions = control.sessions();
            if sessions.is_empty() {
                println!("no sessions registered");
                return;
            }
            let now = Instant::now();
            for session in sessions {
                let kind = match session.kind {
                    ConnectivityKind::Stream => "stream",
                    ConnectivityKind::Provisional => "provisional",
                };
                let age = match session.heartbeat_age(now) {
                    Some(age) => format!("{}s ago", age.as_secs()),
                    None => "never".to_string(),
                };
                println!("{} | {kind} | last heartbeat: {age}", session.name);
            }
        }

        "broadcast" => {
            if rest.is_empty() {
                println!("usage: broadcast <text>");
                return;
            }
            match control.broadcast(rest).await {
                Ok(sent) => println!("broadcast sent to {sent} session(s)"),
                Err(e) => println!("broadcast failed: {e}"),
            }
        }

        "files" => {
            let records = control.list_files();
            if records.is_empty() {
                println!("no files received");
                return;
            }
            for (i, record) in records.iter().enumerate() {
                println!(
                    "{i}) {} (from {}, original '{}')",
                    record.stored_path.display(),
                    record.sender,
                    record.original_name
                );
            }
        }

        "open" => {
            let Ok(index) = rest.parse::<usize>() else {
                println!("usage: open <index>  (see 'files')");
                return;
            };
            match control.open_file(index).await {
                Ok((record, content)) => {
                    println!("----- {} -----", record.stored_path.display());
                    println!("{}", String::from_utf8_lossy(&content));
                    println!("----- end -----");
                }
                Err(e) => println!("{e}"),
            }
        }

        "" => {}
        _ => {
            println!("commands: clients | broadcast <text> | files | open <n> | help");
        }
    }
}
