//! Campus relay server entry point.
//!
//! Wires together the shared state and the long-lived tasks, then parks on
//! the shutdown signal. No task is individually cancelled; everything
//! terminates with the process.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()              -- relay.toml, defaults if absent
//!  └─ bind TCP + UDP             -- the only process-fatal failures
//!  └─ spawn long-lived tasks
//!       ├─ run_stream_listener   -- accept loop, one task per connection
//!       ├─ run_heartbeat_listener
//!       ├─ run_liveness_monitor
//!       └─ run_console           -- operator surface over the control plane
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, UdpSocket};
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay_server::application::file_index::FileReceptionIndex;
use relay_server::application::registry::SessionRegistry;
use relay_server::infrastructure::console;
use relay_server::infrastructure::control::ControlPlane;
use relay_server::infrastructure::network::{heartbeat, monitor, stream};
use relay_server::infrastructure::storage::config::load_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"));
    let config = load_config(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    // Structured logging; level from config, overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    info!(
        "campus relay starting (identity: {}, config: {})",
        config.server.identity,
        config_path.display()
    );

    std::fs::create_dir_all(&config.server.files_dir).with_context(|| {
        format!(
            "creating files directory {}",
            config.server.files_dir.display()
        )
    })?;

    let registry = Arc::new(SessionRegistry::new(config.limits.max_sessions));
    let file_index = Arc::new(FileReceptionIndex::new(config.limits.max_files));

    // Transport binds are the only unrecoverable startup failures.
    let stream_addr = format!(
        "{}:{}",
        config.network.bind_address, config.network.stream_port
    );
    let listener = TcpListener::bind(&stream_addr)
        .await
        .with_context(|| format!("binding stream transport on {stream_addr}"))?;
    info!("stream transport listening on {stream_addr}");

    let datagram_addr = format!(
        "{}:{}",
        config.network.bind_address, config.network.datagram_port
    );
    let socket = UdpSocket::bind(&datagram_addr)
        .await
        .with_context(|| format!("binding liveness channel on {datagram_addr}"))?;
    info!("liveness channel listening on {datagram_addr}");

    let ctx = Arc::new(stream::ServerContext {
        registry: Arc::clone(&registry),
        file_index: Arc::clone(&file_index),
        credentials: config.credential_table(),
        identity: config.server.identity.clone(),
        files_dir: config.server.files_dir.clone(),
    });

    tokio::spawn(stream::run_stream_listener(listener, ctx));
    tokio::spawn(heartbeat::run_heartbeat_listener(socket, Arc::clone(&registry)));
    tokio::spawn(monitor::run_liveness_monitor(
        Arc::clone(&registry),
        Duration::from_secs(config.limits.monitor_interval_secs),
    ));
    tokio::spawn(console::run_console(ControlPlane::new(
        Arc::clone(&registry),
        Arc::clone(&file_index),
    )));

    info!("campus relay ready; press Ctrl-C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!("shutdown signal received; campus relay stopping");
    Ok(())
}
