use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_relay::dispatch::DispatchFabric;
use tokio_relay::transport::RelayServer;
use tokio_relay::Direction;

/// Opcodes are deployment-specific; these match the default test server.
const OPCODE_ACTION_BEGIN: u16 = 0xB070;
const OPCODE_CHAT: u16 = 0x3026;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bind_addr: SocketAddr = "0.0.0.0:15779".parse()?;
    let remote_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:15884".to_owned())
        .parse()?;

    println!("Relay starting...");
    println!("Listening on: {}", bind_addr);
    println!("Forwarding to: {}", remote_addr);

    let fabric = Arc::new(DispatchFabric::new());

    fabric.register_handler(OPCODE_ACTION_BEGIN, Direction::ToClient, |frame| {
        tracing::info!(len = frame.len(), "action begin observed");
        Ok(())
    });

    // Transparent hook: logs chat traffic without altering it.
    fabric.register_hook(OPCODE_CHAT, Direction::ToServer, |frame| {
        tracing::info!(len = frame.len(), "outgoing chat");
        Some(frame)
    });

    // Serve a single client session, then exit.
    let relay = RelayServer::bind(bind_addr, remote_addr, fabric).await?;
    if let Err(e) = relay.serve_once().await {
        eprintln!("Session error: {:?}", e);
    }

    println!("Shutting down...");
    Ok(())
}
