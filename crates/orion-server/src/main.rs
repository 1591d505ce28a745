//! orion-server: the Orion rendezvous server.
//!
//! Single OS process running a Tokio async runtime. Clients hold a
//! persistent WebSocket to the control channel, call the
//! request-response surface to manage lobbies, and emit UDP datagrams
//! during mediation so the server can observe their public addresses.

use std::sync::Arc;

use tracing::{error, info};

use orion_core::{LobbyRegistry, SessionRegistry};
use orion_server::config::ServerConfig;
use orion_server::state::AppState;
use orion_server::{http, udp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orion=info".parse()?),
        )
        .init();

    info!("Orion rendezvous server starting");

    // 1. Load config
    let config = ServerConfig::load()?;

    // 2. Bind the datagram socket before anything is advertised
    let udp_socket = tokio::net::UdpSocket::bind(("0.0.0.0", config.udp_port)).await?;
    info!(port = config.udp_port, "datagram listener bound");

    // 3. Build registries and shared state
    let sessions = Arc::new(SessionRegistry::new());
    let lobbies = Arc::new(LobbyRegistry::new(config.mediation()));
    let state = AppState::new(sessions.clone(), lobbies.clone());

    // 4. Start the datagram receive loop
    let udp_task = tokio::spawn(udp::run(udp_socket, lobbies.clone()));

    // 5. Serve the control channel and request-response surface
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!(port = config.http_port, "control channel listening");
    let app = http::router(state);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown: no closure notifications, every peer is
    // being disconnected along with us.
    udp_task.abort();
    lobbies.shutdown();
    sessions.shutdown();

    info!("server stopped");
    Ok(())
}
