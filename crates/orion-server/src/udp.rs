//! The datagram channel.
//!
//! Receive-only: the server never sends a datagram. Each inbound
//! packet must decode to a `ptpMediation_connect` frame carrying a
//! token; the sender's OS-reported source address is handed to the
//! mediation state machine. Anything that fails to decode or resolve
//! is dropped with a log note; there is no negative acknowledgement
//! on this channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use orion_core::LobbyRegistry;
use orion_proto::{messages, Frame};

/// Maximum datagram size worth inspecting. A valid frame is a method
/// name plus a base-64 token payload, far below this.
const MAX_DATAGRAM_LEN: usize = 2048;

/// Drive the datagram receive loop until the task is cancelled.
pub async fn run(socket: UdpSocket, lobbies: Arc<LobbyRegistry>) {
    let mut buffer = vec![0u8; MAX_DATAGRAM_LEN];
    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((len, source)) => handle_datagram(&lobbies, &buffer[..len], source),
            Err(e) => {
                warn!(error = %e, "datagram receive failed");
            }
        }
    }
}

/// Decode one datagram and feed the observation to the mediator.
fn handle_datagram(lobbies: &Arc<LobbyRegistry>, data: &[u8], source: SocketAddr) {
    let Ok(text) = std::str::from_utf8(data) else {
        debug!(%source, "dropping non-UTF-8 datagram");
        return;
    };
    let Ok(frame) = Frame::decode(text) else {
        debug!(%source, "dropping malformed datagram");
        return;
    };
    if frame.method != messages::PTP_MEDIATION_CONNECT {
        debug!(%source, method = %frame.method, "dropping unexpected datagram method");
        return;
    }
    let Ok(payload) = frame.parse::<messages::PtpMediationConnect>() else {
        debug!(%source, "dropping schema-invalid datagram");
        return;
    };

    lobbies.observe(&payload.token, source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use orion_core::{CreateLobbyParams, FrameSink, MediationConfig, SessionRegistry};

    fn registries() -> (SessionRegistry, Arc<LobbyRegistry>) {
        (
            SessionRegistry::new(),
            Arc::new(LobbyRegistry::new(MediationConfig::default())),
        )
    }

    #[tokio::test]
    async fn test_garbage_datagrams_are_dropped() {
        let (_sessions, lobbies) = registries();
        let source = "198.51.100.7:40000".parse().expect("addr");

        handle_datagram(&lobbies, &[0xFF, 0xFE, 0x80], source);
        handle_datagram(&lobbies, b"no separator", source);
        handle_datagram(&lobbies, b"wrong_method:e30=", source);
        handle_datagram(&lobbies, b"ptpMediation_connect:!!!", source);
        // Valid frame, wrong schema.
        let frame = orion_proto::frame::encode(
            messages::PTP_MEDIATION_CONNECT,
            &serde_json::json!({"nope": 1}),
        )
        .expect("encode");
        handle_datagram(&lobbies, frame.as_bytes(), source);
    }

    #[tokio::test]
    async fn test_valid_datagram_reaches_the_mediator() {
        let (sessions, lobbies) = registries();
        let source: SocketAddr = "198.51.100.7:40000".parse().expect("addr");

        let (host_sink, _host_rx) = FrameSink::channel();
        let host = sessions.open(host_sink);
        let (peer_sink, _peer_rx) = FrameSink::channel();
        let peer = sessions.open(peer_sink);

        let summary = lobbies
            .create(
                host.clone(),
                CreateLobbyParams {
                    host_name: "jt".to_string(),
                    lobby_name: "My lobby".to_string(),
                    is_public: true,
                    capacity: 2,
                },
            )
            .expect("create");
        lobbies
            .join(&summary.id, peer.clone(), "peer0")
            .expect("join");
        lobbies
            .start_mediation(&host, &summary.id)
            .expect("start");

        let frame = orion_proto::frame::encode(
            messages::PTP_MEDIATION_CONNECT,
            &messages::PtpMediationConnect {
                token: peer.token().reveal(),
            },
        )
        .expect("encode");
        handle_datagram(&lobbies, frame.as_bytes(), source);
        // The lobby still exists and is mediating; a full capture is
        // exercised in the mediation tests. Here we only prove the
        // datagram path feeds the registry without tripping on it.
        assert_eq!(lobbies.lobby_count(), 1);
    }
}
