//! All message payloads for the Orion wire protocol.
//!
//! Each method carried in a [`Frame`](crate::Frame) has a constant
//! here plus a payload struct. Field names are camelCase on the wire.
//!
//! Direction summary:
//!
//! | Direction | Methods |
//! |---|---|
//! | server → client (stream) | `client_registered`, `lobby_closed`, `lobby_peerConnect`, `lobby_peerDisconnect`, `lobby_messaging_received`, `ptpMediation_send`, `ptpMediation_aborted`, `ptpMediation_peersConnection_start`, `ptpMediation_success` |
//! | client → server (stream) | `lobby_messaging_send`, `ptpMediation_peersConnection_success` |
//! | client → server (datagram) | `ptpMediation_connect` |
//!
//! The server never sends datagrams.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Method name constants
// ---------------------------------------------------------------------------

/// Sent on the new stream immediately after registration; carries the
/// session's secret token.
pub const CLIENT_REGISTERED: &str = "client_registered";
/// Sent to every member when their lobby is destroyed.
pub const LOBBY_CLOSED: &str = "lobby_closed";
/// Sent to existing members when a peer joins their lobby.
pub const LOBBY_PEER_CONNECT: &str = "lobby_peerConnect";
/// Sent to remaining members when a non-host peer leaves their lobby.
pub const LOBBY_PEER_DISCONNECT: &str = "lobby_peerDisconnect";
/// Chat message submitted by a lobby member.
pub const LOBBY_MESSAGING_SEND: &str = "lobby_messaging_send";
/// Chat message fanned out to every lobby member, sender included.
pub const LOBBY_MESSAGING_RECEIVED: &str = "lobby_messaging_received";
/// Request that a member emit a UDP datagram to the server.
pub const PTP_MEDIATION_SEND: &str = "ptpMediation_send";
/// The datagram a member emits so the server can observe its address.
pub const PTP_MEDIATION_CONNECT: &str = "ptpMediation_connect";
/// Connect list dispatched when every member has been observed.
pub const PTP_MEDIATION_PEERS_CONNECTION_START: &str = "ptpMediation_peersConnection_start";
/// A member's acknowledgement that it reached its peers.
pub const PTP_MEDIATION_PEERS_CONNECTION_SUCCESS: &str = "ptpMediation_peersConnection_success";
/// Mediation finished: every member reported connectivity.
pub const PTP_MEDIATION_SUCCESS: &str = "ptpMediation_success";
/// Mediation torn down; carries the human-readable reason.
pub const PTP_MEDIATION_ABORTED: &str = "ptpMediation_aborted";

// ---------------------------------------------------------------------------
// Server → client payloads
// ---------------------------------------------------------------------------

/// `client_registered` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRegistered {
    /// The session's secret token. Disclosed only on the owning stream.
    pub token: String,
}

/// `lobby_closed` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyClosed {
    pub lobby_id: String,
    pub lobby_name: String,
}

/// `lobby_peerConnect` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPeerConnect {
    pub lobby_id: String,
    /// Display name of the member that joined.
    pub peer_name: String,
}

/// `lobby_peerDisconnect` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPeerDisconnect {
    pub lobby_id: String,
    /// Display name of the member that left.
    pub peer_name: String,
}

/// A single chat message as delivered to members.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unix timestamp in milliseconds, assigned by the server.
    pub timestamp: u64,
    /// Display name of the sending member.
    pub sender_name: String,
    pub message: String,
}

/// `lobby_messaging_received` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyMessagingReceived {
    pub lobby_id: String,
    pub message: ChatMessage,
}

/// `ptpMediation_send` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpMediationSend {
    /// The server's UDP listen port the member should send to.
    pub port: u16,
}

/// One peer's observed address in a connect list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerAddress {
    pub ip: String,
    /// The peer's datagram *source* port as observed by the server.
    pub port: u16,
}

/// `ptpMediation_peersConnection_start` payload.
///
/// The host receives every non-host member's address; each non-host
/// member receives only the host's address.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpMediationPeersConnectionStart {
    pub peers: Vec<PeerAddress>,
}

/// `ptpMediation_success` payload (empty object on the wire).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PtpMediationSuccess {}

/// `ptpMediation_aborted` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpMediationAborted {
    /// Human-readable abort reason.
    pub abort_reason: String,
}

// ---------------------------------------------------------------------------
// Client → server payloads
// ---------------------------------------------------------------------------

/// `lobby_messaging_send` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyMessagingSend {
    pub token: String,
    pub lobby_id: String,
    pub message: String,
}

/// `ptpMediation_peersConnection_success` payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpMediationPeersConnectionSuccess {
    pub token: String,
}

/// `ptpMediation_connect` payload (the only datagram method).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpMediationConnect {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Frame;

    #[test]
    fn test_camel_case_wire_fields() {
        let frame = Frame::new(
            LOBBY_PEER_CONNECT,
            &LobbyPeerConnect {
                lobby_id: "AB12C".to_string(),
                peer_name: "peer0".to_string(),
            },
        )
        .expect("build");
        assert_eq!(frame.payload["lobbyId"], "AB12C");
        assert_eq!(frame.payload["peerName"], "peer0");
    }

    #[test]
    fn test_chat_message_shape() {
        let frame = Frame::new(
            LOBBY_MESSAGING_RECEIVED,
            &LobbyMessagingReceived {
                lobby_id: "AB12C".to_string(),
                message: ChatMessage {
                    timestamp: 1_700_000_000_000,
                    sender_name: "jt".to_string(),
                    message: "hello".to_string(),
                },
            },
        )
        .expect("build");
        assert_eq!(frame.payload["message"]["senderName"], "jt");
        assert_eq!(frame.payload["message"]["timestamp"], 1_700_000_000_000u64);
    }

    #[test]
    fn test_success_payload_is_empty_object() {
        let frame =
            Frame::new(PTP_MEDIATION_SUCCESS, &PtpMediationSuccess {}).expect("build");
        assert_eq!(frame.payload, serde_json::json!({}));
    }

    #[test]
    fn test_connect_list_round_trip() {
        let start = PtpMediationPeersConnectionStart {
            peers: vec![
                PeerAddress {
                    ip: "203.0.113.7".to_string(),
                    port: 40001,
                },
                PeerAddress {
                    ip: "203.0.113.8".to_string(),
                    port: 40002,
                },
            ],
        };
        let frame = Frame::new(PTP_MEDIATION_PEERS_CONNECTION_START, &start).expect("build");
        let decoded = Frame::decode(&frame.encode()).expect("decode");
        let parsed: PtpMediationPeersConnectionStart = decoded.parse().expect("parse");
        assert_eq!(parsed.peers, start.peers);
    }

    #[test]
    fn test_inbound_chat_frame_parse() {
        // The shape a client submits on the stream.
        let frame = Frame::decode(
            &Frame::new(
                LOBBY_MESSAGING_SEND,
                &serde_json::json!({
                    "token": "6fa459ea-ee8a-3ca4-894e-db77e160355e",
                    "lobbyId": "AB12C",
                    "message": "hello",
                }),
            )
            .expect("build")
            .encode(),
        )
        .expect("decode");
        let parsed: LobbyMessagingSend = frame.parse().expect("parse");
        assert_eq!(parsed.lobby_id, "AB12C");
        assert_eq!(parsed.message, "hello");
    }

    #[test]
    fn test_datagram_payload_parse() {
        let decoded = Frame::decode(
            &Frame::new(
                PTP_MEDIATION_CONNECT,
                &PtpMediationConnect {
                    token: "tok".to_string(),
                },
            )
            .expect("build")
            .encode(),
        )
        .expect("decode");
        assert_eq!(decoded.method, PTP_MEDIATION_CONNECT);
        let parsed: PtpMediationConnect = decoded.parse().expect("parse");
        assert_eq!(parsed.token, "tok");
    }
}
