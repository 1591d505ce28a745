//! The control channel: WebSocket upgrade, per-session read loop, and
//! the writer task that drains the session's frame sink.
//!
//! On upgrade the session is registered (which delivers
//! `client_registered` on this stream before anything else), a writer
//! task starts draining the sink, and the read loop dispatches inbound
//! frames. Only two methods are accepted from clients on the stream;
//! unknown methods, malformed frames, schema-invalid payloads, and
//! unknown tokens are all dropped silently.
//!
//! When the stream closes, cleanly or by transport error, the
//! session-close cascade runs: the session's token is invalidated
//! first (so no request-response call can act for the dying session),
//! then the lobby side is cleaned up, then the sink is closed.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use orion_core::{FrameSink, Session, SinkCommand};
use orion_proto::{messages, Frame};

use crate::state::AppState;

/// The upgrade handler mounted at `/`.
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

/// Drive one control-channel stream from open to close.
async fn handle_stream(socket: WebSocket, state: AppState) {
    let (mut socket_tx, mut socket_rx) = socket.split();
    let (sink, mut commands) = FrameSink::channel();
    let session = state.sessions.open(sink);
    info!(session_id = %session.id(), "stream opened");

    let writer = tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            match command {
                SinkCommand::Frame(text) => {
                    if socket_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                SinkCommand::Close => {
                    let _ = socket_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    while let Some(result) = socket_rx.next().await {
        let Ok(message) = result else {
            break;
        };
        match message {
            Message::Text(text) => dispatch(&state, &session, text.as_str()),
            Message::Close(_) => break,
            // Binary frames carry nothing in this protocol; ping/pong
            // are handled by the transport.
            _ => {}
        }
    }

    state.sessions.close(session.id());
    state.lobbies.on_session_close(&session);
    session.sink().close();
    let _ = writer.await;
    info!(session_id = %session.id(), "stream closed");
}

/// Dispatch one inbound stream frame.
fn dispatch(state: &AppState, session: &Arc<Session>, text: &str) {
    let Ok(frame) = Frame::decode(text) else {
        debug!(session_id = %session.id(), "dropping malformed stream frame");
        return;
    };

    match frame.method.as_str() {
        messages::LOBBY_MESSAGING_SEND => {
            let Ok(payload) = frame.parse::<messages::LobbyMessagingSend>() else {
                debug!(session_id = %session.id(), "dropping schema-invalid chat frame");
                return;
            };
            let Some(sender) = state.sessions.resolve(&payload.token) else {
                warn!(session_id = %session.id(), "dropping chat frame with unknown token");
                return;
            };
            state
                .lobbies
                .send_chat(&sender, &payload.lobby_id, &payload.message);
        }
        messages::PTP_MEDIATION_PEERS_CONNECTION_SUCCESS => {
            let Ok(payload) = frame.parse::<messages::PtpMediationPeersConnectionSuccess>()
            else {
                debug!(session_id = %session.id(), "dropping schema-invalid ack frame");
                return;
            };
            state.lobbies.ack_peer_success(&payload.token);
        }
        method => {
            debug!(session_id = %session.id(), method, "ignoring unknown stream method");
        }
    }
}
