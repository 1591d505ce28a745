//! Lobby registry: the catalogue of live lobbies and the owner of
//! every cascade that crosses lobby boundaries.
//!
//! All mutations (create, join, chat fan-out, closure, the
//! session-close cascade, and every mediation transition, see
//! [`crate::mediation`]) happen under one lock, so lobby state and
//! the token→lobby index can never be observed out of step. Fan-out
//! notifications enumerate the recipient set at the instant of commit
//! and enqueue on each recipient's sink independently; a dead
//! recipient never blocks the rest.
//!
//! Cascade ordering:
//!
//! - `lobby_peerConnect` on join is dispatched after the membership
//!   commit, so a peer querying lobby state immediately sees the new
//!   member.
//! - A host disconnect destroys the lobby: every *remaining* member
//!   receives `lobby_closed` exactly once; the departing host receives
//!   nothing.
//! - A non-host disconnect leaves the lobby open: remaining members
//!   receive one `lobby_peerDisconnect`, and any live mediation is
//!   aborted with the members-changed reason.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use orion_proto::messages::{
    ChatMessage, LobbyClosed, LobbyMessagingReceived, LobbyPeerConnect, LobbyPeerDisconnect,
    LOBBY_CLOSED, LOBBY_MESSAGING_RECEIVED, LOBBY_PEER_CONNECT, LOBBY_PEER_DISCONNECT,
};
use orion_proto::validate::validate_chat_message;

use crate::lobby::{JoinSummary, Lobby, LobbyId, PublicLobbySummary};
use crate::mediation::{MediationConfig, ABORT_MEMBERS_CHANGED};
use crate::session::{Session, Token};
use crate::{LobbyError, Result};

/// Parameters for creating a lobby.
#[derive(Clone, Debug)]
pub struct CreateLobbyParams {
    pub host_name: String,
    pub lobby_name: String,
    pub is_public: bool,
    pub capacity: u32,
}

pub(crate) struct RegistryInner {
    pub(crate) lobbies: HashMap<LobbyId, Lobby>,
    pub(crate) by_token: HashMap<Token, LobbyId>,
}

/// The lobby catalogue. Shared as `Arc<LobbyRegistry>` so mediation
/// timer tasks can re-enter it when they fire.
pub struct LobbyRegistry {
    pub(crate) inner: Mutex<RegistryInner>,
    pub(crate) config: MediationConfig,
    pub(crate) generations: AtomicU64,
}

impl LobbyRegistry {
    pub fn new(config: MediationConfig) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                lobbies: HashMap::new(),
                by_token: HashMap::new(),
            }),
            config,
            generations: AtomicU64::new(0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Summaries of every public lobby.
    pub fn list_public(&self) -> Vec<PublicLobbySummary> {
        self.lock()
            .lobbies
            .values()
            .filter(|l| l.is_public())
            .map(Lobby::summary)
            .collect()
    }

    /// Summary of one lobby regardless of visibility.
    pub fn get_summary(&self, lobby_id: &str) -> Option<PublicLobbySummary> {
        self.lock()
            .lobbies
            .get(&LobbyId::from_text(lobby_id))
            .map(Lobby::summary)
    }

    /// The lobby a token currently belongs to, if any.
    pub fn lobby_of_token(&self, token: &Token) -> Option<LobbyId> {
        self.lock().by_token.get(token).cloned()
    }

    /// Number of live lobbies.
    pub fn lobby_count(&self) -> usize {
        self.lock().lobbies.len()
    }

    /// Create a lobby with `host` as host and sole member.
    ///
    /// Input validation (names, capacity range) happens at the
    /// transport boundary; only state preconditions are checked here.
    ///
    /// # Errors
    ///
    /// [`LobbyError::AlreadyInLobby`] if the host session already
    /// belongs to a lobby.
    pub fn create(
        &self,
        host: Arc<Session>,
        params: CreateLobbyParams,
    ) -> Result<PublicLobbySummary> {
        let mut inner = self.lock();
        if inner.by_token.contains_key(host.token()) {
            return Err(LobbyError::AlreadyInLobby);
        }

        let mut id = LobbyId::generate();
        while inner.lobbies.contains_key(&id) {
            id = LobbyId::generate();
        }

        let token = host.token().clone();
        let lobby = Lobby::new(
            id.clone(),
            params.lobby_name,
            params.capacity,
            params.is_public,
            host,
            params.host_name,
        );
        let summary = lobby.summary();

        inner.by_token.insert(token, id.clone());
        inner.lobbies.insert(id.clone(), lobby);

        info!(lobby = %id, name = %summary.name, "lobby created");
        Ok(summary)
    }

    /// Join `session` to the named lobby under `peer_name`.
    ///
    /// On success the membership is committed first, then every
    /// *other* member receives `lobby_peerConnect`; the joiner's view
    /// is returned.
    ///
    /// # Errors
    ///
    /// [`LobbyError::AlreadyInLobby`], [`LobbyError::LobbyNotFound`],
    /// [`LobbyError::LobbyFull`], [`LobbyError::LobbyLocked`], or
    /// [`LobbyError::NameTaken`].
    pub fn join(
        &self,
        lobby_id: &str,
        session: Arc<Session>,
        peer_name: &str,
    ) -> Result<JoinSummary> {
        let id = LobbyId::from_text(lobby_id);
        let mut inner = self.lock();

        if inner.by_token.contains_key(session.token()) {
            return Err(LobbyError::AlreadyInLobby);
        }

        let token = session.token().clone();
        let summary = {
            let lobby = inner
                .lobbies
                .get_mut(&id)
                .ok_or(LobbyError::LobbyNotFound)?;
            if lobby.is_full() {
                return Err(LobbyError::LobbyFull);
            }
            if lobby.is_locked() {
                return Err(LobbyError::LobbyLocked);
            }
            if lobby.name_taken(peer_name) {
                return Err(LobbyError::NameTaken);
            }

            let joiner_id = session.id();
            lobby.add_member(session, peer_name.to_string());
            lobby.broadcast_except(
                joiner_id,
                LOBBY_PEER_CONNECT,
                &LobbyPeerConnect {
                    lobby_id: id.as_str().to_string(),
                    peer_name: peer_name.to_string(),
                },
            );
            lobby.join_summary()
        };
        inner.by_token.insert(token, id.clone());

        info!(lobby = %id, peer = peer_name, "member joined");
        Ok(summary)
    }

    /// Destroy a lobby: tear down any live mediation silently, deliver
    /// `lobby_closed` to every current member, and drop all state.
    pub fn close(&self, lobby_id: &LobbyId) {
        let mut inner = self.lock();
        Self::close_locked(&mut inner, lobby_id);
    }

    pub(crate) fn close_locked(inner: &mut RegistryInner, lobby_id: &LobbyId) {
        let Some(mut lobby) = inner.lobbies.remove(lobby_id) else {
            return;
        };
        // The lobby_closed cascade subsumes any mediation abort notice.
        lobby.mediator = None;

        lobby.broadcast(
            LOBBY_CLOSED,
            &LobbyClosed {
                lobby_id: lobby_id.as_str().to_string(),
                lobby_name: lobby.name().to_string(),
            },
        );
        for token in lobby.member_tokens() {
            inner.by_token.remove(&token);
        }
        info!(lobby = %lobby_id, "lobby closed");
    }

    /// The session-close cascade.
    ///
    /// No-op if the session is not in a lobby. A host departure
    /// destroys the lobby (the departing host is removed first, so it
    /// is not a recipient of `lobby_closed`); a non-host departure
    /// notifies the remaining members and aborts any live mediation.
    pub fn on_session_close(&self, session: &Session) {
        let mut inner = self.lock();
        let Some(lobby_id) = inner.by_token.remove(session.token()) else {
            return;
        };

        let is_host = match inner.lobbies.get_mut(&lobby_id) {
            Some(lobby) => lobby.is_host(session.id()),
            None => return,
        };

        if is_host {
            if let Some(lobby) = inner.lobbies.get_mut(&lobby_id) {
                lobby.remove_member(session.id());
            }
            Self::close_locked(&mut inner, &lobby_id);
        } else if let Some(lobby) = inner.lobbies.get_mut(&lobby_id) {
            let Some(removed) = lobby.remove_member(session.id()) else {
                return;
            };
            lobby.broadcast(
                LOBBY_PEER_DISCONNECT,
                &LobbyPeerDisconnect {
                    lobby_id: lobby_id.as_str().to_string(),
                    peer_name: removed.name,
                },
            );
            Self::abort_mediation(lobby, ABORT_MEMBERS_CHANGED);
            info!(lobby = %lobby_id, "member left");
        }
    }

    /// Deliver a chat message to every member of the sender's lobby,
    /// the sender included.
    ///
    /// All failures are silent: an invalid message, a sender that is
    /// not a member of the named lobby, or a stale lobby id only
    /// produce a warning log.
    pub fn send_chat(&self, session: &Session, lobby_id: &str, message: &str) {
        if validate_chat_message(message).is_err() {
            warn!(session_id = %session.id(), "dropping invalid chat message");
            return;
        }

        let id = LobbyId::from_text(lobby_id);
        let inner = self.lock();
        if inner.by_token.get(session.token()) != Some(&id) {
            warn!(session_id = %session.id(), lobby = %id, "chat sender not in lobby");
            return;
        }
        let Some(lobby) = inner.lobbies.get(&id) else {
            return;
        };
        let Some(sender) = lobby
            .members()
            .iter()
            .find(|m| m.session.id() == session.id())
        else {
            return;
        };

        lobby.broadcast(
            LOBBY_MESSAGING_RECEIVED,
            &LobbyMessagingReceived {
                lobby_id: id.as_str().to_string(),
                message: ChatMessage {
                    timestamp: unix_millis(),
                    sender_name: sender.name.clone(),
                    message: message.to_string(),
                },
            },
        );
    }

    /// Clear all state without dispatching closure notifications.
    ///
    /// Mediation timers are cancelled as their mediators drop. Used at
    /// process shutdown, when every session is being torn down anyway.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        for lobby in inner.lobbies.values_mut() {
            lobby.mediator = None;
        }
        inner.lobbies.clear();
        inner.by_token.clear();
    }
}

/// Current unix time in milliseconds.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
