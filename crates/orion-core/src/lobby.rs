//! The lobby aggregate.
//!
//! A lobby is an in-memory coordination context: a name, a host
//! session, an ordered member list (host first, then join order), a
//! capacity, a public flag, and a locked flag that is set while a
//! mediation is active. The host is always a member; removing the
//! host destroys the lobby.
//!
//! The aggregate itself only holds state and answers queries; the
//! [`LobbyRegistry`](crate::LobbyRegistry) enforces the cross-lobby
//! invariants (one lobby per session, unique ids) and drives every
//! mutation under its lock.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;

use orion_proto::validate::{LOBBY_ID_CHARSET, LOBBY_ID_LEN};

use crate::mediation::Mediator;
use crate::session::{Session, SessionId, Token};

/// A 5-character base-36 lobby identifier (`[A-Z0-9]`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LobbyId(String);

impl LobbyId {
    /// Generate a random id. Uniqueness is the registry's concern; it
    /// re-rolls on collision.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id = (0..LOBBY_ID_LEN)
            .map(|_| LOBBY_ID_CHARSET[rng.gen_range(0..LOBBY_ID_CHARSET.len())] as char)
            .collect();
        Self(id)
    }

    /// Wrap a client-supplied id for lookup.
    pub fn from_text(text: &str) -> Self {
        Self(text.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A session joined to a lobby under a display name.
///
/// The display name is the externally visible identifier of a member
/// within the lobby; tokens are never exposed to peers.
pub struct LobbyMember {
    pub session: Arc<Session>,
    pub name: String,
}

/// One entry in the public lobby list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublicLobbySummary {
    pub name: String,
    pub id: String,
    pub current_members: u32,
    pub capacity: u32,
}

/// The joiner's view of a lobby, returned from a successful join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinSummary {
    pub lobby_id: String,
    pub lobby_name: String,
    /// Display names in join order, host first.
    pub lobby_members: Vec<String>,
    pub host_name: String,
}

/// An in-memory lobby.
pub struct Lobby {
    id: LobbyId,
    name: String,
    capacity: u32,
    public: bool,
    locked: bool,
    host_id: SessionId,
    members: Vec<LobbyMember>,
    pub(crate) mediator: Option<Mediator>,
}

impl Lobby {
    /// Create a lobby with the host as its first member.
    pub fn new(
        id: LobbyId,
        name: String,
        capacity: u32,
        public: bool,
        host: Arc<Session>,
        host_name: String,
    ) -> Self {
        let host_id = host.id();
        Self {
            id,
            name,
            capacity,
            public,
            locked: false,
            host_id,
            members: vec![LobbyMember {
                session: host,
                name: host_name,
            }],
            mediator: None,
        }
    }

    pub fn id(&self) -> &LobbyId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn host_id(&self) -> SessionId {
        self.host_id
    }

    pub fn is_host(&self, id: SessionId) -> bool {
        self.host_id == id
    }

    /// The host's display name. The host is always a member.
    pub fn host_name(&self) -> &str {
        self.members
            .iter()
            .find(|m| m.session.id() == self.host_id)
            .map(|m| m.name.as_str())
            .unwrap_or_default()
    }

    pub fn members(&self) -> &[LobbyMember] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() as u32 >= self.capacity
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.members.iter().any(|m| m.session.id() == id)
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.name == name)
    }

    /// Display names in join order, host first.
    pub fn member_names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.name.clone()).collect()
    }

    /// Tokens of every current member.
    pub fn member_tokens(&self) -> Vec<Token> {
        self.members
            .iter()
            .map(|m| m.session.token().clone())
            .collect()
    }

    /// Append a member. Capacity, lock, and name-uniqueness checks are
    /// the registry's responsibility and happen before this call.
    pub(crate) fn add_member(&mut self, session: Arc<Session>, name: String) {
        self.members.push(LobbyMember { session, name });
    }

    /// Remove a member by session id.
    pub(crate) fn remove_member(&mut self, id: SessionId) -> Option<LobbyMember> {
        let index = self.members.iter().position(|m| m.session.id() == id)?;
        Some(self.members.remove(index))
    }

    /// Encode a frame once and enqueue it on every member's sink.
    pub(crate) fn broadcast(&self, method: &str, payload: &impl Serialize) {
        let Ok(text) = orion_proto::frame::encode(method, payload) else {
            return;
        };
        for member in &self.members {
            member.session.sink().send_encoded(text.clone());
        }
    }

    /// Like [`broadcast`](Self::broadcast) but skips one member.
    pub(crate) fn broadcast_except(
        &self,
        skip: SessionId,
        method: &str,
        payload: &impl Serialize,
    ) {
        let Ok(text) = orion_proto::frame::encode(method, payload) else {
            return;
        };
        for member in &self.members {
            if member.session.id() != skip {
                member.session.sink().send_encoded(text.clone());
            }
        }
    }

    pub fn summary(&self) -> PublicLobbySummary {
        PublicLobbySummary {
            name: self.name.clone(),
            id: self.id.0.clone(),
            current_members: self.members.len() as u32,
            capacity: self.capacity,
        }
    }

    /// The view handed to a member that just joined.
    pub fn join_summary(&self) -> JoinSummary {
        JoinSummary {
            lobby_id: self.id.0.clone(),
            lobby_name: self.name.clone(),
            lobby_members: self.member_names(),
            host_name: self.host_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{drain_frames, open_session, TestSession};
    use crate::SessionRegistry;
    use orion_proto::validate::is_lobby_id;

    /// A lobby hosted by "jt", plus the registry every further session
    /// in the test must come from (ids are per-registry).
    fn test_lobby(capacity: u32) -> (Lobby, TestSession, SessionRegistry) {
        let sessions = SessionRegistry::new();
        let mut host = open_session(&sessions);
        drain_frames(&mut host.rx); // discard client_registered
        let lobby = Lobby::new(
            LobbyId::from_text("AB12C"),
            "My lobby".to_string(),
            capacity,
            true,
            host.session.clone(),
            "jt".to_string(),
        );
        (lobby, host, sessions)
    }

    #[test]
    fn test_generated_ids_are_well_formed() {
        for _ in 0..64 {
            let id = LobbyId::generate();
            assert!(is_lobby_id(id.as_str()), "bad id: {id}");
        }
    }

    #[test]
    fn test_host_is_first_member() {
        let (lobby, host, _sessions) = test_lobby(3);
        assert!(lobby.is_host(host.session.id()));
        assert!(lobby.contains(host.session.id()));
        assert_eq!(lobby.host_name(), "jt");
        assert_eq!(lobby.member_names(), vec!["jt"]);
        assert_eq!(lobby.member_count(), 1);
    }

    #[test]
    fn test_membership_and_capacity_queries() {
        let (mut lobby, _host, sessions) = test_lobby(2);
        let peer = open_session(&sessions);

        assert!(!lobby.is_full());
        lobby.add_member(peer.session.clone(), "peer0".to_string());
        assert!(lobby.is_full());
        assert!(lobby.name_taken("peer0"));
        assert!(lobby.name_taken("jt"));
        assert!(!lobby.name_taken("peer1"));
        assert_eq!(lobby.member_names(), vec!["jt", "peer0"]);
    }

    #[test]
    fn test_remove_member() {
        let (mut lobby, _host, sessions) = test_lobby(3);
        let peer = open_session(&sessions);
        lobby.add_member(peer.session.clone(), "peer0".to_string());

        let removed = lobby.remove_member(peer.session.id()).expect("member");
        assert_eq!(removed.name, "peer0");
        assert_eq!(lobby.member_count(), 1);
        assert!(lobby.remove_member(peer.session.id()).is_none());
    }

    #[test]
    fn test_broadcast_reaches_all_members() {
        let (mut lobby, mut host, sessions) = test_lobby(3);
        let mut peer = open_session(&sessions);
        drain_frames(&mut peer.rx);
        lobby.add_member(peer.session.clone(), "peer0".to_string());

        lobby.broadcast("test_note", &serde_json::json!({"n": 7}));

        for rx in [&mut host.rx, &mut peer.rx] {
            let frames = drain_frames(rx);
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].method, "test_note");
        }
    }

    #[test]
    fn test_broadcast_except_skips_target() {
        let (mut lobby, mut host, sessions) = test_lobby(3);
        let mut peer = open_session(&sessions);
        drain_frames(&mut peer.rx);
        lobby.add_member(peer.session.clone(), "peer0".to_string());

        lobby.broadcast_except(peer.session.id(), "test_note", &serde_json::json!({}));

        assert_eq!(drain_frames(&mut host.rx).len(), 1);
        assert!(drain_frames(&mut peer.rx).is_empty());
    }

    #[test]
    fn test_summaries() {
        let (mut lobby, _host, sessions) = test_lobby(3);
        let peer = open_session(&sessions);
        lobby.add_member(peer.session.clone(), "peer0".to_string());

        let summary = lobby.summary();
        assert_eq!(summary.name, "My lobby");
        assert_eq!(summary.id, "AB12C");
        assert_eq!(summary.current_members, 2);
        assert_eq!(summary.capacity, 3);

        let join = lobby.join_summary();
        assert_eq!(join.lobby_id, "AB12C");
        assert_eq!(join.lobby_members, vec!["jt", "peer0"]);
        assert_eq!(join.host_name, "jt");
    }
}
