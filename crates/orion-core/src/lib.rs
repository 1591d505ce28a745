//! # orion-core
//!
//! In-memory state machines for the Orion rendezvous server:
//!
//! - **Sessions** via [`session`] — one entry per live control-channel
//!   stream, keyed by an opaque id and a secret token
//! - **Lobbies** via [`lobby`] and [`registry`] — named coordination
//!   contexts with a host, members, capacity, and a locked flag
//! - **Mediation** via [`mediation`] — the per-lobby two-phase
//!   protocol that captures each member's UDP source address and
//!   disseminates the connect lists
//! - **Frame sinks** via [`sink`] — non-blocking outbound frame queues
//!   decoupling state transitions from socket writes
//!
//! The crate owns no sockets. Transports hand inbound events to the
//! registries and drain per-session sinks; every notification a state
//! transition produces is enqueued on a sink and never suspends.
//!
//! ## Cascades
//!
//! The three state machines are tied together by the session-close
//! cascade: a stream close removes the session, which removes the
//! lobby membership, which (host) destroys the lobby or (non-host)
//! notifies the remaining members, and either way tears down any
//! live mediation for that lobby.

pub mod lobby;
pub mod mediation;
pub mod registry;
pub mod session;
pub mod sink;

pub use lobby::{JoinSummary, Lobby, LobbyId, LobbyMember, PublicLobbySummary};
pub use mediation::{
    MediationConfig, MediationPhase, ABORT_CAPTURE_TIMEOUT, ABORT_CONNECT_TIMEOUT,
    ABORT_MEMBERS_CHANGED,
};
pub use registry::{CreateLobbyParams, LobbyRegistry};
pub use session::{Session, SessionId, SessionRegistry, Token};
pub use sink::{FrameSink, SinkCommand};

/// A state precondition failed. The display string is the user-facing
/// explanation surfaced as an HTTP 409 `errors` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("already in a lobby")]
    AlreadyInLobby,
    #[error("lobby doesn't exist")]
    LobbyNotFound,
    #[error("lobby is full")]
    LobbyFull,
    #[error("lobby is locked")]
    LobbyLocked,
    #[error("name is taken")]
    NameTaken,
    #[error("not the host")]
    NotHost,
    #[error("already mediating")]
    AlreadyMediating,
    #[error("must be at least 2")]
    InsufficientMembers,
}

/// Result type alias for lobby operations.
pub type Result<T> = std::result::Result<T, LobbyError>;

#[cfg(test)]
pub(crate) mod testutil;
