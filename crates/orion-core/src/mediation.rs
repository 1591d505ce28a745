//! The two-phase peer-to-peer mediation protocol.
//!
//! One mediator exists per lobby at most, for the duration of one
//! mediation attempt:
//!
//! ```text
//! [Capturing] --all captured--> [Connecting] --all acked--> success
//!      \                             \
//!       \---- timeout / membership change / lobby closed ---> abort
//! ```
//!
//! **Capturing** — every member is asked (and periodically re-asked)
//! over its stream to emit a `ptpMediation_connect` datagram to the
//! server's UDP port. As datagrams arrive, the member's *source*
//! address is recorded; ports named in payloads are ignored, since the
//! observed source port is what the peers must hole-punch toward.
//!
//! **Connecting** — once every current member is observed, each member
//! receives the connect list (the host gets every non-host address,
//! each non-host gets the host's address) and the mediator waits for
//! every member's `ptpMediation_peersConnection_success` ack. Full
//! acknowledgement closes the lobby through the success cascade.
//!
//! Every phase transition, observation, and timer fire runs under the
//! [`LobbyRegistry`](crate::LobbyRegistry) lock, which linearizes them
//! per lobby: a membership change is always visible to the next timer
//! fire. Timer tasks are aborted on teardown, and each fire
//! re-validates the mediator's generation under the lock: a fire that
//! already passed its last await when the abort landed is inert.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use orion_proto::messages::{
    PeerAddress, PtpMediationAborted, PtpMediationPeersConnectionStart, PtpMediationSend,
    PtpMediationSuccess, PTP_MEDIATION_ABORTED, PTP_MEDIATION_PEERS_CONNECTION_START,
    PTP_MEDIATION_SEND, PTP_MEDIATION_SUCCESS,
};

use crate::lobby::{Lobby, LobbyId};
use crate::registry::LobbyRegistry;
use crate::session::{Session, Token};
use crate::{LobbyError, Result};

/// Abort reason: lobby membership changed while mediating.
pub const ABORT_MEMBERS_CHANGED: &str = "Lobby members changed.";
/// Abort reason: not every member's datagram arrived in time.
pub const ABORT_CAPTURE_TIMEOUT: &str = "Timed out waiting for peers to send UDP packets.";
/// Abort reason: not every member confirmed peer connectivity in time.
pub const ABORT_CONNECT_TIMEOUT: &str = "Timed out waiting for peers to connect to one another.";

/// Timing and dissemination parameters for mediation.
#[derive(Clone, Copy, Debug)]
pub struct MediationConfig {
    /// How often uncaptured members are re-asked to send a datagram.
    pub reminder_interval: Duration,
    /// How long the capture phase may take before aborting.
    pub capture_timeout: Duration,
    /// How long the connect phase may take before aborting.
    pub connect_timeout: Duration,
    /// The UDP port advertised in `ptpMediation_send`.
    pub udp_port: u16,
}

impl Default for MediationConfig {
    fn default() -> Self {
        Self {
            reminder_interval: Duration::from_secs(10),
            capture_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(300),
            udp_port: 5990,
        }
    }
}

/// Phase of a live mediation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediationPhase {
    /// Waiting for a datagram observation from every member.
    Capturing,
    /// Waiting for a connectivity ack from every member.
    Connecting,
}

/// Per-lobby mediation state. Terminal states have no representation:
/// success and abort both remove the mediator.
pub(crate) struct Mediator {
    pub(crate) generation: u64,
    pub(crate) phase: MediationPhase,
    observed: HashMap<Token, SocketAddr>,
    acked: HashSet<Token>,
    pub(crate) reminder_timer: Option<AbortHandle>,
    pub(crate) capture_timer: Option<AbortHandle>,
    pub(crate) connect_timer: Option<AbortHandle>,
}

impl Mediator {
    pub(crate) fn new(generation: u64) -> Self {
        Self {
            generation,
            phase: MediationPhase::Capturing,
            observed: HashMap::new(),
            acked: HashSet::new(),
            reminder_timer: None,
            capture_timer: None,
            connect_timer: None,
        }
    }

    /// Record (or overwrite with) the latest observed source address.
    pub(crate) fn record_observation(&mut self, token: Token, source: SocketAddr) {
        self.observed.insert(token, source);
    }

    pub(crate) fn observation(&self, token: &Token) -> Option<SocketAddr> {
        self.observed.get(token).copied()
    }

    pub(crate) fn is_observed(&self, token: &Token) -> bool {
        self.observed.contains_key(token)
    }

    pub(crate) fn all_observed(&self, members: &[Token]) -> bool {
        members.iter().all(|t| self.observed.contains_key(t))
    }

    /// Record an ack. Duplicates are a no-op.
    pub(crate) fn record_ack(&mut self, token: Token) {
        self.acked.insert(token);
    }

    pub(crate) fn all_acked(&self, members: &[Token]) -> bool {
        members.iter().all(|t| self.acked.contains(t))
    }

    /// Cancel the capture-phase timers on the capture→connect
    /// transition.
    pub(crate) fn cancel_capture_timers(&mut self) {
        if let Some(handle) = self.reminder_timer.take() {
            handle.abort();
        }
        if let Some(handle) = self.capture_timer.take() {
            handle.abort();
        }
    }

    fn cancel_all_timers(&mut self) {
        self.cancel_capture_timers();
        if let Some(handle) = self.connect_timer.take() {
            handle.abort();
        }
    }
}

impl Drop for Mediator {
    // No teardown path may leave a live timer behind.
    fn drop(&mut self) {
        self.cancel_all_timers();
    }
}

impl LobbyRegistry {
    /// Begin mediation for the named lobby.
    ///
    /// Locks the lobby, creates the mediator, asks every member to
    /// emit a datagram, and arms the reminder and capture-deadline
    /// timers.
    ///
    /// # Errors
    ///
    /// [`LobbyError::LobbyNotFound`], [`LobbyError::NotHost`],
    /// [`LobbyError::AlreadyMediating`], or
    /// [`LobbyError::InsufficientMembers`], checked in that order.
    pub fn start_mediation(self: &Arc<Self>, session: &Session, lobby_id: &str) -> Result<()> {
        let id = LobbyId::from_text(lobby_id);
        let mut inner = self.lock();
        let lobby = inner
            .lobbies
            .get_mut(&id)
            .ok_or(LobbyError::LobbyNotFound)?;
        if !lobby.is_host(session.id()) {
            return Err(LobbyError::NotHost);
        }
        if lobby.is_locked() || lobby.mediator.is_some() {
            return Err(LobbyError::AlreadyMediating);
        }
        if lobby.member_count() < 2 {
            return Err(LobbyError::InsufficientMembers);
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        lobby.set_locked(true);
        let mut mediator = Mediator::new(generation);

        let reminder = tokio::spawn({
            let registry = self.clone();
            let id = id.clone();
            let interval = self.config.reminder_interval;
            async move {
                loop {
                    tokio::time::sleep(interval).await;
                    if !registry.on_reminder_tick(&id, generation) {
                        break;
                    }
                }
            }
        });
        let capture = tokio::spawn({
            let registry = self.clone();
            let id = id.clone();
            let timeout = self.config.capture_timeout;
            async move {
                tokio::time::sleep(timeout).await;
                registry.on_capture_deadline(&id, generation);
            }
        });
        mediator.reminder_timer = Some(reminder.abort_handle());
        mediator.capture_timer = Some(capture.abort_handle());
        lobby.mediator = Some(mediator);

        lobby.broadcast(
            PTP_MEDIATION_SEND,
            &PtpMediationSend {
                port: self.config.udp_port,
            },
        );
        info!(lobby = %id, members = lobby.member_count(), "mediation started");
        Ok(())
    }

    /// Feed one datagram observation to the sender's mediator.
    ///
    /// `source` is the address the OS reported at receive time; its
    /// port, not any port a payload might name, is what gets
    /// disseminated. Re-observations overwrite with the latest
    /// address. Observations are dropped unless the token resolves to
    /// a lobby whose mediator is live and capturing.
    pub fn observe(self: &Arc<Self>, token_text: &str, source: SocketAddr) {
        let Some(token) = Token::parse(token_text) else {
            debug!("dropping datagram: malformed token");
            return;
        };
        let mut inner = self.lock();
        let Some(lobby_id) = inner.by_token.get(&token).cloned() else {
            debug!("dropping datagram: token not in a lobby");
            return;
        };
        let Some(lobby) = inner.lobbies.get_mut(&lobby_id) else {
            return;
        };

        let member_tokens = lobby.member_tokens();
        let generation = {
            let Some(mediator) = lobby.mediator.as_mut() else {
                debug!(lobby = %lobby_id, "dropping datagram: no live mediation");
                return;
            };
            if mediator.phase != MediationPhase::Capturing {
                return;
            }
            mediator.record_observation(token, source);
            debug!(lobby = %lobby_id, "observation recorded");
            if !mediator.all_observed(&member_tokens) {
                return;
            }
            mediator.cancel_capture_timers();
            mediator.phase = MediationPhase::Connecting;
            mediator.generation
        };

        Self::dispatch_connect_lists(lobby);

        let connect = tokio::spawn({
            let registry = self.clone();
            let id = lobby_id.clone();
            let timeout = self.config.connect_timeout;
            async move {
                tokio::time::sleep(timeout).await;
                registry.on_connect_deadline(&id, generation);
            }
        });
        if let Some(mediator) = lobby.mediator.as_mut() {
            mediator.connect_timer = Some(connect.abort_handle());
        }
        info!(lobby = %lobby_id, "all members captured; connecting");
    }

    /// Send each member its connect list: every non-host address to
    /// the host, the host's address to each non-host member.
    fn dispatch_connect_lists(lobby: &Lobby) {
        let Some(mediator) = lobby.mediator.as_ref() else {
            return;
        };
        let host_id = lobby.host_id();
        let Some(host_addr) = lobby
            .members()
            .iter()
            .find(|m| m.session.id() == host_id)
            .and_then(|m| mediator.observation(m.session.token()))
        else {
            return;
        };

        for member in lobby.members() {
            let peers: Vec<PeerAddress> = if member.session.id() == host_id {
                lobby
                    .members()
                    .iter()
                    .filter(|m| m.session.id() != host_id)
                    .filter_map(|m| mediator.observation(m.session.token()))
                    .map(|addr| PeerAddress {
                        ip: addr.ip().to_string(),
                        port: addr.port(),
                    })
                    .collect()
            } else {
                vec![PeerAddress {
                    ip: host_addr.ip().to_string(),
                    port: host_addr.port(),
                }]
            };
            member.session.sink().send(
                PTP_MEDIATION_PEERS_CONNECTION_START,
                &PtpMediationPeersConnectionStart { peers },
            );
        }
    }

    /// Record a member's connectivity ack. Duplicates are no-ops;
    /// acks outside the connect phase are dropped.
    ///
    /// When every current member has acked, every member receives
    /// `ptpMediation_success` and the lobby is closed through the
    /// normal closure cascade (`lobby_closed` follows the success
    /// frame).
    pub fn ack_peer_success(&self, token_text: &str) {
        let Some(token) = Token::parse(token_text) else {
            return;
        };
        let mut inner = self.lock();
        let Some(lobby_id) = inner.by_token.get(&token).cloned() else {
            warn!("dropping connectivity ack: unknown sender");
            return;
        };

        let all_acked = {
            let Some(lobby) = inner.lobbies.get_mut(&lobby_id) else {
                return;
            };
            let member_tokens = lobby.member_tokens();
            let Some(mediator) = lobby.mediator.as_mut() else {
                return;
            };
            if mediator.phase != MediationPhase::Connecting {
                return;
            }
            mediator.record_ack(token);
            mediator.all_acked(&member_tokens)
        };

        if all_acked {
            if let Some(lobby) = inner.lobbies.get_mut(&lobby_id) {
                lobby.broadcast(PTP_MEDIATION_SUCCESS, &PtpMediationSuccess {});
            }
            info!(lobby = %lobby_id, "mediation succeeded");
            Self::close_locked(&mut inner, &lobby_id);
        }
    }

    /// Tear down a live mediation, notify every current member with
    /// the reason, and unlock the lobby. No-op if no mediation is
    /// live. The lobby stays open; the host may start again.
    pub(crate) fn abort_mediation(lobby: &mut Lobby, reason: &str) {
        if lobby.mediator.take().is_none() {
            return;
        }
        lobby.set_locked(false);
        lobby.broadcast(
            PTP_MEDIATION_ABORTED,
            &PtpMediationAborted {
                abort_reason: reason.to_string(),
            },
        );
        info!(lobby = %lobby.id(), reason, "mediation aborted");
    }

    /// Reminder tick: re-ask every still-uncaptured member to send a
    /// datagram. Returns false when the mediation this tick belongs to
    /// is gone, so the tick loop stops.
    fn on_reminder_tick(&self, lobby_id: &LobbyId, generation: u64) -> bool {
        let inner = self.lock();
        let Some(lobby) = inner.lobbies.get(lobby_id) else {
            return false;
        };
        let Some(mediator) = lobby.mediator.as_ref() else {
            return false;
        };
        if mediator.generation != generation || mediator.phase != MediationPhase::Capturing {
            return false;
        }

        let payload = PtpMediationSend {
            port: self.config.udp_port,
        };
        for member in lobby.members() {
            if !mediator.is_observed(member.session.token()) {
                member.session.sink().send(PTP_MEDIATION_SEND, &payload);
            }
        }
        true
    }

    fn on_capture_deadline(&self, lobby_id: &LobbyId, generation: u64) {
        let mut inner = self.lock();
        let Some(lobby) = inner.lobbies.get_mut(lobby_id) else {
            return;
        };
        let live = matches!(
            lobby.mediator.as_ref(),
            Some(m) if m.generation == generation && m.phase == MediationPhase::Capturing
        );
        if !live {
            return;
        }
        warn!(lobby = %lobby_id, "capture deadline expired");
        Self::abort_mediation(lobby, ABORT_CAPTURE_TIMEOUT);
    }

    fn on_connect_deadline(&self, lobby_id: &LobbyId, generation: u64) {
        let mut inner = self.lock();
        let Some(lobby) = inner.lobbies.get_mut(lobby_id) else {
            return;
        };
        let live = matches!(
            lobby.mediator.as_ref(),
            Some(m) if m.generation == generation && m.phase == MediationPhase::Connecting
        );
        if !live {
            return;
        }
        warn!(lobby = %lobby_id, "peer-connect deadline expired");
        Self::abort_mediation(lobby, ABORT_CONNECT_TIMEOUT);
    }
}
