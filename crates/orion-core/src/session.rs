//! Session registry: one entry per live control-channel stream.
//!
//! A session is created when a client's stream opens and destroyed
//! when it closes. Each session holds an opaque internal id and a
//! secret token. The token is the client's single cross-channel
//! identity: it authenticates request-response calls, inbound stream
//! frames, and datagrams, and is disclosed only on the owning stream,
//! in the `client_registered` frame emitted at open.
//!
//! Token ↔ session is a bijection over live sessions; tokens are
//! invalidated on close and never reissued.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};
use uuid::Uuid;

use crate::sink::FrameSink;

/// Opaque internal session identifier. Distinct from the token and
/// safe to log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A session's secret token (UUID v4).
///
/// Treated as a credential: `Debug` and `Display` are redacted so the
/// value can never reach log output. Use [`Token::reveal`] at the
/// serialization boundary only.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(Uuid);

impl Token {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied token string. `None` means the string
    /// is not even token-shaped and can never match a live session.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }

    /// The token's wire form. Only for payload serialization.
    pub fn reveal(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(redacted)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// A live control-channel session.
pub struct Session {
    id: SessionId,
    token: Token,
    sink: FrameSink,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn sink(&self) -> &FrameSink {
        &self.sink
    }
}

struct Inner {
    by_id: HashMap<SessionId, Arc<Session>>,
    by_token: HashMap<Token, SessionId>,
    next_id: u64,
}

/// Registry of live sessions, indexed by id and by token.
///
/// Both indices mutate under one lock; reads see a consistent
/// snapshot.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_id: HashMap::new(),
                by_token: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a newly opened stream.
    ///
    /// Mints a fresh token (re-rolling on the astronomically unlikely
    /// collision), inserts into both indices, and emits the
    /// `client_registered` frame carrying the token on the new
    /// session's sink, and only that sink, before returning.
    pub fn open(&self, sink: FrameSink) -> Arc<Session> {
        let mut inner = self.lock();

        let mut token = Token::generate();
        while inner.by_token.contains_key(&token) {
            token = Token::generate();
        }

        let id = SessionId(inner.next_id);
        inner.next_id += 1;

        let session = Arc::new(Session { id, token, sink });
        inner.by_token.insert(session.token.clone(), id);
        inner.by_id.insert(id, session.clone());
        drop(inner);

        session.sink.send(
            orion_proto::messages::CLIENT_REGISTERED,
            &orion_proto::messages::ClientRegistered {
                token: session.token.reveal(),
            },
        );

        info!(session_id = %id, "session registered");
        session
    }

    /// Look up a session by its id.
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.lock().by_id.get(&id).cloned()
    }

    /// Look up a session by token.
    pub fn lookup_by_token(&self, token: &Token) -> Option<Arc<Session>> {
        let inner = self.lock();
        let id = inner.by_token.get(token)?;
        inner.by_id.get(id).cloned()
    }

    /// Resolve a client-supplied token string to a session.
    pub fn resolve(&self, token_text: &str) -> Option<Arc<Session>> {
        let token = Token::parse(token_text)?;
        self.lookup_by_token(&token)
    }

    /// Remove a session from both indices.
    ///
    /// The caller drives lobby-side cleanup through
    /// [`LobbyRegistry::on_session_close`](crate::LobbyRegistry::on_session_close);
    /// this only invalidates the session itself.
    pub fn close(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut inner = self.lock();
        let session = inner.by_id.remove(&id)?;
        inner.by_token.remove(&session.token);
        drop(inner);

        debug!(session_id = %id, "session closed");
        Some(session)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every live sink and clear all state.
    ///
    /// Sinks already closing or closed are unaffected (close is
    /// idempotent). No lobby notifications are dispatched here; the
    /// process is going down and every peer with it.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        for session in inner.by_id.values() {
            session.sink.close();
        }
        inner.by_id.clear();
        inner.by_token.clear();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
