//! Shared server state handed to every handler.

use std::sync::Arc;

use orion_core::{LobbyRegistry, SessionRegistry};

/// The two registries every transport feeds into.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub lobbies: Arc<LobbyRegistry>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionRegistry>, lobbies: Arc<LobbyRegistry>) -> Self {
        Self { sessions, lobbies }
    }
}
