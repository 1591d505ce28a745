//! # orion-server
//!
//! Transport wiring for the Orion rendezvous server:
//!
//! - **Configuration** via [`config`] — TOML options with defaults
//! - **Request-response surface + routing** via [`http`]
//! - **Control-channel streams** via [`ws`] — WebSocket upgrade,
//!   per-session read loop, sink-draining writer task
//! - **Datagram channel** via [`udp`] — the receive-only UDP loop
//! - **Shared state** via [`state`]
//!
//! The binary in `main.rs` assembles these; integration tests mount
//! the same router and loops against ephemeral ports.

pub mod config;
pub mod http;
pub mod state;
pub mod udp;
pub mod ws;
