//! Integration test crate for the Orion rendezvous server.
//!
//! This crate has no library code — it only contains integration
//! tests that exercise end-to-end flows against a live server on
//! ephemeral ports: real WebSocket clients, real HTTP calls, real UDP
//! datagrams.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p orion-integration-tests
//! ```
