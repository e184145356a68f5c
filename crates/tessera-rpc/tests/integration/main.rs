//! Integration tests for tessera-rpc
//!
//! Runs the real hyper server on a loopback port against the in-memory
//! stores, and uses wiremock to simulate misbehaving or replicated metadata
//! endpoints.

mod common;

mod test_leader;
mod test_loopback;
