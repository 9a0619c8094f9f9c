//! Integration tests for the lobby server and client.
//!
//! Every test starts a real server on an ephemeral localhost port and talks
//! to it over TCP.

#[cfg(test)]
mod harness;
