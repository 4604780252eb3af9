//! Ports: trait seams the protocol and application layers depend on.
pub mod crypto;
