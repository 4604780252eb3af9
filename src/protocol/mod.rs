//! Protocol layer: wire codec, transcript hashes, key schedule,
//! authentication material. Everything here is deterministic; randomness
//! and long-term keys stay in the application layer.
pub mod auth;
pub mod keyschedule;
pub mod transcript;
pub mod wire;
