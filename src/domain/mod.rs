//! Domain layer: suite/method registries, credentials, messages, errors.
//! Pure data and validation; no crypto and no I/O.
pub mod creds;
pub mod errors;
pub mod messages;
pub mod suites;
