//! Shared building blocks for the facelink coordinator.
//!
//! Everything that more than one crate needs lives here: the domain types
//! (`types`), the on-the-wire message shapes (`proto`), peer base-URL
//! parsing (`peer`), the keyed expiring queues that hold in-flight
//! correlation state (`ttl_queue`), the outbound PUT-JSON transport
//! (`transport`), and the YAML configuration model (`config`).

pub mod config;
pub mod peer;
pub mod proto;
pub mod transport;
pub mod ttl_queue;
pub mod types;
