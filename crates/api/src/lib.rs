//! facelink API server library.
//!
//! Exposes the building blocks (state, router, handlers, validation) so
//! integration tests and the binary entrypoint share one assembly path.

pub mod archive;
pub mod cli;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod validate;
