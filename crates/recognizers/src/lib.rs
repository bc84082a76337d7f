//! Face-recognition worker pool.
//!
//! Owns the queue of images awaiting feature extraction and dispatches
//! processing requests to a fixed pool of remote recognizers with
//! round-robin load balancing and sequential failover.

mod scheduler;

pub use scheduler::{AwaitingImage, DispatchError, RecognizerScheduler};
