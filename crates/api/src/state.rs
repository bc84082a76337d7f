use std::sync::Arc;

use uuid::Uuid;

use facelink_core::config::Config;
use facelink_core::proto::{Ack, Header};
use facelink_panels::PanelScheduler;
use facelink_recognizers::RecognizerScheduler;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// Cheaply cloneable; the schedulers and config live behind `Arc` and the
/// pool is already a handle.
#[derive(Clone)]
pub struct AppState {
    /// Store connection pool.
    pub pool: facelink_db::DbPool,
    pub config: Arc<Config>,
    /// The coordinator's own advertised base URL, echoed in every header.
    pub src_addr: String,
    /// Face-recognition worker pool and its awaiting-images queue.
    pub recognizers: Arc<RecognizerScheduler>,
    /// Console scheduler and its two queues.
    pub panels: Arc<PanelScheduler>,
}

impl AppState {
    /// Outbound header for a correlation UUID.
    pub fn header(&self, uuid: Uuid) -> Header {
        Header {
            src_addr: self.src_addr.clone(),
            uuid,
        }
    }

    /// Successful acknowledgement envelope echoing the request's UUID.
    pub fn ok_ack(&self, uuid: Uuid) -> Ack {
        Ack::ok(self.src_addr.clone(), uuid)
    }
}
