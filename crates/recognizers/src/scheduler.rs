//! Round-robin dispatch to the face-recognition worker pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use facelink_core::config::FaceRecognizersConfig;
use facelink_core::peer::{PeerAddr, PeerAddrError};
use facelink_core::proto::ProcessImageReq;
use facelink_core::transport::HttpTransport;
use facelink_core::ttl_queue::TtlQueue;
use facelink_core::types::FaceBox;

const API_PROCESS_IMAGE: &str = "/api/v1/process_image";
const API_GET_FACIAL_FEATURES_VECTORS: &str = "/api/v1/get_facial_features_vectors";

/// An image submitted for recognition, waiting for its worker callback.
///
/// `face_boxes` holds caller-supplied boxes; when non-empty the worker
/// skips detection and only computes features for those boxes.
#[derive(Debug, Clone)]
pub struct AwaitingImage {
    /// Address of the submitting peer.
    pub src_addr: String,
    /// Base64 image buffer exactly as received.
    pub img_buff: String,
    pub face_boxes: Vec<FaceBox>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no face recognizers are configured")]
    NoWorkers,

    #[error("request \"{uuid}\" could not be delivered to any of {count} face recognizers")]
    AllWorkersUnreachable { count: usize, uuid: Uuid },
}

/// Fixed pool of recognizer workers with an advisory round-robin cursor.
///
/// Workers are never removed on failure; a worker that was down simply gets
/// retried on a later call. Ordering between concurrent dispatches is not
/// guaranteed.
pub struct RecognizerScheduler {
    workers: Vec<PeerAddr>,
    cursor: AtomicU64,
    transport: Arc<HttpTransport>,
    /// Images awaiting a faces-data callback, keyed by correlation UUID.
    pub awaiting: Arc<TtlQueue<AwaitingImage>>,
}

impl RecognizerScheduler {
    pub fn new(
        cfg: &FaceRecognizersConfig,
        transport: Arc<HttpTransport>,
    ) -> Result<Self, PeerAddrError> {
        let workers = cfg
            .face_recognizers
            .iter()
            .map(|url| PeerAddr::parse(url))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            workers,
            cursor: AtomicU64::new(0),
            transport,
            awaiting: Arc::new(TtlQueue::new(
                "awaiting_images",
                cfg.aw_imgs_q_clean_ms,
                cfg.aw_imgs_q_max_size,
            )),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Dispatch a processing request to the pool.
    ///
    /// Starts at the round-robin cursor and walks the pool in order on
    /// failure, trying each worker at most once. The endpoint depends on
    /// whether the request already carries face boxes.
    pub async fn send_process_image(&self, req: &ProcessImageReq) -> Result<(), DispatchError> {
        let n = self.workers.len();
        if n == 0 {
            return Err(DispatchError::NoWorkers);
        }

        let endpoint = if req.face_boxes.is_empty() {
            API_PROCESS_IMAGE
        } else {
            API_GET_FACIAL_FEATURES_VECTORS
        };

        let start = (self.cursor.fetch_add(1, Ordering::Relaxed) as usize) % n;
        for step in 0..n {
            let worker = &self.workers[(start + step) % n];
            match self.transport.put_json(worker, endpoint, req).await {
                Ok(()) => {
                    tracing::debug!(
                        uuid = %req.header.uuid,
                        worker = %worker,
                        endpoint,
                        "process request accepted"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        uuid = %req.header.uuid,
                        worker = %worker,
                        error = %e,
                        "face recognizer dispatch failed, trying next"
                    );
                }
            }
        }

        Err(DispatchError::AllWorkersUnreachable {
            count: n,
            uuid: req.header.uuid,
        })
    }
}
