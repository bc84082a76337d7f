//! HTTP handlers for the five coordinator endpoints plus the health probe.
//!
//! Every request handler follows the same shape: validate method and JSON,
//! enqueue correlation state, spawn a detached background task for the rest
//! of the pipeline, and return the acknowledgement envelope immediately.

mod commit;
mod control;
mod enroll;
mod faces_data;
mod health;
mod put_image;

pub use control::put_control;
pub use enroll::add_control_object;
pub use faces_data::put_faces_data;
pub use health::health;
pub use put_image::put_image;

use uuid::Uuid;

use facelink_core::proto::ProcessImageReq;
use facelink_core::types::FaceBox;

use crate::state::AppState;

/// Send a processing request to the worker pool on behalf of an awaiting
/// image; on dispatch failure the awaiting entry is removed so a later
/// callback for the same UUID is treated as unknown.
pub(crate) async fn dispatch_recognition(
    state: AppState,
    uuid: Uuid,
    img_buff: String,
    face_boxes: Vec<FaceBox>,
) {
    let req = ProcessImageReq {
        header: state.header(uuid),
        img_buff,
        face_boxes,
    };

    if let Err(e) = state.recognizers.send_process_image(&req).await {
        tracing::error!(uuid = %uuid, error = %e, "recognition dispatch failed, dropping awaiting image");
        state.recognizers.awaiting.pop(&uuid);
    }
}
