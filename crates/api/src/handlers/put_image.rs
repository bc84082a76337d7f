//! PUT /api/v1/put_image — camera submits an image for recognition.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::Json;

use facelink_core::proto::{Ack, ErrorData, PutImageReq, UNABLE_TO_ENQUEUE};
use facelink_recognizers::AwaitingImage;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validate;

use super::dispatch_recognition;

/// Validate, enqueue the awaiting image under the request's UUID, spawn the
/// worker dispatch, and acknowledge immediately.
pub async fn put_image(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    validate::require_put(&method).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let req: PutImageReq =
        validate::parse_json(&body).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let uuid = req.header.uuid;
    validate::decode_image(&req.img_buff)
        .map_err(|e| ApiError::bad_request(&state, Some(uuid), e))?;

    tracing::info!(uuid = %uuid, src_addr = %req.header.src_addr, "image submitted for recognition");

    let entry = AwaitingImage {
        src_addr: req.header.src_addr.clone(),
        img_buff: req.img_buff.clone(),
        face_boxes: req.face_boxes.clone(),
    };
    state.recognizers.awaiting.push(uuid, entry).map_err(|e| {
        ApiError::internal(
            &state,
            Some(uuid),
            ErrorData::new(UNABLE_TO_ENQUEUE, "unable to enqueue request", e.to_string()),
        )
    })?;

    let task_state = state.clone();
    tokio::spawn(async move {
        dispatch_recognition(task_state, uuid, req.img_buff, req.face_boxes).await;
    });

    Ok(Json(state.ok_ack(uuid)))
}
