//! PUT /api/v1/put_faces_data — worker callback with detected faces.
//!
//! The UUID decides the pipeline: a hit in the recognition queue means a
//! camera-initiated image; otherwise the UUID may be a child image of an
//! enrollment session; otherwise the callback is for a request the reaper
//! already expired and is dropped.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::Json;
use uuid::Uuid;

use facelink_core::proto::{Ack, NotifyControlReq, PutFacesDataReq};
use facelink_core::types::{ControlObject, FaceData, ImageControlObject};
use facelink_db::repositories::ControlObjectRepo;
use facelink_panels::{AwaitingControl, SessionProgress, Target};
use facelink_recognizers::AwaitingImage;

use crate::error::ApiError;
use crate::state::AppState;
use crate::validate;

use super::commit;

pub async fn put_faces_data(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    validate::require_put(&method).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let req: PutFacesDataReq =
        validate::parse_json(&body).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let uuid = req.header.uuid;

    if let Some(error) = &req.error_data {
        // The worker could not process the image; drop it, no retry.
        tracing::warn!(
            uuid = %uuid,
            worker = %req.header.src_addr,
            code = error.code,
            text = %error.text,
            "worker reported an error, dropping awaiting image"
        );
        state.recognizers.awaiting.pop(&uuid);
    } else {
        let task_state = state.clone();
        tokio::spawn(async move {
            correlate_faces_data(task_state, req).await;
        });
    }

    Ok(Json(state.ok_ack(uuid)))
}

/// Tie the callback back to whatever is waiting for it.
async fn correlate_faces_data(state: AppState, req: PutFacesDataReq) {
    let uuid = req.header.uuid;

    if let Some(awaiting) = state.recognizers.awaiting.pop(&uuid) {
        tracing::debug!(uuid = %uuid, faces = req.faces_data.len(), "callback matched awaiting image");
        camera_pipeline(state, uuid, awaiting, req.faces_data).await;
        return;
    }

    if let Some(session) = state.panels.enrollments.find(|s| s.has_child(&uuid)) {
        tracing::debug!(session = %session.uuid, child = %uuid, "callback matched enrollment session");
        if let SessionProgress::Ready(bundle) = session.record_faces(uuid, req.faces_data) {
            state.panels.enrollments.pop(&session.uuid);
            commit::commit_enrollment(&state, &session, *bundle).await;
        }
        return;
    }

    tracing::warn!(uuid = %uuid, "faces data for unknown request, dropping");
}

/// Camera path: look every face up in the store, then either commit
/// directly (no consoles) or ask an operator.
async fn camera_pipeline(
    state: AppState,
    uuid: Uuid,
    awaiting: Arc<AwaitingImage>,
    faces: Vec<FaceData>,
) {
    let boundary = state.config.storage.cosine_boundary;
    let mut proposals = Vec::with_capacity(faces.len());
    let mut vectors = Vec::with_capacity(faces.len());

    for (i, face) in faces.into_iter().enumerate() {
        let cob = match ControlObjectRepo::find_by_feature_vector(
            &state.pool,
            &face.facial_features_vector,
            boundary,
        )
        .await
        {
            Ok(cob) => cob,
            Err(e) => {
                tracing::warn!(uuid = %uuid, face = i, error = %e, "identity lookup failed, proposing unknown");
                ControlObject::unknown()
            }
        };
        proposals.push(ImageControlObject {
            control_object: cob,
            face_box: face.face_box,
        });
        vectors.push(face.facial_features_vector);
    }

    if state.panels.panel_count() == 0 {
        tracing::debug!(uuid = %uuid, "no control panels configured, committing directly");
        commit::commit_recognized(&state, uuid, &awaiting.img_buff, &proposals, &vectors).await;
        return;
    }

    let notify = NotifyControlReq {
        header: state.header(uuid),
        img_buff: awaiting.img_buff.clone(),
        image_control_objects: proposals.clone(),
    };
    let entry = AwaitingControl {
        src_addr: awaiting.src_addr.clone(),
        img_buff: awaiting.img_buff.clone(),
        image_control_objects: proposals,
        facial_features_vectors: vectors,
    };
    if let Err(e) = state.panels.awaiting_controls.push(uuid, entry) {
        tracing::error!(uuid = %uuid, error = %e, "unable to enqueue awaiting control, dropping image");
        return;
    }

    if let Err(e) = state.panels.notify_control(&notify, Target::Broadcast).await {
        tracing::error!(uuid = %uuid, error = %e, "console broadcast failed, dropping awaiting control");
        state.panels.awaiting_controls.pop(&uuid);
    }
}
