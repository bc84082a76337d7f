//! PUT /api/v1/add_control_object — enrollment submission from a console.
//!
//! One enrollment arrives as several messages under a single session UUID:
//! an identity part naming the person and the photo count, and one image
//! part per photo. Pieces arrive in any order; the first one creates the
//! session and the commit fires from whichever worker callback (or identity
//! part) completes it.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::Json;
use uuid::Uuid;

use facelink_core::proto::{
    Ack, AddControlObjectReq, ErrorData, ProcessImageReq, CORRUPTED_BODY, UNABLE_TO_ENQUEUE,
};
use facelink_panels::{EnrollmentSession, SessionProgress};

use crate::error::ApiError;
use crate::state::AppState;
use crate::validate;

use super::commit;

pub async fn add_control_object(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    validate::require_put(&method).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let req: AddControlObjectReq =
        validate::parse_json(&body).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let uuid = req.header.uuid;

    if req.control_object_part.is_none() && req.image_part.is_none() {
        return Err(ApiError::bad_request(
            &state,
            Some(uuid),
            ErrorData::new(
                CORRUPTED_BODY,
                "corrupted request body",
                "request carries neither a control object part nor an image part",
            ),
        ));
    }
    if let Some(part) = &req.image_part {
        validate::decode_image(&part.img_buff)
            .map_err(|e| ApiError::bad_request(&state, Some(uuid), e))?;
    }

    // First piece creates the session; later pieces coalesce into it.
    let session = EnrollmentSession::new(uuid, req.header.src_addr.clone());
    match state.panels.enrollments.push_if_absent(uuid, session) {
        Ok(created) => {
            if created {
                tracing::info!(session = %uuid, console = %req.header.src_addr, "enrollment session opened");
            }
        }
        Err(e) => {
            return Err(ApiError::internal(
                &state,
                Some(uuid),
                ErrorData::new(UNABLE_TO_ENQUEUE, "unable to enqueue request", e.to_string()),
            ));
        }
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        attach_enrollment_piece(task_state, req).await;
    });

    Ok(Json(state.ok_ack(uuid)))
}

async fn attach_enrollment_piece(state: AppState, req: AddControlObjectReq) {
    let uuid = req.header.uuid;
    let Some(session) = state.panels.enrollments.get(&uuid) else {
        tracing::warn!(session = %uuid, "enrollment session vanished before processing");
        return;
    };

    if let Some(part) = req.control_object_part {
        tracing::debug!(session = %uuid, images_num = part.images_num, "enrollment identity part received");
        if let SessionProgress::Ready(bundle) = session.attach_control_object(part) {
            state.panels.enrollments.pop(&uuid);
            commit::commit_enrollment(&state, &session, *bundle).await;
        }
        return;
    }

    // Validation guarantees an image part from here on.
    let Some(image_part) = req.image_part else {
        return;
    };

    let child = Uuid::new_v4();
    session.register_image(child, image_part.clone());
    tracing::debug!(session = %uuid, child = %child, "enrollment image part received");

    let process = ProcessImageReq {
        header: state.header(child),
        img_buff: image_part.img_buff,
        face_boxes: image_part.face_box.into_iter().collect(),
    };
    if let Err(e) = state.recognizers.send_process_image(&process).await {
        tracing::error!(
            session = %uuid,
            child = %child,
            error = %e,
            "enrollment image dispatch failed, dropping that photo"
        );
        if let SessionProgress::Ready(bundle) = session.drop_child(child) {
            state.panels.enrollments.pop(&uuid);
            commit::commit_enrollment(&state, &session, *bundle).await;
        }
    }
}
