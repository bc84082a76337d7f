//! PUT /api/v1/put_control — operator decision callback.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use facelink_core::proto::{Ack, ControlCommand, PutControlReq};
use facelink_core::types::{ControlObject, FaceBox, ImageControlObject};
use facelink_db::models::{FacialFeaturesRow, ImageRow};
use facelink_db::repositories::{ControlObjectRepo, FacialFeaturesRepo, ImageRepo};
use facelink_panels::AwaitingControl;
use facelink_recognizers::AwaitingImage;

use crate::archive;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validate;

use super::dispatch_recognition;

pub async fn put_control(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> Result<Json<Ack>, ApiError> {
    validate::require_put(&method).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let req: PutControlReq =
        validate::parse_json(&body).map_err(|e| ApiError::bad_request(&state, None, e))?;
    let uuid = req.header.uuid;

    let task_state = state.clone();
    tokio::spawn(async move {
        correlate_control(task_state, req).await;
    });

    Ok(Json(state.ok_ack(uuid)))
}

async fn correlate_control(state: AppState, req: PutControlReq) {
    let uuid = req.header.uuid;

    // Popping takes sole ownership of the record; a second decision or a
    // late duplicate finds nothing and is ignored.
    let Some(awaiting) = state.panels.awaiting_controls.pop(&uuid) else {
        tracing::warn!(uuid = %uuid, "operator decision for unknown request, ignoring");
        return;
    };

    match req.command {
        ControlCommand::Cancel => {
            tracing::info!(uuid = %uuid, "operator cancelled image");
        }
        ControlCommand::ProcessAgain => {
            process_again(state, uuid, awaiting, req.face_boxes).await;
        }
        ControlCommand::Submit => {
            submit(state, uuid, awaiting, req.image_control_objects).await;
        }
    }
}

/// Re-run recognition with the operator-drawn face boxes under the same
/// correlation UUID.
async fn process_again(
    state: AppState,
    uuid: Uuid,
    awaiting: Arc<AwaitingControl>,
    face_boxes: Vec<FaceBox>,
) {
    tracing::info!(uuid = %uuid, boxes = face_boxes.len(), "operator requested reprocessing");

    let entry = AwaitingImage {
        src_addr: awaiting.src_addr.clone(),
        img_buff: awaiting.img_buff.clone(),
        face_boxes: face_boxes.clone(),
    };
    if let Err(e) = state.recognizers.awaiting.push(uuid, entry) {
        tracing::error!(uuid = %uuid, error = %e, "unable to re-enqueue image for reprocessing");
        return;
    }

    dispatch_recognition(state, uuid, awaiting.img_buff.clone(), face_boxes).await;
}

/// A face the operator confirmed, matched back to its awaited proposal.
struct KeptFace {
    /// Index into the awaited proposals / feature vectors.
    index: usize,
    control_object: ControlObject,
    /// Whether the operator changed the proposed identity.
    edited: bool,
}

/// Commit the operator's identifications.
///
/// Replies are matched to proposals by exact face-box equality; boxes the
/// coordinator never proposed are ignored. Edited identities are resolved
/// by passport (reuse a live row or insert a new one), then one image row
/// and one facial-features row per kept face are bulk-inserted. The three
/// bulk transactions are separate; a failure in a later one leaves earlier
/// rows behind, which the append-only store tolerates.
async fn submit(
    state: AppState,
    uuid: Uuid,
    awaiting: Arc<AwaitingControl>,
    confirmed: Vec<ImageControlObject>,
) {
    let mut kept: Vec<KeptFace> = Vec::with_capacity(confirmed.len());
    for ico in confirmed {
        let Some(index) = awaiting
            .image_control_objects
            .iter()
            .position(|p| p.face_box == ico.face_box)
        else {
            tracing::debug!(uuid = %uuid, "operator face box matches no proposal, skipping");
            continue;
        };
        let edited = !awaiting.image_control_objects[index]
            .control_object
            .same_identity(&ico.control_object);
        kept.push(KeptFace {
            index,
            control_object: ico.control_object,
            edited,
        });
    }

    let mut new_cobs = Vec::new();
    for face in kept.iter_mut().filter(|f| f.edited) {
        match ControlObjectRepo::find_by_passport(&state.pool, &face.control_object.passport).await
        {
            Ok(existing) if !existing.is_unknown() => {
                face.control_object.id = existing.id;
            }
            Ok(_) => {
                face.control_object.id = Uuid::new_v4().to_string();
                face.control_object.ts = Utc::now();
                new_cobs.push(face.control_object.clone());
            }
            Err(e) => {
                tracing::error!(uuid = %uuid, error = %e, "passport lookup failed, aborting commit");
                return;
            }
        }
    }
    if !new_cobs.is_empty() {
        if let Err(e) = ControlObjectRepo::insert_many(&state.pool, &new_cobs).await {
            tracing::error!(uuid = %uuid, error = %e, "control object insert failed, partial commit possible");
            return;
        }
    }

    let img_id = uuid.to_string();
    let path = archive::image_path(&state.config.storage.img_path, &img_id);
    archive::store(&path, &awaiting.img_buff).await;

    let image = ImageRow {
        id: img_id.clone(),
        ts: Utc::now(),
        path,
        face_ids: kept.iter().map(|f| f.control_object.id.clone()).collect(),
    };
    if let Err(e) = ImageRepo::insert_many(&state.pool, std::slice::from_ref(&image)).await {
        tracing::error!(uuid = %uuid, error = %e, "image insert failed, partial commit possible");
        return;
    }

    let rows: Vec<FacialFeaturesRow> = kept
        .iter()
        .map(|f| FacialFeaturesRow {
            id: Uuid::new_v4().to_string(),
            cob_id: f.control_object.id.clone(),
            img_id: img_id.clone(),
            face_box: awaiting.image_control_objects[f.index].face_box,
            features: awaiting.facial_features_vectors[f.index].clone(),
        })
        .collect();
    if let Err(e) = FacialFeaturesRepo::insert_many(&state.pool, &rows).await {
        tracing::error!(uuid = %uuid, error = %e, "facial features insert failed, partial commit possible");
        return;
    }

    tracing::info!(
        uuid = %uuid,
        faces = rows.len(),
        new_identities = new_cobs.len(),
        "operator submit committed"
    );
}
