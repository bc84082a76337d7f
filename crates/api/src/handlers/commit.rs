//! Store commit pipelines shared by the camera and enrollment paths.

use chrono::Utc;
use uuid::Uuid;

use facelink_core::peer::PeerAddr;
use facelink_core::proto::Ack;
use facelink_core::types::{FacialFeaturesVector, ImageControlObject};
use facelink_db::models::{FacialFeaturesRow, ImageRow};
use facelink_db::repositories::{ControlObjectRepo, FacialFeaturesRepo, ImageRepo};
use facelink_panels::{CommitBundle, EnrollmentSession, Target};

use crate::archive;
use crate::state::AppState;

/// Direct commit for the zero-console deployment: archive the image and
/// persist rows for every recognized (non-sentinel) face. Unrecognized
/// faces have nobody to name them here and are dropped.
pub(crate) async fn commit_recognized(
    state: &AppState,
    uuid: Uuid,
    img_buff: &str,
    proposals: &[ImageControlObject],
    vectors: &[FacialFeaturesVector],
) {
    let recognized: Vec<usize> = proposals
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.control_object.is_unknown())
        .map(|(i, _)| i)
        .collect();

    let img_id = uuid.to_string();
    let path = archive::image_path(&state.config.storage.img_path, &img_id);
    archive::store(&path, img_buff).await;

    let image = ImageRow {
        id: img_id.clone(),
        ts: Utc::now(),
        path,
        face_ids: recognized
            .iter()
            .map(|&i| proposals[i].control_object.id.clone())
            .collect(),
    };
    if let Err(e) = ImageRepo::insert_many(&state.pool, std::slice::from_ref(&image)).await {
        tracing::error!(uuid = %uuid, error = %e, "image insert failed, partial commit possible");
        return;
    }

    let rows: Vec<FacialFeaturesRow> = recognized
        .iter()
        .map(|&i| FacialFeaturesRow {
            id: Uuid::new_v4().to_string(),
            cob_id: proposals[i].control_object.id.clone(),
            img_id: img_id.clone(),
            face_box: proposals[i].face_box,
            features: vectors[i].clone(),
        })
        .collect();
    if !rows.is_empty() {
        if let Err(e) = FacialFeaturesRepo::insert_many(&state.pool, &rows).await {
            tracing::error!(uuid = %uuid, error = %e, "facial features insert failed, partial commit possible");
            return;
        }
    }

    tracing::info!(
        uuid = %uuid,
        recognized = recognized.len(),
        total = proposals.len(),
        "image committed without operator review"
    );
}

/// Commit a completed enrollment session and notify its originating console.
///
/// The person's id is resolved by passport: a live row is reused, otherwise
/// a fresh UUID is minted and the control object inserted. Then one archived
/// image + image row and one facial-features row land per enrollment photo.
pub(crate) async fn commit_enrollment(
    state: &AppState,
    session: &EnrollmentSession,
    bundle: CommitBundle,
) {
    let mut cob = bundle.control_object_part.control_object;
    match ControlObjectRepo::find_by_passport(&state.pool, &cob.passport).await {
        Ok(existing) if !existing.is_unknown() => {
            tracing::debug!(session = %session.uuid, cob = %existing.id, "reusing enrolled identity");
            cob.id = existing.id;
        }
        Ok(_) => {
            cob.id = Uuid::new_v4().to_string();
            cob.ts = Utc::now();
            if let Err(e) =
                ControlObjectRepo::insert_many(&state.pool, std::slice::from_ref(&cob)).await
            {
                tracing::error!(session = %session.uuid, error = %e, "control object insert failed, partial commit possible");
                return;
            }
        }
        Err(e) => {
            tracing::error!(session = %session.uuid, error = %e, "passport lookup failed, aborting enrollment commit");
            return;
        }
    }

    let mut images = Vec::with_capacity(bundle.faces.len());
    let mut rows = Vec::with_capacity(bundle.faces.len());
    for (child, face) in &bundle.faces {
        let img_id = Uuid::new_v4().to_string();
        let path = archive::image_path(&state.config.storage.img_path, &img_id);
        if let Some(part) = bundle.images.get(child) {
            archive::store(&path, &part.img_buff).await;
        }
        images.push(ImageRow {
            id: img_id.clone(),
            ts: Utc::now(),
            path,
            face_ids: vec![cob.id.clone()],
        });
        rows.push(FacialFeaturesRow {
            id: Uuid::new_v4().to_string(),
            cob_id: cob.id.clone(),
            img_id,
            face_box: face.face_box,
            features: face.facial_features_vector.clone(),
        });
    }

    if !images.is_empty() {
        if let Err(e) = ImageRepo::insert_many(&state.pool, &images).await {
            tracing::error!(session = %session.uuid, error = %e, "image insert failed, partial commit possible");
            return;
        }
        if let Err(e) = FacialFeaturesRepo::insert_many(&state.pool, &rows).await {
            tracing::error!(session = %session.uuid, error = %e, "facial features insert failed, partial commit possible");
            return;
        }
    }

    tracing::info!(
        session = %session.uuid,
        cob = %cob.id,
        images = images.len(),
        "enrollment committed"
    );

    let resp = Ack::ok(state.src_addr.clone(), session.uuid);
    match PeerAddr::parse(&session.src_addr) {
        Ok(peer) => {
            if let Err(e) = state
                .panels
                .send_add_control_object_resp(&resp, Target::To(&peer))
                .await
            {
                tracing::error!(
                    session = %session.uuid,
                    console = %session.src_addr,
                    error = %e,
                    "unable to notify console about committed enrollment"
                );
            }
        }
        Err(e) => {
            tracing::warn!(
                session = %session.uuid,
                src_addr = %session.src_addr,
                error = %e,
                "enrollment originator is not a valid peer address"
            );
        }
    }
}
