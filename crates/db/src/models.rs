//! Row types for the three store tables.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use facelink_core::types::{ControlObject, FaceBox, FacialFeaturesVector, Sex};

/// `control_objects` row as read back from the store.
///
/// `sex` is kept as its text representation here and parsed on conversion,
/// so one bad row cannot fail a whole scan.
#[derive(Debug, Clone, FromRow)]
pub struct ControlObjectRow {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub passport: String,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub sex: String,
    pub birthdate: String,
    pub phone_num: String,
    pub email: String,
    pub address: String,
}

impl From<ControlObjectRow> for ControlObject {
    fn from(row: ControlObjectRow) -> Self {
        ControlObject {
            id: row.id,
            ts: row.ts,
            passport: row.passport,
            surname: row.surname,
            name: row.name,
            patronymic: row.patronymic,
            sex: Sex::from_db(&row.sex),
            birthdate: row.birthdate,
            phone_num: row.phone_num,
            email: row.email,
            address: row.address,
        }
    }
}

/// One `facial_features` row to insert: a face box and feature vector tied
/// to a control object and the image they were observed in.
#[derive(Debug, Clone)]
pub struct FacialFeaturesRow {
    pub id: String,
    pub cob_id: String,
    pub img_id: String,
    pub face_box: FaceBox,
    pub features: FacialFeaturesVector,
}

/// One `imgs` row: an archived image and the people appearing in it.
#[derive(Debug, Clone, FromRow)]
pub struct ImageRow {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub path: String,
    pub face_ids: Vec<String>,
}
