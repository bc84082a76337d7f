//! Domain types shared by the wire protocol and the persistent store.
//!
//! The sentinel string `"-"` marks an unknown field; a control object whose
//! `id` is the sentinel means "no match found". Peers rely on both
//! conventions, so they are part of the wire contract, not an implementation
//! detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for unknown string fields and the "no match" control object id.
pub const UNKNOWN_FIELD: &str = "-";

/// Dimensionality of a facial features vector.
pub const FEATURE_DIM: usize = 128;

/// Biological sex as recorded on a control object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    /// Database/wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
            Sex::Unknown => "unknown",
        }
    }

    /// Parse the database representation. Anything unrecognised maps to
    /// [`Sex::Unknown`] rather than failing a whole row read.
    pub fn from_db(s: &str) -> Self {
        match s {
            "male" => Sex::Male,
            "female" => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

/// A person known to the system.
///
/// Created on enrollment commit and never mutated in place: an update is a
/// new row, reads resolve to the latest row for the passport. `passport` is
/// the human key used for idempotent upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlObject {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub passport: String,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub sex: Sex,
    pub birthdate: String,
    pub phone_num: String,
    pub email: String,
    pub address: String,
}

impl ControlObject {
    /// The "no match found" sentinel object: every field unknown.
    pub fn unknown() -> Self {
        Self {
            id: UNKNOWN_FIELD.to_string(),
            ts: Utc::now(),
            passport: UNKNOWN_FIELD.to_string(),
            surname: UNKNOWN_FIELD.to_string(),
            name: UNKNOWN_FIELD.to_string(),
            patronymic: UNKNOWN_FIELD.to_string(),
            sex: Sex::Unknown,
            birthdate: UNKNOWN_FIELD.to_string(),
            phone_num: UNKNOWN_FIELD.to_string(),
            email: UNKNOWN_FIELD.to_string(),
            address: UNKNOWN_FIELD.to_string(),
        }
    }

    /// Whether this is the "no match found" sentinel.
    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_FIELD
    }

    /// Whether two control objects describe the same identity.
    ///
    /// Compares the business fields only -- `id` and `ts` are store-assigned
    /// and consoles may echo them back blank.
    pub fn same_identity(&self, other: &ControlObject) -> bool {
        self.passport == other.passport
            && self.surname == other.surname
            && self.name == other.name
            && self.patronymic == other.patronymic
            && self.sex == other.sex
            && self.birthdate == other.birthdate
            && self.phone_num == other.phone_num
            && self.email == other.email
            && self.address == other.address
    }
}

/// Pixel-coordinate bounding box of a face: (top, right, bottom, left).
///
/// Serialises as a 4-element JSON array. Exact tuple equality is what ties
/// an operator's reply back to the proposal it answers, so this is `Eq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceBox(pub [u64; 4]);

impl FaceBox {
    pub fn top(&self) -> u64 {
        self.0[0]
    }

    pub fn right(&self) -> u64 {
        self.0[1]
    }

    pub fn bottom(&self) -> u64 {
        self.0[2]
    }

    pub fn left(&self) -> u64 {
        self.0[3]
    }

    /// Components as the store's `BIGINT[]` representation.
    pub fn to_db(&self) -> Vec<i64> {
        self.0.iter().map(|c| *c as i64).collect()
    }
}

/// A 128-dimensional facial embedding, components in [-1, 1].
///
/// Identity comparison uses cosine similarity; component-wise equality is
/// not meaningful and deliberately not derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacialFeaturesVector(pub Vec<f64>);

impl FacialFeaturesVector {
    /// Validate dimensionality and component range.
    pub fn validate(&self) -> Result<(), String> {
        if self.0.len() != FEATURE_DIM {
            return Err(format!(
                "facial features vector has {} components, expected {FEATURE_DIM}",
                self.0.len()
            ));
        }
        if let Some(c) = self.0.iter().find(|c| !(-1.0..=1.0).contains(*c)) {
            return Err(format!("facial features component {c} outside [-1, 1]"));
        }
        Ok(())
    }

    /// Render as a pgvector text literal, e.g. `[0.1,0.2,...]`.
    ///
    /// Vector values cross the SQL boundary as text and are cast with
    /// `::vector` server-side.
    pub fn to_sql_literal(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 8 + 2);
        out.push('[');
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&c.to_string());
        }
        out.push(']');
        out
    }
}

/// One face found by a recognizer: where it is and what it looks like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceData {
    pub face_box: FaceBox,
    pub facial_features_vector: FacialFeaturesVector,
}

/// "This face in this image is believed to be this person."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageControlObject {
    pub control_object: ControlObject,
    pub face_box: FaceBox,
}
