//! On-the-wire message shapes for every peer of the coordinator.
//!
//! All bodies are JSON. Every message carries a [`Header`] with the sender's
//! source address and the correlation UUID that ties a submission, its
//! worker callback and its console callback together. Image buffers are
//! base64-encoded strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ControlObject, FaceBox, FaceData, ImageControlObject};

/// Basic headers every message must have.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// `IP:PORT` base URL or path to a UNIX socket of the sender.
    pub src_addr: String,
    /// Correlation UUID.
    pub uuid: Uuid,
}

/// Structured error payload carried in responses and worker callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: i32,
    pub info: String,
    pub text: String,
}

/// Request used an HTTP method other than the expected one.
pub const INVALID_REQUEST_METHOD: i32 = -1;
/// Body was unreadable, not JSON, or failed semantic validation.
pub const CORRUPTED_BODY: i32 = -2;
/// Correlation queue refused the record (duplicate UUID or at capacity).
pub const UNABLE_TO_ENQUEUE: i32 = -3;
/// No peer accepted an outbound request.
pub const UNABLE_TO_SEND: i32 = -4;
/// Anything else that went wrong server-side.
pub const INTERNAL_SERVER_ERROR: i32 = -5;

impl ErrorData {
    pub fn new(code: i32, info: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            code,
            info: info.into(),
            text: text.into(),
        }
    }
}

/// Immediate acknowledgement envelope returned by every coordinator handler,
/// and the shape of the completion notification sent back to consoles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub header: Header,
    pub error_data: Option<ErrorData>,
}

impl Ack {
    /// Successful acknowledgement echoing the request's correlation UUID.
    pub fn ok(src_addr: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            header: Header {
                src_addr: src_addr.into(),
                uuid,
            },
            error_data: None,
        }
    }
}

/// Enrollment-complete notification to the originating console.
pub type AddControlObjectResp = Ack;

/// Camera -> coordinator: submit an image for recognition.
///
/// If `face_boxes` is non-empty the caller already knows where the faces
/// are and the worker only computes features for those boxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutImageReq {
    pub header: Header,
    /// Base64-encoded image bytes (PNG/JPEG/BMP).
    pub img_buff: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub face_boxes: Vec<FaceBox>,
}

/// Coordinator -> worker: run detection + feature extraction (or
/// features-only when `face_boxes` is given).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessImageReq {
    pub header: Header,
    pub img_buff: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub face_boxes: Vec<FaceBox>,
}

/// Worker -> coordinator: faces-data callback.
///
/// A worker that failed to process the image sets `error_data` instead of
/// `faces_data`; the originating request is then dropped without retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutFacesDataReq {
    pub header: Header,
    #[serde(default)]
    pub faces_data: Vec<FaceData>,
    #[serde(default)]
    pub error_data: Option<ErrorData>,
}

/// Coordinator -> console: show this image and these identity proposals to
/// an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyControlReq {
    pub header: Header,
    pub img_buff: String,
    pub image_control_objects: Vec<ImageControlObject>,
}

/// Operator decision on a [`NotifyControlReq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlCommand {
    /// Commit the (possibly edited) identifications.
    Submit,
    /// Discard the image silently.
    Cancel,
    /// Re-run recognition with operator-drawn face boxes.
    ProcessAgain,
}

/// Console -> coordinator: operator decision callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutControlReq {
    pub header: Header,
    pub command: ControlCommand,
    /// Confirmed/edited identifications; meaningful for `submit`.
    #[serde(default)]
    pub image_control_objects: Vec<ImageControlObject>,
    /// Operator-drawn boxes; meaningful for `process_again`.
    #[serde(default)]
    pub face_boxes: Vec<FaceBox>,
}

/// Identity half of an enrollment submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlObjectPart {
    pub control_object: ControlObject,
    /// How many reference images this enrollment will send.
    pub images_num: u64,
}

/// One enrollment photo, optionally with an operator-drawn face box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePart {
    pub img_buff: String,
    #[serde(default)]
    pub face_box: Option<FaceBox>,
}

/// Console -> coordinator: one piece of a multi-message enrollment session.
///
/// Carries either the identity part or one image part, never both. Repeated
/// messages under one session UUID are coalesced into a single session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddControlObjectReq {
    pub header: Header,
    #[serde(default)]
    pub control_object_part: Option<ControlObjectPart>,
    #[serde(default)]
    pub image_part: Option<ImagePart>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FacialFeaturesVector;

    #[test]
    fn ack_round_trip() {
        let ack = Ack::ok("http://127.0.0.1:8080", Uuid::new_v4());
        let json = serde_json::to_value(&ack).unwrap();
        assert!(json["error_data"].is_null());
        assert!(json["header"]["uuid"].is_string());
    }

    #[test]
    fn control_command_wire_names() {
        assert_eq!(
            serde_json::to_string(&ControlCommand::ProcessAgain).unwrap(),
            "\"process_again\""
        );
        let cmd: ControlCommand = serde_json::from_str("\"submit\"").unwrap();
        assert_eq!(cmd, ControlCommand::Submit);
    }

    #[test]
    fn faces_data_defaults() {
        let raw = format!(
            r#"{{"header": {{"src_addr": "http://worker:9000", "uuid": "{}"}}}}"#,
            Uuid::new_v4()
        );
        let req: PutFacesDataReq = serde_json::from_str(&raw).unwrap();
        assert!(req.faces_data.is_empty());
        assert!(req.error_data.is_none());
    }

    #[test]
    fn process_image_req_omits_empty_boxes() {
        let req = ProcessImageReq {
            header: Header {
                src_addr: "http://127.0.0.1:8080".into(),
                uuid: Uuid::new_v4(),
            },
            img_buff: "aGk=".into(),
            face_boxes: Vec::new(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("face_boxes").is_none());
    }

    #[test]
    fn faces_data_payload_parses() {
        let raw = format!(
            r#"{{
                "header": {{"src_addr": "http://worker:9000", "uuid": "{}"}},
                "faces_data": [
                    {{"face_box": [1, 2, 3, 4],
                      "facial_features_vector": [0.1, 0.2]}}
                ]
            }}"#,
            Uuid::new_v4()
        );
        let req: PutFacesDataReq = serde_json::from_str(&raw).unwrap();
        assert_eq!(req.faces_data.len(), 1);
        assert_eq!(req.faces_data[0].face_box, crate::types::FaceBox([1, 2, 3, 4]));
        let FacialFeaturesVector(ref v) = req.faces_data[0].facial_features_vector;
        assert_eq!(v.len(), 2);
    }
}
