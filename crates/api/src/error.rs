//! Handler-facing error type rendering the acknowledgement envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use facelink_core::proto::{Ack, ErrorData, Header};

use crate::state::AppState;

/// A validation or enqueue failure that short-circuits a handler.
///
/// Renders as the standard envelope: the coordinator's own `src_addr`, the
/// request UUID when it is known by the time of the failure, and the
/// structured error-data payload.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub src_addr: String,
    pub uuid: Option<Uuid>,
    pub error: ErrorData,
}

impl ApiError {
    /// 400 with the given error-data (invalid method, corrupted body).
    pub fn bad_request(state: &AppState, uuid: Option<Uuid>, error: ErrorData) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            src_addr: state.src_addr.clone(),
            uuid,
            error,
        }
    }

    /// 500 with the given error-data (enqueue failure).
    pub fn internal(state: &AppState, uuid: Option<Uuid>, error: ErrorData) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            src_addr: state.src_addr.clone(),
            uuid,
            error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(
            status = %self.status,
            code = self.error.code,
            info = %self.error.info,
            text = %self.error.text,
            "request rejected"
        );
        let ack = Ack {
            header: Header {
                src_addr: self.src_addr,
                uuid: self.uuid.unwrap_or_else(Uuid::nil),
            },
            error_data: Some(self.error),
        };
        (self.status, Json(ack)).into_response()
    }
}
