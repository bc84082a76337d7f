//! Request validation shared by the five handlers.
//!
//! Bodies are read as raw bytes and parsed here so a malformed request
//! produces the wire envelope with the right error code instead of a
//! framework rejection. Method checking also lives here: routes accept any
//! method and a wrong one yields 400 with code −1, which is what peers
//! expect.

use axum::http::Method;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use serde::de::DeserializeOwned;

use facelink_core::proto::{ErrorData, CORRUPTED_BODY, INVALID_REQUEST_METHOD};

/// Every coordinator endpoint speaks PUT.
pub fn require_put(method: &Method) -> Result<(), ErrorData> {
    if method == Method::PUT {
        Ok(())
    } else {
        Err(ErrorData::new(
            INVALID_REQUEST_METHOD,
            "invalid request method",
            format!("expected \"PUT\", got \"{method}\""),
        ))
    }
}

/// Parse a JSON body into the expected request shape.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ErrorData> {
    serde_json::from_slice(body)
        .map_err(|e| ErrorData::new(CORRUPTED_BODY, "corrupted request body", e.to_string()))
}

/// Decode a base64 image buffer and check its magic bytes.
///
/// Only PNG, JPEG and BMP are accepted; everything else is a corrupted
/// body as far as peers are concerned.
pub fn decode_image(img_buff: &str) -> Result<Vec<u8>, ErrorData> {
    let bytes = BASE64
        .decode(img_buff)
        .map_err(|e| ErrorData::new(CORRUPTED_BODY, "corrupted request body", e.to_string()))?;

    match image::guess_format(&bytes) {
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Bmp) => Ok(bytes),
        Ok(other) => Err(ErrorData::new(
            CORRUPTED_BODY,
            "corrupted request body",
            format!("unsupported image format {other:?}"),
        )),
        Err(_) => Err(ErrorData::new(
            CORRUPTED_BODY,
            "corrupted request body",
            "unable to recognize image type",
        )),
    }
}
