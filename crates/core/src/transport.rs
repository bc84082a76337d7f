//! Outbound `PUT <json>` transport shared by both schedulers.
//!
//! TCP peers are reached through one shared [`reqwest::Client`] (connection
//! pooling, per-call timeout). `unix://` peers get a per-request HTTP/1.1
//! handshake over a [`tokio::net::UnixStream`]; those calls are wrapped in
//! the same timeout.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::Serialize;

use crate::peer::PeerAddr;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("peer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unix socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("HTTP/1.1 error on unix socket: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("invalid outbound request: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("unable to serialize request body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Shared outbound HTTP client for worker and console peers.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout_ms: u64) -> Result<Self, TransportError> {
        let timeout = Duration::from_millis(timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// PUT `body` as JSON to `peer` at `endpoint` (e.g. `/api/v1/notify_control`).
    ///
    /// A non-2xx status is an error; the response body is ignored otherwise.
    pub async fn put_json<T: Serialize>(
        &self,
        peer: &PeerAddr,
        endpoint: &str,
        body: &T,
    ) -> Result<(), TransportError> {
        match peer {
            PeerAddr::Http(base) => self.put_tcp(base, endpoint, body).await,
            PeerAddr::Unix(path) => {
                let payload = serde_json::to_vec(body)?;
                match tokio::time::timeout(self.timeout, put_unix(path, endpoint, payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(self.timeout)),
                }
            }
        }
    }

    async fn put_tcp<T: Serialize>(
        &self,
        base: &str,
        endpoint: &str,
        body: &T,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .put(format!("{base}{endpoint}"))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// One-shot HTTP/1.1 PUT over a Unix domain socket.
async fn put_unix(path: &Path, endpoint: &str, payload: Vec<u8>) -> Result<(), TransportError> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // The connection task finishes when the request completes or the peer
    // hangs up; either way its error only matters to the in-flight request.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "unix socket connection closed with error");
        }
    });

    let request = hyper::Request::builder()
        .method(hyper::Method::PUT)
        .uri(endpoint)
        .header(hyper::header::HOST, "localhost")
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(payload)))?;

    let response = sender.send_request(request).await?;
    let status = response.status();
    if !status.is_success() {
        let body = match response.into_body().collect().await {
            Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).into_owned(),
            Err(_) => "<unreadable body>".to_string(),
        };
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}
