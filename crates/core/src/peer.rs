//! Peer base-URL model for workers and consoles.
//!
//! Two transports exist on the wire: plain HTTP(S) over TCP, and HTTP/1.1
//! over a Unix domain socket requested with a `unix://` prefix. The
//! historical UNIX encoding uses `.` as the path separator
//! (`unix://tmp.facelink.panel.sock` means `/tmp/facelink/panel.sock`);
//! the plain form `unix:///tmp/facelink/panel.sock` is also accepted.

use std::fmt;
use std::path::PathBuf;

/// A parsed peer base address, ready to have an endpoint path appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddr {
    /// `http://` or `https://` base URL, no trailing slash.
    Http(String),
    /// Absolute path to a Unix domain socket.
    Unix(PathBuf),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeerAddrError {
    #[error("peer address is empty")]
    Empty,
    #[error("peer address \"{0}\" has an unsupported scheme (expected http://, https:// or unix://)")]
    UnsupportedScheme(String),
    #[error("unix peer address \"{0}\" does not name a socket")]
    EmptySocketPath(String),
}

impl PeerAddr {
    /// Parse a configured or wire-supplied peer address.
    pub fn parse(raw: &str) -> Result<Self, PeerAddrError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(PeerAddrError::Empty);
        }

        if let Some(rest) = trimmed.strip_prefix("unix://") {
            if rest.is_empty() {
                return Err(PeerAddrError::EmptySocketPath(raw.to_string()));
            }
            // Plain absolute path, or the dotted historical encoding.
            let path = if let Some(abs) = rest.strip_prefix('/') {
                PathBuf::from(format!("/{abs}"))
            } else {
                PathBuf::from(format!("/{}", rest.replace('.', "/")))
            };
            return Ok(PeerAddr::Unix(path));
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(PeerAddr::Http(trimmed.to_string()));
        }

        Err(PeerAddrError::UnsupportedScheme(raw.to_string()))
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerAddr::Http(base) => f.write_str(base),
            PeerAddr::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
