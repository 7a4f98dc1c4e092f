// src/server/protocol.rs - One-request-per-connection text protocol
//!
//! A request is a short ASCII payload; only its final line counts. A reply is
//! either one of three fixed status lines or, for `status`, the bare current
//! instruction value.

use crate::motion::Command;
use thiserror::Error;

/// Largest payload read from a connection.
pub const MAX_REQUEST_BYTES: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    Status,
    Instruct(Command),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty request")]
    Empty,
    #[error("request is not valid UTF-8")]
    NotUtf8,
    #[error("unknown request '{0}'")]
    Unknown(String),
    #[error("timed out waiting for request")]
    Timeout,
}

/// Parse a raw payload.
pub fn parse_request(payload: &[u8]) -> Result<Request, ProtocolError> {
    let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::NotUtf8)?;
    let line = text.rsplit('\n').next().unwrap_or_default();
    let line = line.strip_suffix('\r').unwrap_or(line);

    match line {
        "" => Err(ProtocolError::Empty),
        "status" => Ok(Request::Status),
        other => other
            .parse::<Command>()
            .map(Request::Instruct)
            .map_err(|_| ProtocolError::Unknown(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Current instruction value, sent without a status line.
    Status(String),
    Accepted,
    NotModified,
    BadRequest,
}

impl Reply {
    pub fn to_wire(&self) -> String {
        match self {
            Reply::Status(value) => value.clone(),
            Reply::Accepted => r#"HTTP/1.1 "204 No Content""#.to_string(),
            Reply::NotModified => r#"HTTP/1.1 "304 Not Modified""#.to_string(),
            Reply::BadRequest => r#"HTTP/1.1 "400 Bad Request""#.to_string(),
        }
    }
}
