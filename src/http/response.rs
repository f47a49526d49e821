//! HTTP response building module
//!
//! `ResponseWriter` is the sink a handler writes into. It enforces a
//! write-once contract: headers can only change before anything is sent and
//! nothing can be written after `end`. The dispatcher turns the writer into
//! the actual hyper response once the handler returns.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;

use crate::error::message_for;

/// Misuse of a `ResponseWriter`
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("Response has already ended")]
    AlreadyEnded,
    #[error("Cannot change status or headers after they are sent")]
    HeadersSent,
    #[error("Invalid header '{0}'")]
    InvalidHeader(String),
    #[error("Failed to serialize JSON body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Response under construction by a handler
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    head_sent: bool,
    ended: bool,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            head_sent: false,
            ended: false,
        }
    }

    /// Set the status code (before the head is sent)
    pub fn status(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.ensure_head_open()?;
        self.status = status;
        Ok(())
    }

    /// Set or replace a header (before the head is sent)
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ResponseError> {
        self.ensure_head_open()?;
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ResponseError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| ResponseError::InvalidHeader(name.to_string()))?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    /// Set status and headers in one call and mark the head as sent
    pub fn write_head(
        &mut self,
        status: StatusCode,
        headers: &[(&str, &str)],
    ) -> Result<(), ResponseError> {
        self.status(status)?;
        for (name, value) in headers {
            self.set_header(name, value)?;
        }
        self.head_sent = true;
        Ok(())
    }

    /// Append a chunk to the body; sends the head implicitly
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) -> Result<(), ResponseError> {
        if self.ended {
            return Err(ResponseError::AlreadyEnded);
        }
        self.head_sent = true;
        self.body.extend_from_slice(chunk.as_ref());
        Ok(())
    }

    /// Write the final chunk and close the response
    pub fn end(&mut self, chunk: impl AsRef<[u8]>) -> Result<(), ResponseError> {
        self.write(chunk)?;
        self.ended = true;
        Ok(())
    }

    /// Serialize `value` as the JSON body and close the response
    ///
    /// Sets `Content-Type: application/json` unless the head is already out.
    pub fn end_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), ResponseError> {
        let json = serde_json::to_string(value)?;
        if !self.head_sent {
            self.set_header(CONTENT_TYPE.as_str(), "application/json")?;
        }
        self.end(json)
    }

    pub const fn is_ended(&self) -> bool {
        self.ended
    }

    /// Whether anything (head or body) has been emitted
    pub const fn has_written(&self) -> bool {
        self.head_sent || self.ended
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    const fn ensure_head_open(&self) -> Result<(), ResponseError> {
        if self.head_sent {
            Err(ResponseError::HeadersSent)
        } else {
            Ok(())
        }
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the fixed JSON error response for a status
pub fn build_error_response(status: StatusCode) -> Response<Full<Bytes>> {
    let message = message_for(status);
    let body = serde_json::to_string(message).unwrap_or_else(|_| format!("\"{message}\""));

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(status: StatusCode, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
