//! Response definitions
//!
//! Represents responses to content servers and clients.

use bytes::Bytes;

use super::{Headers, CONTENT_TYPE_HEADER, LAMPORT_CLOCK_HEADER};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    NoContent = 204,
    BadRequest = 400,
    InternalServerError = 500,
}

impl StatusCode {
    /// Numeric code
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Reason phrase written after the code
    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(StatusCode::Ok),
            201 => Some(StatusCode::Created),
            204 => Some(StatusCode::NoContent),
            400 => Some(StatusCode::BadRequest),
            500 => Some(StatusCode::InternalServerError),
            _ => None,
        }
    }
}

/// A response to send to a peer
#[derive(Debug, Clone)]
pub struct Response {
    /// Status code
    pub status: StatusCode,

    /// Headers other than Content-Length (computed when encoding)
    pub headers: Headers,

    /// Body bytes (JSON for GET, a short message for errors)
    pub body: Bytes,
}

impl Response {
    /// Create an empty response with the given status
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Create a response carrying a JSON body
    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(CONTENT_TYPE_HEADER, "application/json");
        response.body = body.into();
        response
    }

    /// Create a response carrying a plain-text message
    pub fn text(status: StatusCode, message: &str) -> Self {
        let mut response = Self::new(status);
        response.headers.insert(CONTENT_TYPE_HEADER, "text/plain");
        response.body = Bytes::copy_from_slice(message.as_bytes());
        response
    }

    /// Stamp the response with the server's Lamport clock
    pub fn with_lamport_clock(mut self, clock: u64) -> Self {
        self.headers.insert(LAMPORT_CLOCK_HEADER, clock.to_string());
        self
    }

    /// The Lamport clock carried by this response, if any
    pub fn lamport_clock(&self) -> Option<u64> {
        self.headers
            .get(LAMPORT_CLOCK_HEADER)
            .and_then(|raw| raw.trim().parse().ok())
    }
}
