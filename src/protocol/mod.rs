//! Protocol Module
//!
//! Defines the HTTP-shaped wire protocol between content servers, clients
//! and the aggregation server. Only the framing needed to drive the
//! server is supported: one request per connection, no chunking.
//!
//! ## Request Format
//! ```text
//! PUT /weather.json HTTP/1.1\r\n
//! Content-Length: 33\r\n
//! Lamport-Clock: 7\r\n
//! \r\n
//! {"id":"IDS1","air_temp":13.3}
//! ```
//!
//! ## Response Format
//! ```text
//! HTTP/1.1 201 Created\r\n
//! Lamport-Clock: 9\r\n
//! Content-Length: 0\r\n
//! \r\n
//! ```
//!
//! ### Recognized Headers
//! - `Content-Length`: body size in bytes (default 0)
//! - `Lamport-Clock`: sender's logical clock (default 0)

mod request;
mod response;
mod codec;

pub use request::{Headers, Method, Request, RequestLine};
pub use response::{Response, StatusCode};
pub use codec::{
    encode_request, encode_response, read_body, read_headers, read_request,
    read_request_line, read_response, write_request, write_response, HTTP_VERSION,
    MAX_BODY_SIZE, MAX_LINE_LEN,
};

/// Header carrying the sender's Lamport clock
pub const LAMPORT_CLOCK_HEADER: &str = "Lamport-Clock";

/// Header carrying the body length
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";

/// Header carrying the body media type
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
