//! Protocol codec
//!
//! Line-oriented parsing and encoding for the wire protocol.
//!
//! ## Parse Steps
//! ```text
//! read_request_line ──► read_headers ──► read_body (Content-Length > 0)
//! ```
//! Each step maps to one state of the connection state machine, so the
//! connection can tell which phase a failure happened in.

use std::io::{BufRead, ErrorKind, Read, Write};

use bytes::Bytes;

use crate::error::{AggError, Result};
use super::{
    Headers, Method, Request, RequestLine, Response, StatusCode, CONTENT_LENGTH_HEADER,
};

/// Version token written on every outgoing message
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Longest accepted request, status or header line (8 KB)
pub const MAX_LINE_LEN: usize = 8 * 1024;

/// Largest accepted body (16 MB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// Most header lines accepted in one message
const MAX_HEADERS: usize = 128;

// =============================================================================
// Request Parsing
// =============================================================================

/// Read and parse the request line
///
/// Returns `Ok(None)` if the peer closed the connection before sending
/// anything.
pub fn read_request_line<R: BufRead>(reader: &mut R) -> Result<Option<RequestLine>> {
    let line = match read_line(reader)? {
        Some(line) => line,
        None => return Ok(None),
    };

    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version), None) => Ok(Some(RequestLine {
            method: Method::parse(method),
            path: path.to_string(),
            version: version.to_string(),
        })),
        _ => Err(AggError::MalformedRequest(format!(
            "invalid request line: {:?}",
            line
        ))),
    }
}

/// Read header lines up to and including the blank separator line
///
/// Lines without a `name: value` shape are skipped.
pub fn read_headers<R: BufRead>(reader: &mut R) -> Result<Headers> {
    let mut headers = Headers::new();
    let mut count = 0usize;

    loop {
        let line = read_line(reader)?.ok_or_else(|| {
            AggError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed inside header block",
            ))
        })?;

        if line.is_empty() {
            return Ok(headers);
        }

        count += 1;
        if count > MAX_HEADERS {
            return Err(AggError::MalformedRequest(format!(
                "more than {} header lines",
                MAX_HEADERS
            )));
        }

        match parse_header_line(&line) {
            Some((name, value)) => headers.insert(name, value),
            None => tracing::debug!("Skipping malformed header line: {:?}", line),
        }
    }
}

/// Read exactly `len` body bytes
///
/// Fails with `TruncatedBody` if the peer hangs up early.
pub fn read_body<R: Read>(reader: &mut R, len: usize) -> Result<Bytes> {
    if len > MAX_BODY_SIZE {
        return Err(AggError::MalformedRequest(format!(
            "body too large: {} bytes (max {})",
            len, MAX_BODY_SIZE
        )));
    }

    let mut body = vec![0u8; len];
    let mut received = 0;

    while received < len {
        match reader.read(&mut body[received..]) {
            Ok(0) => {
                return Err(AggError::TruncatedBody {
                    expected: len,
                    received,
                })
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Bytes::from(body))
}

/// Read a complete request (line, headers, body)
///
/// Returns `Ok(None)` if the peer closed the connection before sending
/// anything.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Option<Request>> {
    let line = match read_request_line(reader)? {
        Some(line) => line,
        None => return Ok(None),
    };

    let headers = read_headers(reader)?;
    let body = read_body(reader, headers.content_length()?)?;

    Ok(Some(Request::new(line, headers, body)))
}

// =============================================================================
// Response Parsing (client side)
// =============================================================================

/// Read a complete response from a stream
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let line = read_line(reader)
        .map_err(|e| match e {
            AggError::MalformedRequest(msg) => AggError::MalformedResponse(msg),
            other => other,
        })?
        .ok_or_else(|| {
            AggError::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed before status line",
            ))
        })?;

    let mut parts = line.splitn(3, ' ');
    let _version = parts.next();
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(StatusCode::from_code)
        .ok_or_else(|| AggError::MalformedResponse(format!("invalid status line: {:?}", line)))?;

    let mut headers = read_headers(reader)?;
    let len = headers
        .content_length()
        .map_err(|e| AggError::MalformedResponse(e.to_string()))?;
    headers.remove(CONTENT_LENGTH_HEADER);
    let body = read_body(reader, len)?;

    Ok(Response {
        status,
        headers,
        body,
    })
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut message = Vec::with_capacity(128 + request.body.len());
    message.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            request.method.as_str(),
            request.path,
            request.version
        )
        .as_bytes(),
    );
    encode_headers(&mut message, &request.headers, request.body.len());
    message.extend_from_slice(&request.body);
    message
}

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut message = Vec::with_capacity(128 + response.body.len());
    message.extend_from_slice(
        format!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            response.status.code(),
            response.status.reason()
        )
        .as_bytes(),
    );
    encode_headers(&mut message, &response.headers, response.body.len());
    message.extend_from_slice(&response.body);
    message
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    writer.write_all(&encode_request(request))?;
    writer.flush()?;
    Ok(())
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

/// Header block with a Content-Length computed from the real body
fn encode_headers(message: &mut Vec<u8>, headers: &Headers, body_len: usize) {
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
            continue;
        }
        message.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    message.extend_from_slice(format!("{}: {}\r\n\r\n", CONTENT_LENGTH_HEADER, body_len).as_bytes());
}

/// Split `Name: value`; None for anything else
fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();

    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    Some((name, value.trim()))
}

/// Read one CRLF- or LF-terminated line without its terminator
///
/// `Ok(None)` means clean EOF before any byte. EOF in the middle of a line
/// is reported as `UnexpectedEof`.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64 + 2)
        .read_until(b'\n', &mut buf)?;

    if read == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&b'\n') {
        if buf.len() > MAX_LINE_LEN {
            return Err(AggError::MalformedRequest(format!(
                "line longer than {} bytes",
                MAX_LINE_LEN
            )));
        }
        return Err(AggError::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            "connection closed mid-line",
        )));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    if buf.len() > MAX_LINE_LEN {
        return Err(AggError::MalformedRequest(format!(
            "line longer than {} bytes",
            MAX_LINE_LEN
        )));
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| AggError::MalformedRequest("line is not valid UTF-8".to_string()))
}
