//! Codec Tests
//!
//! Tests for request/response encoding and the client-side readers.

use std::io::Cursor;

use weather_aggregator::protocol::{
    encode_request, encode_response, read_request, read_response, write_request,
    write_response, Method, Request, Response, StatusCode,
};
use weather_aggregator::AggError;

// =============================================================================
// Response Encoding Tests
// =============================================================================

#[test]
fn test_encode_created_response() {
    let response = Response::new(StatusCode::Created).with_lamport_clock(7);
    let encoded = encode_response(&response);

    assert_eq!(
        String::from_utf8(encoded).unwrap(),
        "HTTP/1.1 201 Created\r\nLamport-Clock: 7\r\nContent-Length: 0\r\n\r\n"
    );
}

#[test]
fn test_encode_json_response() {
    let response = Response::json(StatusCode::Ok, b"[]".to_vec()).with_lamport_clock(3);
    let text = String::from_utf8(encode_response(&response)).unwrap();

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Type: application/json\r\n"));
    assert!(text.contains("Lamport-Clock: 3\r\n"));
    assert!(text.contains("Content-Length: 2\r\n"));
    assert!(text.ends_with("\r\n\r\n[]"));
}

#[test]
fn test_status_reason_phrases() {
    assert_eq!(StatusCode::Ok.reason(), "OK");
    assert_eq!(StatusCode::Created.reason(), "Created");
    assert_eq!(StatusCode::NoContent.reason(), "No Content");
    assert_eq!(StatusCode::BadRequest.reason(), "Bad Request");
    assert_eq!(StatusCode::InternalServerError.reason(), "Internal Server Error");
}

#[test]
fn test_status_from_code() {
    for status in [
        StatusCode::Ok,
        StatusCode::Created,
        StatusCode::NoContent,
        StatusCode::BadRequest,
        StatusCode::InternalServerError,
    ] {
        assert_eq!(StatusCode::from_code(status.code()), Some(status));
    }
    assert_eq!(StatusCode::from_code(404), None);
}

// =============================================================================
// Response Decoding Tests
// =============================================================================

#[test]
fn test_read_response_with_body() {
    let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nLamport-Clock: 12\r\nContent-Length: 15\r\n\r\n[{\"id\":\"IDS1\"}]".to_vec();
    let response = read_response(&mut Cursor::new(raw)).unwrap();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.lamport_clock(), Some(12));
    assert_eq!(response.headers.get("content-type"), Some("application/json"));
    assert_eq!(response.headers.get("Content-Length"), None);
    assert_eq!(&response.body[..], b"[{\"id\":\"IDS1\"}]");
}

#[test]
fn test_read_response_unknown_status_is_malformed() {
    let raw = b"HTTP/1.1 418 I'm a teapot\r\n\r\n".to_vec();
    let result = read_response(&mut Cursor::new(raw));
    assert!(matches!(result, Err(AggError::MalformedResponse(_))));
}

#[test]
fn test_read_response_on_closed_stream_is_disconnect() {
    let err = read_response(&mut Cursor::new(Vec::new())).unwrap_err();
    assert!(err.is_disconnect());
}

#[test]
fn test_written_response_reads_back() {
    let response = Response::text(StatusCode::BadRequest, "Station ID is missing").with_lamport_clock(5);

    let mut buffer = Vec::new();
    write_response(&mut buffer, &response).unwrap();
    let decoded = read_response(&mut Cursor::new(buffer)).unwrap();

    assert_eq!(decoded.status, StatusCode::BadRequest);
    assert_eq!(decoded.lamport_clock(), Some(5));
    assert_eq!(decoded.headers.get("Content-Type"), Some("text/plain"));
    assert_eq!(&decoded.body[..], b"Station ID is missing");
}

// =============================================================================
// Request Encoding Tests
// =============================================================================

#[test]
fn test_encode_put_request() {
    let request = Request::put("/weather.json", r#"{"id":"A"}"#).with_lamport_clock(2);
    let text = String::from_utf8(encode_request(&request)).unwrap();

    assert_eq!(
        text,
        "PUT /weather.json HTTP/1.1\r\nLamport-Clock: 2\r\nContent-Length: 10\r\n\r\n{\"id\":\"A\"}"
    );
}

#[test]
fn test_encode_ignores_stale_content_length_header() {
    let mut request = Request::put("/", "abc");
    request.headers.insert("Content-Length", "999");

    let text = String::from_utf8(encode_request(&request)).unwrap();
    assert!(text.contains("Content-Length: 3\r\n"));
    assert!(!text.contains("999"));
}

#[test]
fn test_written_request_parses_back() {
    let request = Request::put("/weather.json", r#"{"id":"IDS1","air_temp":13.3}"#)
        .with_lamport_clock(40);

    let mut buffer = Vec::new();
    write_request(&mut buffer, &request).unwrap();
    let parsed = read_request(&mut Cursor::new(buffer)).unwrap().unwrap();

    assert_eq!(parsed.method, Method::Put);
    assert_eq!(parsed.path, "/weather.json");
    assert_eq!(parsed.lamport_clock(), 40);
    assert_eq!(parsed.body, request.body);
}
