//! Connection Handler
//!
//! Drives one client connection through the request state machine.
//!
//! ## States
//! ```text
//! AwaitingRequestLine ─► AwaitingHeaders ─► AwaitingBody ─► Dispatch ─► RespondAndClose
//!          │                    │           (len > 0)  │                      ▲
//!          │                    └─────────(len == 0)───┼──► Dispatch          │
//!          └── parse error ─────────────────────────────────────────── 400 ───┘
//!          └── EOF / reset / timeout / short body ──► Closed (no response)
//! ```

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::engine::Engine;
use crate::error::{AggError, Result};
use crate::protocol::{
    read_body, read_headers, read_request_line, write_response, Headers, Request, RequestLine,
    Response,
};

/// Position in the per-connection protocol
#[derive(Debug)]
enum State {
    AwaitingRequestLine,
    AwaitingHeaders(RequestLine),
    AwaitingBody(RequestLine, Headers, usize),
    Dispatch(Request),
    RespondAndClose(Response),
    Closed,
}

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the aggregation engine
    engine: Arc<Engine>,

    /// Peer address for logging and record origin
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O on a blocking socket
    pub fn new(stream: TcpStream, engine: Arc<Engine>) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Accepted sockets may inherit the listener's non-blocking mode
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Serves exactly one request, then closes.
    pub fn handle(&mut self) -> Result<()> {
        let mut state = State::AwaitingRequestLine;

        loop {
            state = match state {
                State::AwaitingRequestLine => match read_request_line(&mut self.reader) {
                    Ok(Some(line)) => State::AwaitingHeaders(line),
                    Ok(None) => {
                        tracing::debug!("Client {} closed without a request", self.peer_addr);
                        State::Closed
                    }
                    Err(e) => self.on_read_error(e),
                },

                State::AwaitingHeaders(line) => {
                    match read_headers(&mut self.reader)
                        .and_then(|headers| Ok((headers.content_length()?, headers)))
                    {
                        Ok((0, headers)) => State::Dispatch(Request::new(line, headers, Bytes::new())),
                        Ok((len, headers)) => State::AwaitingBody(line, headers, len),
                        Err(e) => self.on_read_error(e),
                    }
                }

                State::AwaitingBody(line, headers, len) => match read_body(&mut self.reader, len) {
                    Ok(body) => State::Dispatch(Request::new(line, headers, body)),
                    Err(e) => self.on_read_error(e),
                },

                State::Dispatch(request) => {
                    tracing::trace!(
                        "{} {} from {} ({} body bytes)",
                        request.method.as_str(),
                        request.path,
                        self.peer_addr,
                        request.body.len()
                    );
                    State::RespondAndClose(self.engine.handle(&request, &self.peer_addr))
                }

                State::RespondAndClose(response) => {
                    self.send_response(&response)?;
                    State::Closed
                }

                State::Closed => return Ok(()),
            };
        }
    }

    /// Decide what a failed read leads to
    ///
    /// Gone or silent peers get nothing; anything else gets an error
    /// response.
    fn on_read_error(&self, error: AggError) -> State {
        if error.is_disconnect() {
            tracing::debug!("Dropping connection from {}: {}", self.peer_addr, error);
            State::Closed
        } else {
            tracing::warn!("Bad request from {}: {}", self.peer_addr, error);
            State::RespondAndClose(self.engine.reject(&error))
        }
    }

    /// Send a response to the client
    fn send_response(&mut self, response: &Response) -> Result<()> {
        match write_response(&mut self.writer, response) {
            Ok(()) => Ok(()),
            Err(e) if e.is_disconnect() => {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
