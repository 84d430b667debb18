//! Request definitions
//!
//! Represents requests from content servers and clients.

use bytes::Bytes;

use crate::error::{AggError, Result};
use super::{CONTENT_LENGTH_HEADER, LAMPORT_CLOCK_HEADER};

/// Path prefix under which the last segment names a station
const STATION_PATH_PREFIX: &str = "/weather.json/";

/// Query parameters that name a station
const STATION_QUERY_PARAMS: [&str; 2] = ["id", "stationId"];

/// Request methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,

    /// Anything else; rejected by the dispatcher, not by the parser
    Other(String),
}

impl Method {
    /// Parse a method token (case-sensitive)
    pub fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "PUT" => Method::Put,
            other => Method::Other(other.to_string()),
        }
    }

    /// The wire token for this method
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Other(token) => token,
        }
    }
}

/// Header block with case-insensitive, unique names
///
/// Insertion order is kept so encoded messages are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Look up a header value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Remove a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared body length; absent means 0
    pub fn content_length(&self) -> Result<usize> {
        match self.get(CONTENT_LENGTH_HEADER) {
            None => Ok(0),
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                AggError::MalformedRequest(format!("invalid Content-Length: {:?}", raw))
            }),
        }
    }

    /// Sender's Lamport clock; absent or unparseable means 0
    pub fn lamport_clock(&self) -> u64 {
        self.get(LAMPORT_CLOCK_HEADER)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// First line of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub path: String,
    pub version: String,
}

/// A parsed request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    /// Assemble a request from its parsed parts
    pub fn new(line: RequestLine, headers: Headers, body: Bytes) -> Self {
        Self {
            method: line.method,
            path: line.path,
            version: line.version,
            headers,
            body,
        }
    }

    /// Build a GET request for the given path
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            version: super::HTTP_VERSION.to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Build a PUT request carrying the given body
    pub fn put(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            version: super::HTTP_VERSION.to_string(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Attach a Lamport-Clock header
    pub fn with_lamport_clock(mut self, clock: u64) -> Self {
        self.headers.insert(LAMPORT_CLOCK_HEADER, clock.to_string());
        self
    }

    /// Sender's Lamport clock (0 when absent)
    pub fn lamport_clock(&self) -> u64 {
        self.headers.lamport_clock()
    }

    /// Station id the request is scoped to, if any
    ///
    /// `/weather.json/IDS1`, `?id=IDS1` and `?stationId=IDS1` address
    /// station `IDS1`. Every other path addresses the whole store.
    pub fn station_filter(&self) -> Option<&str> {
        let (path, query) = match self.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path.as_str(), None),
        };

        let from_path = path
            .strip_prefix(STATION_PATH_PREFIX)
            .map(|rest| rest.trim_matches('/'))
            .filter(|id| !id.is_empty());

        from_path.or_else(|| {
            query?
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(name, _)| STATION_QUERY_PARAMS.contains(name))
                .map(|(_, value)| value)
                .filter(|id| !id.is_empty())
        })
    }
}
