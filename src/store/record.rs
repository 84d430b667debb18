//! Station record model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schemaless field map of a station (JSON scalars keep their type)
pub type StationFields = Map<String, Value>;

/// One published version of a station's state
///
/// Never mutated once it is in the store; see [`StationRecord::merged`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// Stable station key (mirrors the `id` field of the payload)
    pub station_id: String,

    /// Latest known value for every field ever reported
    pub fields: StationFields,

    /// Lamport clock value of the last accepted update
    pub lamport_stamp: u64,

    /// Ingestion time of the last accepted update (unix millis)
    pub last_seen: u64,

    /// Peer that contributed the last accepted update
    pub origin: String,
}

impl StationRecord {
    /// First version of a station
    pub fn new(
        station_id: impl Into<String>,
        fields: StationFields,
        lamport_stamp: u64,
        last_seen: u64,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            fields,
            lamport_stamp,
            last_seen,
            origin: origin.into(),
        }
    }

    /// Next version: incoming fields overwrite same-named ones, the rest are
    /// kept. The stamp never moves backwards.
    pub fn merged(&self, fields: StationFields, lamport_stamp: u64, last_seen: u64, origin: &str) -> Self {
        let mut merged = self.fields.clone();
        merged.extend(fields);

        Self {
            station_id: self.station_id.clone(),
            fields: merged,
            lamport_stamp: self.lamport_stamp.max(lamport_stamp),
            last_seen,
            origin: origin.to_string(),
        }
    }

    /// Whether the record has outlived `ttl_ms` at time `now`
    pub fn is_stale(&self, now: u64, ttl_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) > ttl_ms
    }
}
