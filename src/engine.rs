//! Engine Module
//!
//! The aggregation engine that coordinates all components.
//!
//! ## Responsibilities
//! - Own the shared state (clock, station store, persistence)
//! - Turn parsed requests into responses (PUT / GET semantics)
//! - Reload persisted stations on startup
//! - Start the expiry sweeper

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::clock::LamportClock;
use crate::config::Config;
use crate::error::{AggError, Result};
use crate::persistence::PersistenceManager;
use crate::protocol::{Method, Request, Response, StatusCode};
use crate::store::{StationFields, StationRecord, StationStore, UpsertOutcome};
use crate::sweeper::SweeperHandle;

/// The aggregation engine
///
/// One instance per server; shared with every connection as `Arc<Engine>`.
///
/// ## Concurrency Model
///
/// - **Clock**: a single atomic, updated on every request and response
/// - **Store**: sharded; updates to one station serialize on its shard
/// - **Persistence**: its own mutex, never held together with a shard lock
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Lamport clock shared by all connections
    clock: LamportClock,

    /// Current station records
    store: Arc<StationStore>,

    /// On-disk mirror of `store`
    persistence: PersistenceManager,
}

impl Engine {
    /// Open an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config and create the data directory if needed
    /// 2. Reload persisted stations (missing/corrupt file = empty)
    /// 3. Resume the clock from the largest persisted stamp
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let persistence = PersistenceManager::new(&config.data_dir);
        let store = StationStore::new(config.store_shards);

        let records = persistence.load();
        let restored = records.len();
        for record in records {
            store.restore(record);
        }

        let clock = LamportClock::starting_at(store.max_lamport_stamp());

        if restored > 0 {
            tracing::info!(
                "Restored {} stations from {} (clock={})",
                restored,
                persistence.path().display(),
                clock.current()
            );
        }

        Ok(Self {
            config,
            clock,
            store: Arc::new(store),
            persistence,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Handle one request from `origin`
    ///
    /// The clock observes the request's stamp first; the response carries a
    /// fresh tick.
    pub fn handle(&self, request: &Request, origin: &str) -> Response {
        let stamp = self.clock.observe(request.lamport_clock());

        let response = match &request.method {
            Method::Put => self.handle_put(request, stamp, origin),
            Method::Get => self.handle_get(request),
            Method::Other(method) => Response::text(
                StatusCode::BadRequest,
                &format!("Unsupported method: {}", method),
            ),
        };

        response.with_lamport_clock(self.clock.tick())
    }

    /// Build the response for a request that could not be parsed
    pub fn reject(&self, error: &AggError) -> Response {
        Response::text(status_for(error), &error.to_string()).with_lamport_clock(self.clock.tick())
    }

    /// Apply a station payload stamped with `stamp`
    ///
    /// The in-memory update stays in place even if persisting fails; the
    /// error is still returned so the caller can report it.
    pub fn put_station(&self, body: &[u8], stamp: u64, origin: &str) -> Result<UpsertOutcome> {
        let (station_id, fields) = parse_station_payload(body)?;
        let outcome = self.store.upsert(&station_id, fields, stamp, origin)?;

        if let Err(e) = self.persistence.persist(&self.store) {
            tracing::warn!(
                "Station {} updated in memory but not on disk: {}",
                station_id,
                e
            );
            return Err(e);
        }

        tracing::debug!("Station {} {:?} by {} at lamport {}", station_id, outcome, origin, stamp);
        Ok(outcome)
    }

    /// JSON array of station field maps, optionally for one station only
    pub fn render_stations(&self, station: Option<&str>) -> Result<Vec<u8>> {
        let records: Vec<Arc<StationRecord>> = match station {
            Some(id) => self.store.get(id).into_iter().collect(),
            None => self.store.snapshot(),
        };

        let fields: Vec<&StationFields> = records.iter().map(|record| &record.fields).collect();
        Ok(serde_json::to_vec(&fields)?)
    }

    /// Start the expiry sweeper for this engine's store
    pub fn start_sweeper(&self) -> Result<SweeperHandle> {
        SweeperHandle::spawn(
            Arc::clone(&self.store),
            self.config.station_ttl(),
            self.config.sweep_interval(),
        )
    }

    // =========================================================================
    // Request Handlers
    // =========================================================================

    fn handle_put(&self, request: &Request, stamp: u64, origin: &str) -> Response {
        if request.body.is_empty() {
            return Response::new(StatusCode::NoContent);
        }

        match self.put_station(&request.body, stamp, origin) {
            Ok(UpsertOutcome::Created) => Response::new(StatusCode::Created),
            Ok(UpsertOutcome::Updated) => Response::new(StatusCode::Ok),
            Err(e) => {
                tracing::debug!("PUT from {} rejected: {}", origin, e);
                Response::text(status_for(&e), &e.to_string())
            }
        }
    }

    fn handle_get(&self, request: &Request) -> Response {
        match self.render_stations(request.station_filter()) {
            Ok(body) => Response::json(StatusCode::Ok, body),
            Err(e) => {
                tracing::warn!("Failed to render stations: {}", e);
                Response::text(StatusCode::InternalServerError, &e.to_string())
            }
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the Lamport clock
    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    /// Get the station store
    pub fn store(&self) -> &StationStore {
        &self.store
    }

    /// Get the persistence manager
    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Status code reported for an error
///
/// Invalid JSON is reported as 500, not 400.
pub fn status_for(error: &AggError) -> StatusCode {
    match error {
        AggError::MissingStationId | AggError::MalformedRequest(_) => StatusCode::BadRequest,
        _ => StatusCode::InternalServerError,
    }
}

/// Validate a PUT body: a flat JSON object with a non-empty string `id`
pub fn parse_station_payload(body: &[u8]) -> Result<(String, StationFields)> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AggError::Payload(format!("invalid JSON: {}", e)))?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(AggError::Payload(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )))
        }
    };

    if let Some((name, value)) = fields
        .iter()
        .find(|(_, value)| value.is_object() || value.is_array())
    {
        return Err(AggError::Payload(format!(
            "field {:?} is {}, only scalar fields are allowed",
            name,
            json_kind(value)
        )));
    }

    let station_id = match fields.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => return Err(AggError::MissingStationId),
    };

    Ok((station_id, fields))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
