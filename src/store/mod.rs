//! Store Module
//!
//! In-memory station state shared by every connection.
//!
//! ## Responsibilities
//! - Insert-or-merge updates per station id
//! - Consistent snapshots for GET without a global lock
//! - Race-free expiry of stations that stop reporting
//!
//! ## Data Structure Choice
//! A fixed number of shards, each a `HashMap` behind its own `RwLock`:
//! - Updates to different stations rarely contend
//! - Records are `Arc<StationRecord>` and never mutated after publication;
//!   an update swaps in a new `Arc`, so readers holding the old one are
//!   unaffected

mod record;
mod station_store;

pub use record::{StationRecord, StationFields};
pub use station_store::{StationStore, UpsertOutcome};

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AggError, Result};

/// Wall-clock time in unix milliseconds (ingestion timestamps)
pub fn now_millis() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| AggError::SystemTime(e.to_string()))
}
