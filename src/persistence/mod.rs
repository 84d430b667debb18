//! Persistence Module
//!
//! Mirrors the station store to a single JSON file.
//!
//! ## Responsibilities
//! - Rewrite the whole file after every accepted PUT
//! - Never leave a half-written final file (write temp, fsync, rename)
//! - Reload the file at startup; missing or unreadable means empty
//!
//! ## File Format
//! ```text
//! {
//!   "IDS60901": {
//!     "station_id": "IDS60901",
//!     "fields": { "id": "IDS60901", "air_temp": 13.3, ... },
//!     "lamport_stamp": 12,
//!     "last_seen": 1760870000000,
//!     "origin": "127.0.0.1:53122"
//!   },
//!   ...
//! }
//! ```

mod manager;

pub use manager::PersistenceManager;

/// Final file name inside the data directory
pub const DATA_FILENAME: &str = "weather_data.json";

/// Temporary file name used while a write is in flight
pub const TEMP_FILENAME: &str = "weather_data.json.tmp";
