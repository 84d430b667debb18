//! # Weather Aggregator
//!
//! A concurrent, crash-tolerant aggregation server for weather stations:
//! - Content servers PUT per-station JSON updates, clients GET snapshots
//! - Lamport clock ordering across independently clocked peers
//! - Atomic write-then-rename persistence with reload on startup
//! - TTL expiry of stations that stop reporting
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │            (one thread per connection)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │        Connection state machine + Request parser             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                  │
//! │        (Lamport clock observe → handle → tick)               │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!   ┌─────────────────┐            ┌─────────────────┐
//!   │  StationStore   │ ◄────────  │  Persistence    │
//!   │ (sharded RwLock)│  snapshot  │ (tmp + rename)  │
//!   └────────▲────────┘            └─────────────────┘
//!            │ remove_if_stale
//!   ┌────────┴────────┐
//!   │ Expiry Sweeper  │
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod clock;
pub mod protocol;
pub mod store;
pub mod persistence;
pub mod sweeper;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AggError, Result};
pub use config::Config;
pub use clock::LamportClock;
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the aggregation server
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
