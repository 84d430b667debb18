//! Configuration for the aggregation server
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AggError, Result};

/// Main configuration for an aggregation server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the persisted station file
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── weather_data.json      (last committed snapshot)
    ///     └── weather_data.json.tmp  (only while a write is in flight)
    pub data_dir: PathBuf,

    /// Number of independently locked shards in the station store
    pub store_shards: usize,

    // -------------------------------------------------------------------------
    // Expiry Configuration
    // -------------------------------------------------------------------------
    /// Stations not updated for longer than this are evicted (milliseconds)
    pub station_ttl_ms: u64,

    /// Period of the expiry sweep (milliseconds)
    pub sweep_interval_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// Port used when none is given on the command line
pub const DEFAULT_PORT: u16 = 4567;

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./aggregator_data"),
            store_shards: 16,
            station_ttl_ms: 30_000,
            sweep_interval_ms: 1_000,
            listen_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Station TTL as a Duration
    pub fn station_ttl(&self) -> Duration {
        Duration::from_millis(self.station_ttl_ms)
    }

    /// Sweep period as a Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.station_ttl_ms == 0 {
            return Err(AggError::Config("station TTL must be positive".into()));
        }
        if self.sweep_interval_ms == 0 {
            return Err(AggError::Config("sweep interval must be positive".into()));
        }
        if self.max_connections == 0 {
            return Err(AggError::Config("max_connections must be at least 1".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for the persisted station file)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the number of store shards (clamped to at least one)
    pub fn store_shards(mut self, shards: usize) -> Self {
        self.config.store_shards = shards.max(1);
        self
    }

    /// Set the station TTL (in milliseconds)
    pub fn station_ttl_ms(mut self, ms: u64) -> Self {
        self.config.station_ttl_ms = ms;
        self
    }

    /// Set the station TTL (in whole seconds, saturating)
    pub fn station_ttl_secs(self, secs: u64) -> Self {
        self.station_ttl_ms(secs.saturating_mul(1000))
    }

    /// Set the expiry sweep period (in milliseconds)
    pub fn sweep_interval_ms(mut self, ms: u64) -> Self {
        self.config.sweep_interval_ms = ms;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
