//! Sharded station store
//!
//! HashMap shards behind `parking_lot::RwLock`s.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use super::{now_millis, StationFields, StationRecord};

type Shard = RwLock<HashMap<String, Arc<StationRecord>>>;

/// Whether an upsert created the station or updated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Concurrent map from station id to the station's current record
///
/// ## Concurrency:
/// - Each shard has its own RwLock; an upsert holds exactly one shard's
///   write lock while it merges, so updates to one id never interleave
/// - `snapshot()` read-locks one shard at a time and clones `Arc`s
/// - Locks are never held across I/O
pub struct StationStore {
    shards: Vec<Shard>,
    hasher: RandomState,
}

impl StationStore {
    /// Default shard count
    pub const DEFAULT_SHARDS: usize = 16;

    /// Create an empty store with the given number of shards (at least one)
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Insert or merge a station update, stamping it with the current time
    pub fn upsert(
        &self,
        station_id: &str,
        fields: StationFields,
        lamport_stamp: u64,
        origin: &str,
    ) -> Result<UpsertOutcome> {
        let now = now_millis()?;
        Ok(self.upsert_at(station_id, fields, lamport_stamp, origin, now))
    }

    /// Insert or merge a station update ingested at `now` (unix millis)
    pub fn upsert_at(
        &self,
        station_id: &str,
        fields: StationFields,
        lamport_stamp: u64,
        origin: &str,
        now: u64,
    ) -> UpsertOutcome {
        let mut shard = self.shard(station_id).write();

        match shard.get_mut(station_id) {
            Some(current) => {
                let next = current.merged(fields, lamport_stamp, now, origin);
                *current = Arc::new(next);
                UpsertOutcome::Updated
            }
            None => {
                let record = StationRecord::new(station_id, fields, lamport_stamp, now, origin);
                shard.insert(station_id.to_string(), Arc::new(record));
                UpsertOutcome::Created
            }
        }
    }

    /// Put a previously persisted record back as-is (startup only)
    pub fn restore(&self, record: StationRecord) {
        let mut shard = self.shard(&record.station_id).write();
        shard.insert(record.station_id.clone(), Arc::new(record));
    }

    /// Current record for a station, if it is known
    pub fn get(&self, station_id: &str) -> Option<Arc<StationRecord>> {
        self.shard(station_id).read().get(station_id).cloned()
    }

    /// Every current record
    ///
    /// Each record is a complete published version; shards are visited one
    /// at a time so writers to other shards are never blocked.
    pub fn snapshot(&self) -> Vec<Arc<StationRecord>> {
        let mut records = Vec::new();
        for shard in &self.shards {
            records.extend(shard.read().values().cloned());
        }
        records
    }

    /// Remove stations whose last update is older than `ttl_ms` at `now`
    ///
    /// Two phases: a read-locked scan remembers which record versions were
    /// stale, then each is deleted only if that exact version is still the
    /// current one. An upsert landing in between replaces the `Arc`, so the
    /// delete is skipped and the update survives.
    pub fn remove_if_stale(&self, now: u64, ttl_ms: u64) -> Vec<Arc<StationRecord>> {
        let mut removed = Vec::new();

        for shard in &self.shards {
            let candidates: Vec<Arc<StationRecord>> = shard
                .read()
                .values()
                .filter(|record| record.is_stale(now, ttl_ms))
                .cloned()
                .collect();

            if candidates.is_empty() {
                continue;
            }

            let mut guard = shard.write();
            for observed in candidates {
                let unchanged = guard
                    .get(&observed.station_id)
                    .map_or(false, |current| Arc::ptr_eq(current, &observed));

                if unchanged {
                    guard.remove(&observed.station_id);
                    removed.push(observed);
                }
            }
        }

        removed
    }

    /// Largest Lamport stamp held by any record (0 when empty)
    pub fn max_lamport_stamp(&self) -> u64 {
        self.shards
            .iter()
            .flat_map(|shard| {
                shard
                    .read()
                    .values()
                    .map(|record| record.lamport_stamp)
                    .max()
            })
            .max()
            .unwrap_or(0)
    }

    /// Number of stations
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, station_id: &str) -> &Shard {
        let index = self.hasher.hash_one(station_id) as usize % self.shards.len();
        &self.shards[index]
    }
}

impl Default for StationStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SHARDS)
    }
}
