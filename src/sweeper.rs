//! Expiry Sweeper
//!
//! Background thread that evicts stations which stopped reporting.
//!
//! ## Loop
//! ```text
//! ┌──────────────┐  every interval   ┌──────────────────────────────┐
//! │ crossbeam    │ ────────────────► │ store.remove_if_stale(now,   │
//! │ tick channel │                   │                       ttl)   │
//! └──────────────┘                   └──────────────────────────────┘
//!        ▲ select!
//! ┌──────────────┐
//! │ shutdown rx  │ ── message or disconnect ──► exit
//! └──────────────┘
//! ```
//! A failing or panicking sweep is logged; the next tick runs normally.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};

use crate::error::Result;
use crate::store::{now_millis, StationStore};

/// Shortest accepted sweep period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Run one sweep against the wall clock
///
/// Returns the number of stations removed.
pub fn sweep_once(store: &StationStore, ttl: Duration) -> Result<usize> {
    let now = now_millis()?;
    let removed = store.remove_if_stale(now, ttl.as_millis() as u64);

    for record in &removed {
        tracing::info!(
            "Expired station {} (last update from {}, lamport {})",
            record.station_id,
            record.origin,
            record.lamport_stamp
        );
    }

    Ok(removed.len())
}

/// Handle to a running sweeper; stops the thread when dropped
pub struct SweeperHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Start sweeping `store` every `interval`, evicting after `ttl`
    pub fn spawn(store: Arc<StationStore>, ttl: Duration, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval.max(MIN_INTERVAL));

        let thread = thread::Builder::new()
            .name("expiry-sweeper".to_string())
            .spawn(move || {
                tracing::debug!("Expiry sweeper started (ttl={:?}, interval={:?})", ttl, interval);

                loop {
                    crossbeam::select! {
                        recv(ticker) -> _ => {
                            match panic::catch_unwind(AssertUnwindSafe(|| sweep_once(&store, ttl))) {
                                Ok(Ok(0)) => {}
                                Ok(Ok(count)) => tracing::debug!("Sweep removed {} stations", count),
                                Ok(Err(e)) => tracing::warn!("Sweep failed: {}", e),
                                Err(_) => tracing::error!("Sweep panicked; continuing"),
                            }
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }

                tracing::debug!("Expiry sweeper stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// Stop the sweeper and wait for its thread to exit
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Expiry sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}
