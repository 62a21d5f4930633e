//! Polling loop that keeps an enriched snapshot of all study spots.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use hashbrown::{HashMap, HashSet};
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SpotError;
use crate::geocode::GeoAddressResolver;
use crate::models::{Coordinates, LocationRecord, Snapshot};
use crate::store::LocationStore;

/// What a single poll cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A new snapshot went out
    Published { sequence: u64, records: usize },
    /// An earlier cycle was still running
    Skipped,
    /// The store could not be read; the previous snapshot stays
    FetchFailed(SpotError),
}

/// Periodically fetches spots from the store, resolves their addresses and
/// publishes the result as one [`Snapshot`].
///
/// The engine is the only writer of the snapshot. Cycles never overlap and a
/// snapshot is replaced only once every record's lookup has finished.
pub struct LocationSyncEngine {
    store: Arc<dyn LocationStore>,
    resolver: Arc<GeoAddressResolver>,
    poll_interval: Duration,
    cycle: Mutex<()>,
    snapshot: watch::Sender<Arc<Snapshot>>,
}

impl LocationSyncEngine {
    pub fn new(
        store: Arc<dyn LocationStore>,
        resolver: Arc<GeoAddressResolver>,
        config: &SyncConfig,
    ) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::empty()));
        Self {
            store,
            resolver,
            poll_interval: config.poll_interval(),
            cycle: Mutex::new(()),
            snapshot,
        }
    }

    /// Receiver that sees every newly published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    /// The last published snapshot
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Run one fetch-and-enrich cycle.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_cycle) = self.cycle.try_lock() else {
            debug!("Previous sync cycle still running, skipping tick");
            return TickOutcome::Skipped;
        };

        let fetched = match self.store.fetch_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to fetch locations, keeping previous snapshot: {}", e);
                return TickOutcome::FetchFailed(e);
            }
        };

        let previous = self.current_snapshot();
        let records = reconcile(&previous, fetched);

        let enriched = join_all(records.into_iter().map(|r| self.enrich(r))).await;
        let count = enriched.len();
        let sequence = self.publish(enriched);

        debug!("Published snapshot {} with {} records", sequence, count);
        TickOutcome::Published {
            sequence,
            records: count,
        }
    }

    async fn enrich(&self, mut record: LocationRecord) -> LocationRecord {
        let Coordinates { lat, long } = record.coordinates;
        record.resolved_address = match self.resolver.resolve(lat, long).await {
            Ok(address) => Some(address),
            Err(e) => {
                debug!("Address lookup for '{}' failed: {}", record.key, e);
                None
            }
        };
        record
    }

    fn publish(&self, records: Vec<LocationRecord>) -> u64 {
        let mut sequence = 0;
        self.snapshot.send_modify(|current| {
            let next = current.next(records);
            sequence = next.sequence;
            *current = Arc::new(next);
        });
        sequence
    }

    /// Poll until `shutdown` fires. Ticks that fall behind are skipped
    /// rather than bunched up.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Starting location sync every {}ms",
            self.poll_interval.as_millis()
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        outcome = self.tick() => {
                            if let TickOutcome::Published { sequence, records } = outcome {
                                debug!("Sync cycle {} done ({} records)", sequence, records);
                            }
                        }
                    }
                }
            }
        }

        info!("Location sync stopped");
    }
}

/// Apply the record invariants against the previous snapshot: keys are
/// unique, and a known spot keeps the coordinates it was first seen with.
fn reconcile(previous: &Snapshot, fetched: Vec<LocationRecord>) -> Vec<LocationRecord> {
    let known: HashMap<&str, Coordinates> = previous
        .records
        .iter()
        .map(|r| (r.key.as_str(), r.coordinates))
        .collect();

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(fetched.len());

    for mut record in fetched {
        if !seen.insert(record.key.clone()) {
            warn!("Dropping duplicate location key '{}'", record.key);
            continue;
        }

        if let Some(original) = known.get(record.key.as_str()) {
            if *original != record.coordinates {
                warn!(
                    "Location '{}' moved from {} to {}; keeping original coordinates",
                    record.key, original, record.coordinates
                );
                record.coordinates = *original;
            }
        }

        records.push(record);
    }

    records
}
