//! Periodic snapshot refresh and market-update broadcast.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::push::{PushMessage, SubscriberRegistry};
use super::snapshot::SnapshotProvider;

/// Time of the last completed refresh tick, shared with the status endpoint.
#[derive(Debug, Default)]
pub struct RefreshClock(RwLock<Option<DateTime<Utc>>>);

impl RefreshClock {
    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.0.read().map(|t| *t).unwrap_or(None)
    }

    fn mark(&self, at: DateTime<Utc>) {
        if let Ok(mut last) = self.0.write() {
            *last = Some(at);
        }
    }
}

/// Runs one refresh and pushes the result to every subscriber.
pub async fn refresh_once(
    snapshot: &SnapshotProvider,
    registry: &SubscriberRegistry,
    clock: &RefreshClock,
) -> usize {
    let markets = snapshot.refresh().await;
    let timestamp = Utc::now();
    clock.mark(timestamp);
    let delivered = registry.broadcast(&PushMessage::MarketUpdate { markets, timestamp });
    debug!(subscribers = delivered, "market update broadcast");
    delivered
}

/// Spawns the refresh loop. It stops when `shutdown` flips to `true` or its
/// sender is dropped.
pub fn spawn_refresh_loop(
    snapshot: Arc<SnapshotProvider>,
    registry: Arc<SubscriberRegistry>,
    clock: Arc<RefreshClock>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "refresh loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    refresh_once(&snapshot, &registry, &clock).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("refresh loop stopped");
    })
}
