use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;

use crate::entity::Entity;
use crate::vendor::VendorClient;

/// Refresh every entity once, one after another.
///
/// The client stays locked for the whole pass so no command can interleave
/// with a half-finished refresh.
pub async fn poll_once<C: VendorClient>(client: &Mutex<C>, entities: &Mutex<Vec<Entity>>) {
    let mut entities = entities.lock().await;
    let client = client.lock().await;

    for entity in entities.iter_mut() {
        entity.refresh(&*client).await;
    }

    let stale = entities.iter().filter(|e| e.state.stale).count();
    debug!("Polled {} entities ({} stale)", entities.len(), stale);
}

/// Poll every `period` until `shutdown` flips to true or its sender drops.
///
/// The first pass happens one period after start; setup already refreshed
/// every entity.
pub async fn run<C: VendorClient>(
    client: Arc<Mutex<C>>,
    entities: Arc<Mutex<Vec<Entity>>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Polling every {:?}", period);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => poll_once(&client, &entities).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Poller stopped");
}
