use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

use super::clock::Clock;
use crate::store::Store;

/// Spawn a background task that deletes expired codes every `interval`.
///
/// The caller owns the handle and aborts it on shutdown.
pub fn spawn_code_sweeper(
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let interval = if interval.is_zero() {
        Duration::from_secs(1)
    } else {
        interval
    };

    tokio::spawn(async move {
        loop {
            match store.purge_expired_codes(clock.now()).await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired codes purged"),
                Err(err) => error!("code sweep failed: {err:#}"),
            }

            sleep(interval).await;
        }
    })
}
