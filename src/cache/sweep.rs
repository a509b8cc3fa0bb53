//! Optional periodic removal of expired entries.

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::read_through::ReadThroughCache;

/// Spawn a task that sweeps `cache` every `interval`.
///
/// Lazy expiry on `get` is unaffected; the sweep only reclaims disk space for
/// keys nobody asks for.
pub fn spawn_sweeper<R>(cache: Arc<ReadThroughCache<R>>, interval: Duration) -> JoinHandle<()>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately
        loop {
            ticker.tick().await;
            match cache.sweep_expired().await {
                Ok(report) if report.removed > 0 => {
                    info!(
                        target = "gearcache::cache::sweep",
                        scanned = report.scanned,
                        removed = report.removed,
                        "Swept expired cache entries"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        target = "gearcache::cache::sweep",
                        error = %err,
                        "Cache sweep failed"
                    );
                }
            }
        }
    })
}
