//! Read-through cache over the file store.
//!
//! Storage faults never surface as errors on the request path: reads degrade
//! to a miss and writes degrade to [`CacheWrite::Degraded`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::expiry::ExpiryPolicy;
use super::keys::CacheKey;
use super::store::{FileStore, StoreError};

const METRIC_CACHE_HIT: &str = "gearcache_cache_hit_total";
const METRIC_CACHE_MISS: &str = "gearcache_cache_miss_total";
const METRIC_CACHE_STORE_ERROR: &str = "gearcache_cache_store_error_total";
const METRIC_CACHE_SWEEP_REMOVED: &str = "gearcache_cache_sweep_removed_total";

/// Why a lookup did not produce a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    Absent,
    Expired,
    Corrupt,
    Unavailable,
}

impl MissReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Expired => "expired",
            Self::Corrupt => "corrupt",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<R> {
    Hit(Vec<R>),
    Miss(MissReason),
}

impl<R> CacheLookup<R> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Outcome of a `set`. A degraded write leaves the caller's data valid but uncached.
#[derive(Debug)]
pub enum CacheWrite {
    Stored,
    Degraded(StoreError),
}

impl CacheWrite {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored)
    }
}

/// Counts reported by [`ReadThroughCache::sweep_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
}

pub struct ReadThroughCache<R> {
    store: FileStore,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
    _record: PhantomData<fn() -> R>,
}

impl<R> fmt::Debug for ReadThroughCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("root", &self.store.root())
            .field("ttl", &self.policy.ttl())
            .finish()
    }
}

impl<R> ReadThroughCache<R>
where
    R: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(store: FileStore, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy: ExpiryPolicy::new(ttl),
            clock,
            _record: PhantomData,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            FileStore::new(config.directory.clone()),
            config.ttl,
            Arc::new(SystemClock),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.policy.ttl()
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub async fn init(&self) -> Result<(), StoreError> {
        self.store.init().await
    }

    /// Like [`init`](Self::init), but an unusable directory only disables
    /// persistence. Returns whether the directory is ready.
    pub async fn init_or_degrade(&self) -> bool {
        match self.store.init().await {
            Ok(()) => true,
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "init").increment(1);
                warn!(
                    target = "gearcache::cache",
                    op = "init",
                    result = "degraded",
                    root = %self.store.root().display(),
                    error = %err,
                    "Cache directory unavailable, continuing without persistence"
                );
                false
            }
        }
    }

    pub async fn get(&self, key: &CacheKey) -> CacheLookup<R> {
        let entry = match self.store.read::<R>(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return miss(key, MissReason::Absent),
            Err(err) => {
                let reason = if err.is_corrupt() {
                    MissReason::Corrupt
                } else {
                    MissReason::Unavailable
                };
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "read").increment(1);
                warn!(
                    target = "gearcache::cache",
                    op = "get",
                    result = "degraded",
                    key = %key,
                    reason = reason.as_str(),
                    error = %err,
                    "Cache entry could not be read"
                );
                return miss(key, reason);
            }
        };

        let now = self.clock.now_millis();
        if self.policy.is_expired(entry.stored_at, now) {
            if let Err(err) = self.store.remove(key).await {
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "remove").increment(1);
                warn!(
                    target = "gearcache::cache",
                    op = "get",
                    key = %key,
                    error = %err,
                    "Expired cache entry could not be removed"
                );
            }
            return miss(key, MissReason::Expired);
        }

        counter!(METRIC_CACHE_HIT).increment(1);
        debug!(target = "gearcache::cache", op = "get", result = "hit", key = %key);
        CacheLookup::Hit(entry.payload)
    }

    /// Live payload for `key`, without touching metrics, logs or expired files.
    pub(crate) async fn peek(&self, key: &CacheKey) -> Option<Vec<R>> {
        let entry = self.store.read::<R>(key).await.ok()??;
        let now = self.clock.now_millis();
        (!self.policy.is_expired(entry.stored_at, now)).then_some(entry.payload)
    }

    pub async fn set(&self, key: &CacheKey, payload: &[R]) -> CacheWrite {
        let stored_at = self.clock.now_millis();
        match self.store.write(key, stored_at, payload).await {
            Ok(()) => {
                debug!(
                    target = "gearcache::cache",
                    op = "set",
                    result = "stored",
                    key = %key,
                    records = payload.len()
                );
                CacheWrite::Stored
            }
            Err(err) => {
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "write").increment(1);
                warn!(
                    target = "gearcache::cache",
                    op = "set",
                    result = "degraded",
                    key = %key,
                    error = %err,
                    "Cache entry could not be persisted"
                );
                CacheWrite::Degraded(err)
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.store.remove(key).await
    }

    /// Drop every entry. Returns the number of entries removed.
    pub async fn clear_all(&self) -> Result<usize, StoreError> {
        let removed = self.store.remove_all().await?;
        info!(
            target = "gearcache::cache",
            op = "clear_all",
            result = "ok",
            removed,
            "Cache cleared"
        );
        Ok(removed)
    }

    /// Encoded keys currently on disk, expired ones included.
    pub async fn list_keys(&self) -> Vec<String> {
        match self.store.list_keys().await {
            Ok(keys) => keys.into_iter().collect(),
            Err(err) => {
                warn!(
                    target = "gearcache::cache",
                    op = "list_keys",
                    result = "degraded",
                    error = %err,
                    "Cache keys could not be listed"
                );
                Vec::new()
            }
        }
    }

    /// Remove expired and unreadable entries in one pass.
    ///
    /// Stale entries are collected first and each one is re-read right before
    /// deletion, so an entry rewritten after the scan is kept. A write landing
    /// between that re-read and the unlink can still be lost; the next lookup
    /// then refills it.
    pub async fn sweep_expired(&self) -> Result<SweepReport, StoreError> {
        let keys = self.store.list_keys().await?;
        let now = self.clock.now_millis();
        let mut report = SweepReport::default();
        let mut stale = Vec::new();

        for encoded in keys {
            let Ok(key) = CacheKey::decode(&encoded) else {
                continue;
            };
            report.scanned += 1;

            match self.scan_stamp(&key).await? {
                Some(Scanned::Stamp(stored_at)) if self.policy.is_expired(stored_at, now) => {
                    stale.push((key, Scanned::Stamp(stored_at)));
                }
                Some(Scanned::Corrupt) => stale.push((key, Scanned::Corrupt)),
                _ => {}
            }
        }

        for (key, scanned) in stale {
            if self.remove_if_unchanged(&key, scanned).await? {
                report.removed += 1;
            }
        }

        if report.removed > 0 {
            counter!(METRIC_CACHE_SWEEP_REMOVED).increment(report.removed as u64);
        }
        debug!(
            target = "gearcache::cache",
            op = "sweep",
            scanned = report.scanned,
            removed = report.removed
        );
        Ok(report)
    }

    async fn scan_stamp(&self, key: &CacheKey) -> Result<Option<Scanned>, StoreError> {
        match self.store.read_stamp(key).await {
            Ok(stamp) => Ok(stamp.map(Scanned::Stamp)),
            Err(err) if err.is_corrupt() => Ok(Some(Scanned::Corrupt)),
            Err(err) => Err(err),
        }
    }

    /// Delete `key` only if it still looks the way the sweep saw it.
    async fn remove_if_unchanged(
        &self,
        key: &CacheKey,
        scanned: Scanned,
    ) -> Result<bool, StoreError> {
        if self.scan_stamp(key).await? != Some(scanned) {
            debug!(
                target = "gearcache::cache",
                op = "sweep",
                result = "skipped",
                key = %key,
                "Entry changed since scan"
            );
            return Ok(false);
        }
        self.store.remove(key).await?;
        Ok(true)
    }
}

/// What the sweep found on disk for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scanned {
    Stamp(i64),
    Corrupt,
}

fn miss<R>(key: &CacheKey, reason: MissReason) -> CacheLookup<R> {
    counter!(METRIC_CACHE_MISS, "reason" => reason.as_str()).increment(1);
    debug!(
        target = "gearcache::cache",
        op = "get",
        result = "miss",
        key = %key,
        reason = reason.as_str()
    );
    CacheLookup::Miss(reason)
}
