//! Fetch orchestration: cache fast path, producer fill on miss, phase fan-out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::{StreamExt, stream};
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::producer::{Producer, ProducerError, Provenance};
use crate::cache::{CacheKey, CacheLookup, ReadThroughCache, StoreError};
use crate::domain::{Catalog, DomainError, GearRecord};

const METRIC_PRODUCER_CALLS: &str = "gearcache_producer_calls_total";
const METRIC_PRODUCER_MS: &str = "gearcache_producer_ms";
const METRIC_PHASE_FAILED: &str = "gearcache_fetch_phase_failed_total";

const DEFAULT_FANOUT: usize = 3;
const DEFAULT_WARM_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Producer(#[from] ProducerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upper bound on phases fetched concurrently by `fetch_all`.
    pub fanout_concurrency: usize,
    /// Collapse concurrent misses on one key into a single producer call.
    pub single_flight: bool,
    /// Pause after each producer call while warming the whole catalog.
    pub warm_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            fanout_concurrency: DEFAULT_FANOUT,
            single_flight: true,
            warm_delay: Duration::from_millis(DEFAULT_WARM_DELAY_MS),
        }
    }
}

impl From<&crate::config::FetchSettings> for FetchOptions {
    fn from(settings: &crate::config::FetchSettings) -> Self {
        Self {
            fanout_concurrency: settings.fanout_concurrency,
            single_flight: settings.single_flight,
            warm_delay: settings.warm_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Producer(Provenance),
}

/// Result of the single-key path.
#[derive(Debug, Clone)]
pub struct PhaseFetch {
    pub key: CacheKey,
    pub records: Vec<GearRecord>,
    pub source: FetchSource,
    /// False when the fill could not be persisted.
    pub stored: bool,
}

impl PhaseFetch {
    pub fn phase(&self) -> u32 {
        self.key.phase()
    }

    pub fn cached(&self) -> bool {
        self.source == FetchSource::Cache
    }

    pub fn degraded(&self) -> bool {
        matches!(&self.source, FetchSource::Producer(provenance) if provenance.is_fallback())
    }
}

#[derive(Debug)]
pub struct PhaseFailure {
    pub phase: u32,
    pub error: FetchError,
}

/// Aggregate of a multi-phase fetch. Results and failures keep the requested phase order.
#[derive(Debug, Default)]
pub struct BatchFetch {
    pub phases: Vec<PhaseFetch>,
    pub failures: Vec<PhaseFailure>,
}

impl BatchFetch {
    pub fn records(&self) -> Vec<GearRecord> {
        self.phases
            .iter()
            .flat_map(|phase| phase.records.iter().cloned())
            .collect()
    }

    pub fn into_records(self) -> Vec<GearRecord> {
        self.phases
            .into_iter()
            .flat_map(|phase| phase.records)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_phases(&self) -> Vec<u32> {
        self.failures.iter().map(|failure| failure.phase).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub keys: usize,
    pub cached: usize,
    pub filled: usize,
    pub failed: usize,
}

pub struct FetchService {
    catalog: Arc<Catalog>,
    cache: Arc<ReadThroughCache<GearRecord>>,
    producer: Arc<dyn Producer>,
    options: FetchOptions,
    inflight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl FetchService {
    pub fn new(
        catalog: Arc<Catalog>,
        cache: Arc<ReadThroughCache<GearRecord>>,
        producer: Arc<dyn Producer>,
        options: FetchOptions,
    ) -> Self {
        Self {
            catalog,
            cache,
            producer,
            options,
            inflight: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<ReadThroughCache<GearRecord>> {
        &self.cache
    }

    pub fn producer_name(&self) -> &'static str {
        self.producer.describe()
    }

    /// Serve one key from the cache, filling it from the producer on a miss.
    pub async fn fetch_one(
        &self,
        category: &str,
        subcategory: &str,
        phase: u32,
    ) -> Result<PhaseFetch, FetchError> {
        let key = self.catalog.validate_key(category, subcategory, phase)?;
        self.fetch_key(key).await
    }

    /// Fetch every phase in `phases` independently.
    ///
    /// Input is validated up front; a failing phase is reported in
    /// [`BatchFetch::failures`] without affecting the others.
    pub async fn fetch_all(
        &self,
        category: &str,
        subcategory: &str,
        phases: &[u32],
    ) -> Result<BatchFetch, FetchError> {
        let keys = phases
            .iter()
            .map(|&phase| self.catalog.validate_key(category, subcategory, phase))
            .collect::<Result<Vec<_>, _>>()?;

        let outcomes: Vec<(u32, Result<PhaseFetch, FetchError>)> = stream::iter(keys)
            .map(|key| async move {
                let phase = key.phase();
                (phase, self.fetch_key(key).await)
            })
            .buffered(self.options.fanout_concurrency.max(1))
            .collect()
            .await;

        let mut batch = BatchFetch::default();
        for (phase, outcome) in outcomes {
            match outcome {
                Ok(fetched) => batch.phases.push(fetched),
                Err(error) => {
                    counter!(METRIC_PHASE_FAILED).increment(1);
                    warn!(
                        target = "gearcache::application::fetch",
                        op = "fetch_all",
                        result = "phase_failed",
                        category,
                        subcategory,
                        phase,
                        error = %error,
                        "Phase could not be fetched"
                    );
                    batch.failures.push(PhaseFailure { phase, error });
                }
            }
        }
        Ok(batch)
    }

    /// Fetch all phases configured in the catalog.
    pub async fn fetch_all_phases(
        &self,
        category: &str,
        subcategory: &str,
    ) -> Result<BatchFetch, FetchError> {
        let phases = self.catalog.phases().to_vec();
        self.fetch_all(category, subcategory, &phases).await
    }

    pub async fn invalidate_all(&self) -> Result<usize, StoreError> {
        self.cache.clear_all().await
    }

    pub async fn cache_keys(&self) -> Vec<String> {
        self.cache.list_keys().await
    }

    /// Walk the entire catalog through the single-key path.
    ///
    /// Producer calls are paced by `warm_delay`; cache hits are not.
    pub async fn warm_catalog(&self) -> WarmReport {
        let keys = self.catalog.keys();
        let mut report = WarmReport {
            keys: keys.len(),
            ..WarmReport::default()
        };
        let started = Instant::now();

        for key in keys {
            let encoded = key.encode();
            match self.fetch_key(key).await {
                Ok(fetched) if fetched.cached() => report.cached += 1,
                Ok(_) => {
                    report.filled += 1;
                    if !self.options.warm_delay.is_zero() {
                        tokio::time::sleep(self.options.warm_delay).await;
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        target = "gearcache::application::fetch",
                        op = "warm",
                        key = %encoded,
                        error = %err,
                        "Warming key failed"
                    );
                }
            }
        }

        info!(
            target = "gearcache::application::fetch",
            op = "warm",
            keys = report.keys,
            cached = report.cached,
            filled = report.filled,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Catalog warmed"
        );
        report
    }

    async fn fetch_key(&self, key: CacheKey) -> Result<PhaseFetch, FetchError> {
        if let CacheLookup::Hit(records) = self.cache.get(&key).await {
            return Ok(from_cache(key, records));
        }
        if !self.options.single_flight {
            return self.fill(key).await;
        }

        let gate = self.inflight.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = gate.lock().await;
            // Another caller may have filled the key while we waited. The miss
            // above is already counted for this lookup.
            match self.cache.peek(&key).await {
                Some(records) => Ok(from_cache(key.clone(), records)),
                None => self.fill(key.clone()).await,
            }
        };
        self.inflight
            .remove_if(&key, |_, held| Arc::ptr_eq(held, &gate) && Arc::strong_count(held) == 2);
        result
    }

    async fn fill(&self, key: CacheKey) -> Result<PhaseFetch, FetchError> {
        let started = Instant::now();
        let produced = self.producer.produce(&key).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!(METRIC_PRODUCER_MS).record(elapsed_ms);

        let produced = match produced {
            Ok(produced) => produced,
            Err(err) => {
                counter!(METRIC_PRODUCER_CALLS, "provenance" => "error").increment(1);
                warn!(
                    target = "gearcache::application::fetch",
                    op = "fill",
                    result = "error",
                    key = %key,
                    elapsed_ms,
                    error = %err,
                    "Producer failed"
                );
                return Err(err.into());
            }
        };
        counter!(METRIC_PRODUCER_CALLS, "provenance" => produced.provenance.as_str()).increment(1);

        if let Provenance::Fallback { reason } = &produced.provenance {
            warn!(
                target = "gearcache::application::fetch",
                op = "fill",
                result = "fallback",
                key = %key,
                reason = %reason,
                "Producer returned fallback data"
            );
        }

        let write = self.cache.set(&key, &produced.records).await;
        debug!(
            target = "gearcache::application::fetch",
            op = "fill",
            result = produced.provenance.as_str(),
            key = %key,
            records = produced.records.len(),
            stored = write.is_stored(),
            elapsed_ms
        );

        Ok(PhaseFetch {
            key,
            records: produced.records,
            source: FetchSource::Producer(produced.provenance),
            stored: write.is_stored(),
        })
    }
}

fn from_cache(key: CacheKey, records: Vec<GearRecord>) -> PhaseFetch {
    PhaseFetch {
        key,
        records,
        source: FetchSource::Cache,
        stored: true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;
    use time::OffsetDateTime;

    use super::*;
    use crate::application::producer::Produced;
    use crate::cache::{FileStore, ManualClock};

    struct SlowCountingProducer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Producer for SlowCountingProducer {
        async fn produce(&self, key: &CacheKey) -> Result<Produced, ProducerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Produced::upstream(vec![GearRecord::new(
                key,
                "head",
                "Helm",
                "1",
                "https://example.test/item=1",
                OffsetDateTime::UNIX_EPOCH,
            )]))
        }

        fn describe(&self) -> &'static str {
            "slow"
        }
    }

    fn service(dir: &TempDir, producer: Arc<dyn Producer>, single_flight: bool) -> FetchService {
        let cache = Arc::new(ReadThroughCache::new(
            FileStore::new(dir.path()),
            Duration::from_secs(3600),
            Arc::new(ManualClock::new(0)),
        ));
        FetchService::new(
            Arc::new(Catalog::reference()),
            cache,
            producer,
            FetchOptions {
                single_flight,
                warm_delay: Duration::ZERO,
                ..FetchOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_producer_call() {
        let dir = TempDir::new().expect("tempdir");
        let producer = Arc::new(SlowCountingProducer {
            calls: AtomicUsize::new(0),
        });
        let service = service(&dir, producer.clone(), true);

        let (a, b, c) = tokio::join!(
            service.fetch_one("mage", "frost", 1),
            service.fetch_one("mage", "frost", 1),
            service.fetch_one("mage", "frost", 1),
        );

        assert_eq!(producer.calls.load(Ordering::SeqCst), 1);
        let fetched = [a.expect("a"), b.expect("b"), c.expect("c")];
        assert_eq!(fetched.iter().filter(|f| !f.cached()).count(), 1);
        assert!(fetched.iter().all(|f| f.records.len() == 1));
        assert!(service.inflight.is_empty());
    }

    #[tokio::test]
    async fn without_single_flight_each_miss_calls_producer() {
        let dir = TempDir::new().expect("tempdir");
        let producer = Arc::new(SlowCountingProducer {
            calls: AtomicUsize::new(0),
        });
        let service = service(&dir, producer.clone(), false);

        let (a, b) = tokio::join!(
            service.fetch_one("mage", "frost", 2),
            service.fetch_one("mage", "frost", 2),
        );
        a.expect("a");
        b.expect("b");
        assert_eq!(producer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_any_work() {
        let dir = TempDir::new().expect("tempdir");
        let producer = Arc::new(SlowCountingProducer {
            calls: AtomicUsize::new(0),
        });
        let service = service(&dir, producer.clone(), true);

        assert!(matches!(
            service.fetch_one("mage", "holy", 1).await,
            Err(FetchError::Validation(DomainError::UnknownPair { .. }))
        ));
        assert!(matches!(
            service.fetch_all("mage", "frost", &[1, 7]).await,
            Err(FetchError::Validation(DomainError::PhaseOutOfRange { phase: 7, .. }))
        ));
        assert_eq!(producer.calls.load(Ordering::SeqCst), 0);
        assert!(service.cache_keys().await.is_empty());
    }
}
