//! Single-flight result cache.
//!
//! Maps [`ResourceId`] to an immutable [`CacheEntry`]. Concurrent callers for a
//! cold key share one computation:
//!
//! ```text
//! caller A ─┐
//!           │                       spawn_blocking
//! caller B ─┼──► ResultCache ──────► pipeline
//!           │        │                   │
//! caller C ─┘        ▼                   ▼
//!              [A, B, C receive     [one run]
//!               the same entry]◄─────────┘
//! ```
//!
//! The first caller registers a broadcast channel and spawns the computation
//! as a detached task; every caller (including the first) then waits on the
//! channel. Dropping a caller's future only releases that caller. The shared
//! computation keeps running unless `cancel_orphaned` is set and no waiter is
//! left.
//!
//! Entries expire a fixed time after they were computed (checked lazily on
//! access and by an optional sweeper task) and the least recently used entry
//! is evicted when the cache is full. Failures are broadcast to all waiters
//! but never stored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::assemble::CandidateLocation;
use crate::config::CacheConfig;
use crate::error::SearchError;
use crate::key::ResourceId;

/// A computed result set. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry {
    resource_id: ResourceId,
    items: Vec<CandidateLocation>,
    total: usize,
    computed_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(resource_id: ResourceId, items: Vec<CandidateLocation>) -> Self {
        Self {
            resource_id,
            total: items.len(),
            items,
            computed_at: Utc::now(),
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn items(&self) -> &[CandidateLocation] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }
}

type Shared = Result<Arc<CacheEntry>, SearchError>;

/// Counters and gauges describing cache behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests answered from a stored entry.
    pub hits: u64,
    /// Requests that started a computation.
    pub misses: u64,
    /// Requests that joined a computation already in flight.
    pub coalesced: u64,
    /// Computations that completed successfully.
    pub computations: u64,
    pub failures: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub in_flight: usize,
    pub capacity: usize,
    /// Set once [`ResultCache::shutdown`] has run.
    pub closed: bool,
}

struct Slot {
    entry: Arc<CacheEntry>,
    expires_at: Instant,
    last_used: u64,
}

struct Flight {
    sender: broadcast::Sender<Shared>,
    waiters: usize,
    abort: Option<AbortHandle>,
    generation: u64,
}

#[derive(Default)]
struct State {
    ready: HashMap<ResourceId, Slot>,
    in_flight: HashMap<ResourceId, Flight>,
    tick: u64,
    next_generation: u64,
    closed: bool,
}

impl State {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

struct Inner {
    config: CacheConfig,
    state: Mutex<State>,
    counters: Counters,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// Process-wide result cache. Cloning shares the same cache.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Inner>,
}

impl ResultCache {
    /// Create an empty cache.
    ///
    /// The expiry sweeper is only started when a tokio runtime is available;
    /// expired entries are removed lazily either way.
    pub fn new(config: CacheConfig) -> Self {
        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(State::default()),
            counters: Counters::default(),
            sweeper: Mutex::new(None),
        });

        if let Some(period) = inner.config.sweep_interval {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let task = handle.spawn(sweep(Arc::downgrade(&inner), period));
                    *lock(&inner.sweeper) = Some(task);
                }
                Err(_) => debug!("no tokio runtime, cache sweeper disabled"),
            }
        }

        Self { inner }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Stored entry for `id`, if present and not expired. Does not count as a
    /// hit and does not refresh recency.
    pub fn get(&self, id: &ResourceId) -> Option<Arc<CacheEntry>> {
        let state = lock(&self.inner.state);
        state
            .ready
            .get(id)
            .filter(|slot| slot.expires_at > Instant::now())
            .map(|slot| Arc::clone(&slot.entry))
    }

    /// Return the entry for `id`, computing it with `compute` on a cold key.
    ///
    /// At most one `compute` runs per key at a time. The returned future is
    /// cancel-safe: dropping it detaches this caller only.
    pub async fn get_or_compute<F>(&self, id: &ResourceId, compute: F) -> Shared
    where
        F: FnOnce() -> Result<Vec<CandidateLocation>, SearchError> + Send + 'static,
    {
        let (mut receiver, generation) = {
            let mut state = lock(&self.inner.state);
            if state.closed {
                return Err(SearchError::computation("result cache is shut down"));
            }

            let now = Instant::now();
            let tick = state.touch();
            if let Some(slot) = state.ready.get_mut(id) {
                if slot.expires_at > now {
                    slot.last_used = tick;
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(resource_id = %id, "cache hit");
                    return Ok(Arc::clone(&slot.entry));
                }
            }
            if state.ready.remove(id).is_some() {
                self.inner.counters.expirations.fetch_add(1, Ordering::Relaxed);
                debug!(resource_id = %id, "cache entry expired");
            }

            if let Some(flight) = state.in_flight.get_mut(id) {
                flight.waiters += 1;
                self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(
                    resource_id = %id,
                    waiters = flight.waiters,
                    "joining in-flight computation"
                );
                (flight.sender.subscribe(), flight.generation)
            } else {
                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                let generation = state.next_generation;
                state.next_generation += 1;

                let (sender, receiver) = broadcast::channel(1);
                let task = tokio::spawn(run(
                    Arc::clone(&self.inner),
                    id.clone(),
                    generation,
                    compute,
                ));
                state.in_flight.insert(
                    id.clone(),
                    Flight {
                        sender,
                        waiters: 1,
                        abort: Some(task.abort_handle()),
                        generation,
                    },
                );
                debug!(resource_id = %id, "starting computation");
                (receiver, generation)
            }
        };

        let _guard = WaiterGuard {
            inner: &self.inner,
            id,
            generation,
        };

        match receiver.recv().await {
            Ok(shared) => shared,
            Err(_) => Err(SearchError::computation("computation was abandoned")),
        }
    }

    /// Remove expired entries now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// Drop every stored entry. In-flight computations are unaffected.
    pub fn clear(&self) {
        let mut state = lock(&self.inner.state);
        let dropped = state.ready.len();
        state.ready.clear();
        info!(dropped, "result cache cleared");
    }

    /// Tear the cache down: stop the sweeper, abort in-flight computations and
    /// drop every entry. Later lookups fail.
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.inner.sweeper).take() {
            task.abort();
        }

        let mut state = lock(&self.inner.state);
        state.closed = true;
        for (_, flight) in state.in_flight.drain() {
            if let Some(abort) = flight.abort {
                abort.abort();
            }
        }
        let dropped = state.ready.len();
        state.ready.clear();
        info!(dropped, "result cache shut down");
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, in_flight, closed) = {
            let state = lock(&self.inner.state);
            (state.ready.len(), state.in_flight.len(), state.closed)
        };
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            computations: c.computations.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            expirations: c.expirations.load(Ordering::Relaxed),
            entries,
            in_flight,
            capacity: self.inner.config.capacity,
            closed,
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResultCache")
            .field("entries", &stats.entries)
            .field("in_flight", &stats.in_flight)
            .field("capacity", &stats.capacity)
            .finish()
    }
}

impl Inner {
    fn finish(
        &self,
        id: &ResourceId,
        generation: u64,
        outcome: Result<Vec<CandidateLocation>, SearchError>,
    ) {
        let mut state = lock(&self.state);
        let current = state
            .in_flight
            .get(id)
            .is_some_and(|f| f.generation == generation);
        if !current {
            debug!(resource_id = %id, "discarding result of abandoned computation");
            return;
        }
        let Some(flight) = state.in_flight.remove(id) else {
            return;
        };

        let shared = match outcome {
            Ok(items) => {
                let entry = Arc::new(CacheEntry::new(id.clone(), items));
                self.counters.computations.fetch_add(1, Ordering::Relaxed);
                if !state.closed {
                    self.insert(&mut state, Arc::clone(&entry));
                }
                info!(
                    resource_id = %id,
                    total = entry.total(),
                    waiters = flight.waiters,
                    "cached computed result"
                );
                Ok(entry)
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    resource_id = %id,
                    kind = err.kind(),
                    error = %err,
                    waiters = flight.waiters,
                    "computation failed"
                );
                Err(err)
            }
        };
        drop(state);

        // Waiters that went away in the meantime are fine.
        let _ = flight.sender.send(shared);
    }

    fn insert(&self, state: &mut State, entry: Arc<CacheEntry>) {
        let now = Instant::now();
        let tick = state.touch();

        while state.ready.len() >= self.config.capacity.max(1) {
            let victim = state
                .ready
                .iter()
                .min_by_key(|(_, slot)| (slot.expires_at > now, slot.last_used))
                .map(|(id, slot)| (id.clone(), slot.expires_at > now));
            let Some((victim, live)) = victim else {
                break;
            };
            state.ready.remove(&victim);
            if live {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                info!(resource_id = %victim, "evicted least recently used entry");
            } else {
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            }
        }

        state.ready.insert(
            entry.resource_id().clone(),
            Slot {
                entry,
                expires_at: now + self.config.ttl,
                last_used: tick,
            },
        );
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = lock(&self.state);
        let before = state.ready.len();
        state.ready.retain(|_, slot| slot.expires_at > now);
        let removed = before - state.ready.len();
        if removed > 0 {
            self.counters
                .expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    fn release(&self, id: &ResourceId, generation: u64) {
        let mut state = lock(&self.state);
        let Some(flight) = state.in_flight.get_mut(id) else {
            return;
        };
        if flight.generation != generation {
            return;
        }

        flight.waiters = flight.waiters.saturating_sub(1);
        if flight.waiters == 0 && self.config.cancel_orphaned {
            if let Some(flight) = state.in_flight.remove(id) {
                if let Some(abort) = flight.abort {
                    abort.abort();
                }
                info!(resource_id = %id, "cancelled orphaned computation");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.sweeper).take() {
            task.abort();
        }
    }
}

/// Decrements the waiter count of a flight when a caller finishes or is dropped.
struct WaiterGuard<'a> {
    inner: &'a Arc<Inner>,
    id: &'a ResourceId,
    generation: u64,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.inner.release(self.id, self.generation);
    }
}

async fn run<F>(inner: Arc<Inner>, id: ResourceId, generation: u64, compute: F)
where
    F: FnOnce() -> Result<Vec<CandidateLocation>, SearchError> + Send + 'static,
{
    let started = Instant::now();
    let deadline = inner.config.compute_timeout;

    // A timed-out or aborted run leaves its blocking thread to finish on its
    // own; the result is discarded.
    let outcome = match tokio::time::timeout(deadline, tokio::task::spawn_blocking(compute)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) if join.is_panic() => Err(SearchError::computation("pipeline panicked")),
        Ok(Err(_)) => Err(SearchError::computation("pipeline task was cancelled")),
        Err(_) => Err(SearchError::UpstreamDataUnavailable {
            source_name: "pipeline".to_string(),
            message: format!("computation exceeded {} ms", deadline.as_millis()),
        }),
    };

    debug!(
        resource_id = %id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = outcome.is_ok(),
        "computation finished"
    );
    inner.finish(&id, generation, outcome);
}

async fn sweep(inner: Weak<Inner>, period: std::time::Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.purge_expired();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn id(n: u8) -> ResourceId {
        serde_json::from_value(serde_json::json!(format!("{:032x}", n))).unwrap()
    }

    fn config() -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(60),
            capacity: 8,
            sweep_interval: None,
            cancel_orphaned: false,
            compute_timeout: Duration::from_secs(5),
        }
    }

    fn items(n: usize) -> Vec<CandidateLocation> {
        (1..=n)
            .map(|rank| CandidateLocation {
                name: format!("Site {}", rank),
                rank,
                lat: 40.0,
                lon: 116.2,
                elevation: 300.0,
                height_diff: 60.0,
                distance_to_road_km: 1.0,
                road_name: None,
                road_type: "primary".into(),
                light_pollution: None,
                sky_quality: None,
                bortle_class: None,
            })
            .collect()
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        n: usize,
    ) -> impl FnOnce() -> Result<Vec<CandidateLocation>, SearchError> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(delay);
            Ok(items(n))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_cold_requests_compute_once() {
        let cache = ResultCache::new(config());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&id(1), counting(&calls, Duration::from_millis(100), 3))
                    .await
            }));
        }

        let mut entries = Vec::new();
        for handle in handles {
            entries.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(entries.iter().all(|e| Arc::ptr_eq(e, &entries[0])));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.coalesced, 15);
        assert_eq!(stats.computations, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn warm_key_is_served_without_recomputing() {
        let cache = ResultCache::new(config());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_compute(&id(1), counting(&calls, Duration::ZERO, 2))
            .await
            .unwrap();
        let second = cache
            .get_or_compute(&id(1), counting(&calls, Duration::ZERO, 2))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.total(), first.items().len());
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failures_reach_every_waiter_and_are_not_cached() {
        let cache = ResultCache::new(config());
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: Arc<AtomicUsize>| {
            move || -> Result<Vec<CandidateLocation>, SearchError> {
                calls.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(100));
                Err(SearchError::UpstreamDataUnavailable {
                    source_name: "dem".into(),
                    message: "offline".into(),
                })
            }
        };

        let a = {
            let cache = cache.clone();
            let f = failing(Arc::clone(&calls));
            tokio::spawn(async move { cache.get_or_compute(&id(2), f).await })
        };
        let b = {
            let cache = cache.clone();
            let f = failing(Arc::clone(&calls));
            tokio::spawn(async move { cache.get_or_compute(&id(2), f).await })
        };

        assert!(matches!(
            a.await.unwrap(),
            Err(SearchError::UpstreamDataUnavailable { .. })
        ));
        assert!(matches!(
            b.await.unwrap(),
            Err(SearchError::UpstreamDataUnavailable { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().entries, 0);

        let retried = cache
            .get_or_compute(&id(2), counting(&calls, Duration::ZERO, 1))
            .await
            .unwrap();
        assert_eq!(retried.total(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_recomputed() {
        let cache = ResultCache::new(CacheConfig {
            ttl: Duration::from_millis(50),
            ..config()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_compute(&id(3), counting(&calls, Duration::ZERO, 1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get(&id(3)).is_none());

        cache
            .get_or_compute(&id(3), counting(&calls, Duration::ZERO, 1))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[tokio::test]
    async fn sweeper_removes_expired_entries() {
        let cache = ResultCache::new(CacheConfig {
            ttl: Duration::from_millis(20),
            sweep_interval: Some(Duration::from_millis(30)),
            ..config()
        });
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_compute(&id(4), counting(&calls, Duration::ZERO, 1))
            .await
            .unwrap();
        assert_eq!(cache.stats().entries, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let cache = ResultCache::new(CacheConfig {
            capacity: 2,
            ..config()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        for n in [1, 2] {
            cache
                .get_or_compute(&id(n), counting(&calls, Duration::ZERO, 1))
                .await
                .unwrap();
        }
        // Touch 1 so that 2 becomes the eviction victim.
        cache
            .get_or_compute(&id(1), counting(&calls, Duration::ZERO, 1))
            .await
            .unwrap();
        cache
            .get_or_compute(&id(3), counting(&calls, Duration::ZERO, 1))
            .await
            .unwrap();

        assert!(cache.get(&id(1)).is_some());
        assert!(cache.get(&id(2)).is_none());
        assert!(cache.get(&id(3)).is_some());
        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_caller_does_not_cancel_shared_computation() {
        let cache = ResultCache::new(config());
        let calls = Arc::new(AtomicUsize::new(0));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            cache.get_or_compute(&id(5), counting(&calls, Duration::from_millis(150), 2)),
        )
        .await;
        assert!(abandoned.is_err(), "caller should be released immediately");

        tokio::time::sleep(Duration::from_millis(300)).await;
        let entry = cache
            .get_or_compute(&id(5), counting(&calls, Duration::ZERO, 9))
            .await
            .unwrap();
        assert_eq!(entry.total(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn orphaned_computation_is_cancelled_when_configured() {
        let cache = ResultCache::new(CacheConfig {
            cancel_orphaned: true,
            ..config()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let _ = tokio::time::timeout(
            Duration::from_millis(20),
            cache.get_or_compute(&id(6), counting(&calls, Duration::from_millis(150), 2)),
        )
        .await;
        assert_eq!(cache.stats().in_flight, 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(cache.get(&id(6)).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn compute_deadline_surfaces_upstream_unavailable() {
        let cache = ResultCache::new(CacheConfig {
            compute_timeout: Duration::from_millis(50),
            ..config()
        });
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get_or_compute(&id(7), counting(&calls, Duration::from_millis(300), 1))
            .await;
        match result {
            Err(SearchError::UpstreamDataUnavailable { source_name, .. }) => {
                assert_eq!(source_name, "pipeline")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cache.stats().failures, 1);
    }

    #[tokio::test]
    async fn shutdown_drops_entries_and_rejects_lookups() {
        let cache = ResultCache::new(config());
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_compute(&id(8), counting(&calls, Duration::ZERO, 1))
            .await
            .unwrap();

        cache.shutdown();
        assert_eq!(cache.stats().entries, 0);
        assert!(cache
            .get_or_compute(&id(8), counting(&calls, Duration::ZERO, 1))
            .await
            .is_err());
    }
}
