//! Live dataset cache.
//!
//! One entry per [`DatasetKey`] holds the last value, when it was fetched and the last
//! failure. Entries are refreshed by a per-key poller while observed, on demand when a
//! one-shot read finds them stale, and on a foreground event. At most one fetch per key
//! is in flight; overlapping requests are coalesced rather than queued.
//!
//! Fetches run in their own task so that a cancelled caller or an aborted poller does
//! not cut a request short. A fetch that completes after its last observer left is
//! discarded.
//!
//! An entry nobody observes is kept only while its data is within the stale-after
//! budget, so one-shot reads can be served from it. Anything older is evicted the next
//! time a key is attached.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};
use utoipa::ToSchema;

use crate::config::RetryConfig;
use crate::fetch::{fetch_dataset, FetchFailure};
use crate::freshness::{DatasetKey, FreshnessPolicy, FreshnessTable};
use crate::source::{Dataset, TransitSource};

/// What a consumer should render for a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatasetState {
    /// No fetch has completed yet
    Loading,
    /// Last fetch succeeded with zero records
    Empty,
    Ready,
    /// Last fetch exhausted its retries
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct DatasetSnapshot {
    /// Last successfully fetched value; kept after a later failure
    pub data: Option<Arc<Dataset>>,
    pub failure: Option<FetchFailure>,
    pub updated_at: Option<DateTime<Utc>>,
    pub fetching: bool,
}

impl DatasetSnapshot {
    pub fn state(&self) -> DatasetState {
        if self.failure.is_some() {
            return DatasetState::Error;
        }
        match &self.data {
            None => DatasetState::Loading,
            Some(data) if data.is_empty() => DatasetState::Empty,
            Some(_) => DatasetState::Ready,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    Failed,
    /// Another fetch for the key was already in flight
    Coalesced,
    /// Completed after every observer left
    Discarded,
}

struct Poller {
    handle: JoinHandle<()>,
    wake: Arc<Notify>,
}

struct Entry {
    tx: watch::Sender<DatasetSnapshot>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    in_flight: bool,
    observers: usize,
    poller: Option<Poller>,
}

impl Entry {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(DatasetSnapshot::default());
        Self {
            tx,
            fetched_at: None,
            invalidated: false,
            in_flight: false,
            observers: 0,
            poller: None,
        }
    }
}

struct Shared {
    source: Arc<dyn TransitSource>,
    policies: FreshnessTable,
    retry: RetryConfig,
    entries: Mutex<HashMap<DatasetKey, Entry>>,
}

#[derive(Clone)]
pub struct LiveCache {
    shared: Arc<Shared>,
}

impl LiveCache {
    pub fn new(
        source: Arc<dyn TransitSource>,
        policies: FreshnessTable,
        retry: RetryConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                policies,
                retry,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<DatasetKey, Entry>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self, key: &DatasetKey) -> FreshnessPolicy {
        self.shared.policies.for_key(key)
    }

    pub fn snapshot(&self, key: &DatasetKey) -> DatasetSnapshot {
        self.entries()
            .get(key)
            .map(|entry| entry.tx.borrow().clone())
            .unwrap_or_default()
    }

    /// Older than the stale-after budget, or never fetched
    pub fn is_stale(&self, key: &DatasetKey) -> bool {
        let policy = self.policy(key);
        self.entries()
            .get(key)
            .and_then(|entry| entry.fetched_at)
            .map_or(true, |at| policy.is_stale(at.elapsed()))
    }

    pub fn needs_refresh(&self, key: &DatasetKey) -> bool {
        let invalidated = self
            .entries()
            .get(key)
            .is_some_and(|entry| entry.invalidated);
        invalidated || self.is_stale(key)
    }

    #[cfg(test)]
    pub fn observer_count(&self, key: &DatasetKey) -> usize {
        self.entries().get(key).map_or(0, |entry| entry.observers)
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }

    #[cfg(test)]
    pub fn is_polling(&self, key: &DatasetKey) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|entry| entry.poller.is_some())
    }

    /// Observes `key` until the returned subscription is dropped, polling it on the
    /// key's refetch interval.
    pub fn observe(&self, key: DatasetKey) -> Subscription {
        self.attach(key, true)
    }

    /// One-shot read: refetches first when the entry is stale or invalidated.
    pub async fn get(&self, key: &DatasetKey) -> DatasetSnapshot {
        let mut observer = self.attach(key.clone(), false);
        if self.needs_refresh(key) && self.refresh(key).await == RefreshOutcome::Coalesced {
            return observer.settled().await;
        }
        observer.snapshot()
    }

    /// Manual retry: refetches regardless of staleness.
    pub async fn retry(&self, key: &DatasetKey) -> DatasetSnapshot {
        let mut observer = self.attach(key.clone(), false);
        if self.refresh(key).await == RefreshOutcome::Coalesced {
            return observer.settled().await;
        }
        observer.snapshot()
    }

    /// Fetches `key` unless a fetch for it is already in flight.
    pub async fn refresh(&self, key: &DatasetKey) -> RefreshOutcome {
        if !self.begin_fetch(key) {
            debug!(dataset = %key, "Fetch already in flight, skipping");
            return RefreshOutcome::Coalesced;
        }

        let cache = self.clone();
        let key = key.clone();
        let task = tokio::spawn(async move {
            let ticket = FetchTicket {
                cache: &cache,
                key: &key,
                armed: true,
            };
            let retry = cache.shared.retry.policy_for(key.class());
            let result = fetch_dataset(cache.shared.source.as_ref(), &key, &retry).await;
            ticket.settle(result)
        });

        task.await.unwrap_or_else(|e| {
            error!(error = %e, "Fetch task failed");
            RefreshOutcome::Failed
        })
    }

    /// Foreground event: invalidates every live dataset and wakes all pollers, which
    /// refetch whatever now needs it.
    pub fn on_foreground(&self) -> usize {
        let mut entries = self.entries();
        let mut invalidated = 0;
        for (key, entry) in entries.iter_mut() {
            if key.class().is_live() {
                entry.invalidated = true;
                invalidated += 1;
            }
            if let Some(poller) = &entry.poller {
                poller.wake.notify_one();
            }
        }
        info!(invalidated, "Foreground event, invalidated live datasets");
        invalidated
    }

    fn attach(&self, key: DatasetKey, poll: bool) -> Subscription {
        let mut entries = self.entries();
        self.evict_idle(&mut entries);
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.observers += 1;
        if poll && entry.poller.is_none() {
            let wake = Arc::new(Notify::new());
            let handle = tokio::spawn(poll_loop(self.clone(), key.clone(), wake.clone()));
            entry.poller = Some(Poller { handle, wake });
        }
        let rx = entry.tx.subscribe();
        drop(entries);

        Subscription {
            cache: self.clone(),
            key,
            rx,
        }
    }

    /// Drops unobserved, settled entries whose data is stale or missing
    fn evict_idle(&self, entries: &mut HashMap<DatasetKey, Entry>) {
        let policies = &self.shared.policies;
        let before = entries.len();
        entries.retain(|key, entry| {
            let idle = entry.observers == 0 && !entry.in_flight && entry.poller.is_none();
            !idle
                || entry
                    .fetched_at
                    .is_some_and(|at| !policies.for_key(key).is_stale(at.elapsed()))
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted idle datasets");
        }
    }

    fn detach(&self, key: &DatasetKey) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.observers = entry.observers.saturating_sub(1);
        if entry.observers == 0 {
            if let Some(poller) = entry.poller.take() {
                poller.handle.abort();
                debug!(dataset = %key, "No observers left, stopped polling");
            }
        }
    }

    fn begin_fetch(&self, key: &DatasetKey) -> bool {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        if entry.in_flight {
            return false;
        }
        entry.in_flight = true;
        entry.tx.send_modify(|s| s.fetching = true);
        true
    }

    fn complete_fetch(
        &self,
        key: &DatasetKey,
        result: Result<Dataset, FetchFailure>,
    ) -> RefreshOutcome {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return RefreshOutcome::Discarded;
        };
        entry.in_flight = false;

        if entry.observers == 0 {
            entry.tx.send_modify(|s| s.fetching = false);
            debug!(dataset = %key, "No observers left, discarding fetch result");
            return RefreshOutcome::Discarded;
        }

        entry.invalidated = false;
        match result {
            Ok(data) => {
                entry.fetched_at = Some(Instant::now());
                let records = data.len();
                entry.tx.send_modify(|s| {
                    s.data = Some(Arc::new(data));
                    s.failure = None;
                    s.updated_at = Some(Utc::now());
                    s.fetching = false;
                });
                debug!(dataset = %key, records, "Dataset updated");
                RefreshOutcome::Updated
            }
            Err(failure) => {
                entry.tx.send_modify(|s| {
                    s.failure = Some(failure);
                    s.fetching = false;
                });
                RefreshOutcome::Failed
            }
        }
    }

    fn abandon_fetch(&self, key: &DatasetKey) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.in_flight = false;
            entry.tx.send_modify(|s| s.fetching = false);
        }
    }
}

/// Clears the in-flight flag if the fetch task dies before settling.
struct FetchTicket<'a> {
    cache: &'a LiveCache,
    key: &'a DatasetKey,
    armed: bool,
}

impl FetchTicket<'_> {
    fn settle(mut self, result: Result<Dataset, FetchFailure>) -> RefreshOutcome {
        self.armed = false;
        self.cache.complete_fetch(self.key, result)
    }
}

impl Drop for FetchTicket<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.abandon_fetch(self.key);
        }
    }
}

async fn poll_loop(cache: LiveCache, key: DatasetKey, wake: Arc<Notify>) {
    let policy = cache.policy(&key);
    debug!(dataset = %key, "Started polling");

    let mut due = cache.needs_refresh(&key);
    loop {
        if due {
            cache.refresh(&key).await;
        }
        due = match policy.refetch_interval {
            Some(interval) => tokio::select! {
                _ = tokio::time::sleep(interval) => true,
                _ = wake.notified() => cache.needs_refresh(&key),
            },
            None => {
                wake.notified().await;
                cache.needs_refresh(&key)
            }
        };
    }
}

/// Keeps a dataset observed; dropping it releases the observer and, for the last
/// one, stops the poller.
pub struct Subscription {
    cache: LiveCache,
    key: DatasetKey,
    rx: watch::Receiver<DatasetSnapshot>,
}

impl Subscription {
    pub fn snapshot(&self) -> DatasetSnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next change; false once the entry is gone
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until no fetch is in flight
    pub async fn settled(&mut self) -> DatasetSnapshot {
        let settled = match self.rx.wait_for(|s| !s.fetching).await {
            Ok(snapshot) => Some(snapshot.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.snapshot())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cache.detach(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{network_error, ScriptedSource};
    use crate::models::{Route, RouteStatus};
    use std::time::Duration;

    fn arrivals_key() -> DatasetKey {
        DatasetKey::ArrivalsForStop("200060".to_string())
    }

    fn cache_over(source: &Arc<ScriptedSource>) -> LiveCache {
        LiveCache::new(
            source.clone(),
            FreshnessTable::default(),
            RetryConfig::default(),
        )
    }

    fn routes() -> Dataset {
        Dataset::Routes(vec![Route {
            id: "N10".to_string(),
            route_number: "N10".to_string(),
            route_name: "Leichhardt".to_string(),
            is_night_service: true,
            color: None,
            status: RouteStatus::Active,
        }])
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_before_first_fetch() {
        let source = ScriptedSource::new();
        let cache = cache_over(&source);
        assert_eq!(cache.snapshot(&arrivals_key()).state(), DatasetState::Loading);
        assert!(cache.is_stale(&arrivals_key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_serves_cache_until_stale() {
        let source = ScriptedSource::new();
        source.always(DatasetKey::Routes, Ok(routes()));
        let cache = cache_over(&source);

        assert_eq!(cache.get(&DatasetKey::Routes).await.state(), DatasetState::Ready);
        advance(60).await;
        cache.get(&DatasetKey::Routes).await;
        assert_eq!(source.calls(&DatasetKey::Routes), 1);

        // Reference data goes stale after five minutes
        advance(240).await;
        cache.get(&DatasetKey::Routes).await;
        assert_eq!(source.calls(&DatasetKey::Routes), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_gets_share_one_fetch() {
        let source = ScriptedSource::new();
        source.set_latency(Duration::from_secs(5));
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        let key = arrivals_key();
        let (a, b) = tokio::join!(cache.get(&key), cache.get(&key));
        assert_eq!(source.calls(&key), 1);
        assert_eq!(a.state(), DatasetState::Empty);
        assert_eq!(b.state(), DatasetState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_skipped_while_fetch_outstanding() {
        let source = ScriptedSource::new();
        // Slower than the 30 s refetch interval
        source.set_latency(Duration::from_secs(45));
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        let key = arrivals_key();
        let _sub = cache.observe(key.clone());
        advance(40).await;
        assert_eq!(cache.refresh(&key).await, RefreshOutcome::Coalesced);
        assert_eq!(source.calls(&key), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_polls_on_refetch_interval() {
        let source = ScriptedSource::new();
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        let key = arrivals_key();
        let sub = cache.observe(key.clone());
        advance(1).await;
        assert_eq!(source.calls(&key), 1);
        assert_eq!(sub.snapshot().state(), DatasetState::Empty);

        advance(30).await;
        assert_eq!(source.calls(&key), 2);
        advance(30).await;
        assert_eq!(source.calls(&key), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_last_observer_stops_polling() {
        let source = ScriptedSource::new();
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        let key = arrivals_key();
        let first = cache.observe(key.clone());
        let second = cache.observe(key.clone());
        advance(1).await;
        assert_eq!(cache.observer_count(&key), 2);

        drop(first);
        assert!(cache.is_polling(&key));
        drop(second);
        assert!(!cache.is_polling(&key));

        advance(120).await;
        assert_eq!(source.calls(&key), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_discarded_without_observers() {
        let source = ScriptedSource::new();
        source.set_latency(Duration::from_secs(10));
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        let key = arrivals_key();
        let sub = cache.observe(key.clone());
        advance(1).await;
        assert!(sub.snapshot().fetching);
        drop(sub);

        advance(20).await;
        let snapshot = cache.snapshot(&key);
        assert_eq!(source.calls(&key), 1);
        assert!(!snapshot.fetching);
        assert_eq!(snapshot.state(), DatasetState::Loading);
        // The in-flight flag was released
        assert_eq!(cache.refresh(&key).await, RefreshOutcome::Discarded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_invalidates_live_datasets_only() {
        let source = ScriptedSource::new();
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        source.always(DatasetKey::Routes, Ok(routes()));
        let cache = cache_over(&source);

        let _arrivals = cache.observe(arrivals_key());
        let _routes = cache.observe(DatasetKey::Routes);
        advance(5).await;
        assert_eq!(source.calls(&arrivals_key()), 1);
        assert_eq!(source.calls(&DatasetKey::Routes), 1);

        // Well inside the 15 s staleness budget
        assert!(!cache.needs_refresh(&arrivals_key()));
        assert_eq!(cache.on_foreground(), 1);
        advance(1).await;
        assert_eq!(source.calls(&arrivals_key()), 2);
        assert_eq!(source.calls(&DatasetKey::Routes), 1);
        assert!(!cache.needs_refresh(&arrivals_key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_invalidates_unobserved_entries_for_next_read() {
        let source = ScriptedSource::new();
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        cache.get(&arrivals_key()).await;
        cache.on_foreground();
        cache.get(&arrivals_key()).await;
        assert_eq!(source.calls(&arrivals_key()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_retry_budget() {
        let source = ScriptedSource::new();
        let key = arrivals_key();
        source.push(key.clone(), Err(network_error()));
        source.push(key.clone(), Err(network_error()));
        source.always(key.clone(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        let snapshot = cache.get(&key).await;
        assert_eq!(snapshot.state(), DatasetState::Empty);
        assert!(snapshot.failure.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_isolated_from_siblings() {
        let source = ScriptedSource::new();
        source.always(arrivals_key(), Err(network_error()));
        source.always(DatasetKey::Alerts, Ok(Dataset::Alerts(vec![])));
        let cache = cache_over(&source);

        let key = arrivals_key();
        let (arrivals, alerts) = tokio::join!(cache.get(&key), cache.get(&DatasetKey::Alerts));
        assert_eq!(arrivals.state(), DatasetState::Error);
        assert_eq!(arrivals.failure.unwrap().attempts, 3);
        assert_eq!(alerts.state(), DatasetState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_success_keeps_last_data() {
        let source = ScriptedSource::new();
        source.push(DatasetKey::Routes, Ok(routes()));
        source.always(DatasetKey::Routes, Err(network_error()));
        let cache = cache_over(&source);

        let _routes = cache.observe(DatasetKey::Routes);
        advance(1).await;
        assert_eq!(cache.snapshot(&DatasetKey::Routes).state(), DatasetState::Ready);
        advance(300).await;
        let snapshot = cache.get(&DatasetKey::Routes).await;
        assert_eq!(snapshot.state(), DatasetState::Error);
        assert_eq!(snapshot.data.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_ignores_staleness() {
        let source = ScriptedSource::new();
        let key = arrivals_key();
        for _ in 0..3 {
            source.push(key.clone(), Err(network_error()));
        }
        source.always(key.clone(), Ok(Dataset::Arrivals(vec![])));
        let cache = cache_over(&source);

        assert_eq!(cache.get(&key).await.state(), DatasetState::Error);
        let snapshot = cache.retry(&key).await;
        assert_eq!(snapshot.state(), DatasetState::Empty);
        assert_eq!(source.calls(&key), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_reads_of_many_stops_stay_bounded() {
        let source = ScriptedSource::new();
        let cache = cache_over(&source);

        for i in 0..200 {
            let key = DatasetKey::ArrivalsForStop(format!("stop-{i}"));
            source.always(key.clone(), Ok(Dataset::Arrivals(vec![])));
            cache.get(&key).await;
            advance(1).await;
        }
        // Only reads inside the 15 s arrivals budget are kept
        assert!(cache.entry_count() <= 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observed_entry_survives_eviction() {
        let source = ScriptedSource::new();
        source.always(arrivals_key(), Ok(Dataset::Arrivals(vec![])));
        source.always(DatasetKey::Alerts, Ok(Dataset::Alerts(vec![])));
        let cache = cache_over(&source);

        let sub = cache.observe(arrivals_key());
        advance(100).await;
        cache.get(&DatasetKey::Alerts).await;
        assert!(cache.is_polling(&arrivals_key()));
        assert_eq!(sub.snapshot().state(), DatasetState::Empty);
    }
}
