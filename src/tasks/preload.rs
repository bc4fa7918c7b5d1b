use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, warn};

use crate::error::SourceError;
use crate::events::{CacheEvent, Fetched, PreparedImage};
use crate::list::{ImageList, ImageRef};
use crate::source::ImageSource;
use crate::tasks::loader;

#[derive(Debug, Clone)]
pub enum EntryState {
    Pending,
    Ready(Arc<PreparedImage>),
    Failed(SourceError),
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub image: ImageRef,
    pub state: EntryState,
}

impl CacheEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending)
    }
}

/// Window-bounded store of decoded images with fetch-ahead.
///
/// Rules:
/// - The owner is the only writer; fetch tasks never touch the entry map and
///   report back through [`PreloadCache::next_fetched`].
/// - At most one fetch per index is in flight. An entry evicted while its fetch
///   runs is dropped immediately; if the index comes back before the fetch
///   finishes, the new entry adopts that fetch instead of starting another.
/// - A completion is applied only to a live `Pending` entry, otherwise discarded.
/// - Simultaneous fetches are capped by a semaphore; the rest wait their turn.
///   A queued fetch whose index was evicted skips the source call once it
///   gets a permit.
pub struct PreloadCache<S> {
    source: Arc<S>,
    list: ImageList,
    entries: HashMap<usize, CacheEntry>,
    in_flight: HashMap<usize, Arc<AtomicBool>>,
    limiter: Arc<Semaphore>,
    tasks: JoinSet<Fetched>,
    task_index: HashMap<task::Id, usize>,
}

impl<S: ImageSource> PreloadCache<S> {
    pub fn new(source: Arc<S>, list: ImageList, max_concurrent: usize) -> Self {
        Self {
            source,
            list,
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: JoinSet::new(),
            task_index: HashMap::new(),
        }
    }

    pub fn list(&self) -> &ImageList {
        &self.list
    }

    /// Make `window` the live window, given in priority order.
    ///
    /// Evicts every entry outside it and schedules a fetch for each index that
    /// has no entry yet. Returns how many fetches were started.
    pub fn ensure(&mut self, window: &[usize]) -> usize {
        let keep: HashSet<usize> = window.iter().copied().collect();
        let in_flight = &self.in_flight;
        self.entries.retain(|index, entry| {
            let retained = keep.contains(index);
            if !retained {
                debug!(index, id = %entry.image.id, pending = entry.is_pending(), "evicting");
                if let Some(wanted) = in_flight.get(index) {
                    wanted.store(false, Ordering::SeqCst);
                }
            }
            retained
        });

        let mut started = 0;
        for &index in window {
            if self.entries.contains_key(&index) {
                continue;
            }
            let Some(image) = self.list.get(index).cloned() else {
                continue;
            };
            self.entries.insert(
                index,
                CacheEntry {
                    image: image.clone(),
                    state: EntryState::Pending,
                },
            );
            if let Some(wanted) = self.in_flight.get(&index) {
                debug!(index, "re-entered window; adopting running fetch");
                wanted.store(true, Ordering::SeqCst);
                continue;
            }
            self.spawn_fetch(image);
            started += 1;
        }
        started
    }

    fn spawn_fetch(&mut self, image: ImageRef) {
        let index = image.index;
        let source = Arc::clone(&self.source);
        let limiter = Arc::clone(&self.limiter);
        let wanted = Arc::new(AtomicBool::new(true));
        let still_wanted = Arc::clone(&wanted);
        debug!(index, id = %image.id, "scheduling fetch");
        let handle = self.tasks.spawn(async move {
            let result = fetch_limited(source.as_ref(), &limiter, &still_wanted, &image).await;
            Fetched {
                index,
                id: image.id,
                result,
            }
        });
        self.task_index.insert(handle.id(), index);
        self.in_flight.insert(index, wanted);
    }

    /// Next finished fetch, in completion order. `None` once nothing is running.
    pub async fn next_fetched(&mut self) -> Option<Fetched> {
        loop {
            match self.tasks.join_next_with_id().await? {
                Ok((task_id, fetched)) => {
                    self.task_index.remove(&task_id);
                    return Some(fetched);
                }
                Err(err) => {
                    let Some(index) = self.task_index.remove(&err.id()) else {
                        continue;
                    };
                    let id = self
                        .list
                        .get(index)
                        .map(|image| image.id.clone())
                        .unwrap_or_default();
                    return Some(Fetched {
                        index,
                        id,
                        result: Some(Err(SourceError::Io(format!("fetch task failed: {err}")))),
                    });
                }
            }
        }
    }

    /// Apply a completion. Returns the event to surface, or `None` when the
    /// result belonged to an entry that is no longer waiting for it.
    pub fn complete(&mut self, fetched: Fetched) -> Option<CacheEvent> {
        let Fetched { index, id, result } = fetched;
        self.in_flight.remove(&index);
        let Some(entry) = self.entries.get_mut(&index) else {
            debug!(index, %id, "discarding result for evicted entry");
            return None;
        };
        if !entry.is_pending() {
            debug!(index, %id, "discarding stale result");
            return None;
        }
        let Some(result) = result else {
            // skipped just before the index came back into the window
            let image = entry.image.clone();
            self.spawn_fetch(image);
            return None;
        };
        match result {
            Ok(image) => {
                entry.state = EntryState::Ready(Arc::clone(&image));
                Some(CacheEvent::ImageReady { index, image })
            }
            Err(reason) => {
                warn!(index, %id, error = %reason, "image failed");
                entry.state = EntryState::Failed(reason.clone());
                Some(CacheEvent::ImageFailed { index, id, reason })
            }
        }
    }

    /// Snapshot of one entry.
    pub fn get(&self, index: usize) -> Option<CacheEntry> {
        self.entries.get(&index).cloned()
    }

    /// Forget an entry so the next `ensure` covering it fetches again.
    pub fn invalidate(&mut self, index: usize) {
        if self.entries.remove(&index).is_some() {
            debug!(index, "invalidated");
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Indices currently holding an entry, ascending.
    pub fn cached_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.entries.keys().copied().collect();
        indices.sort_unstable();
        indices
    }
}

async fn fetch_limited<S: ImageSource>(
    source: &S,
    limiter: &Semaphore,
    wanted: &AtomicBool,
    image: &ImageRef,
) -> Option<Result<Arc<PreparedImage>, SourceError>> {
    let _permit = match limiter.acquire().await {
        Ok(permit) => permit,
        Err(_) => return Some(Err(SourceError::Io("fetch limiter closed".into()))),
    };
    if !wanted.load(Ordering::SeqCst) {
        debug!(id = %image.id, "skipping fetch for evicted entry");
        return None;
    }
    Some(loader::load(source, image).await.map(Arc::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::fixtures::{encode_jpeg, quadrants};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Serves a small JPEG for every id except those listed in `missing`, and
    /// holds each fetch until the test releases a permit on `gate`.
    struct MockSource {
        jpeg: Vec<u8>,
        missing: HashSet<String>,
        gate: Semaphore,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    impl MockSource {
        fn new(missing: &[&str], open: bool) -> Arc<Self> {
            Arc::new(Self {
                jpeg: encode_jpeg(&quadrants()),
                missing: missing.iter().map(|s| s.to_string()).collect(),
                gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls_for(&self, id: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == id).count()
        }
    }

    impl ImageSource for MockSource {
        async fn resolve(&self) -> Result<ImageList, SourceError> {
            unreachable!("cache never resolves")
        }

        async fn fetch(&self, image: &ImageRef) -> Result<Vec<u8>, SourceError> {
            self.calls.lock().unwrap().push(image.id.clone());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.missing.contains(&image.id) {
                Err(SourceError::NotFound(image.id.clone()))
            } else {
                Ok(self.jpeg.clone())
            }
        }
    }

    fn list(n: usize) -> ImageList {
        ImageList::from_ids((0..n).map(|i| format!("img{i}.jpg")))
    }

    async fn drain(cache: &mut PreloadCache<MockSource>, n: usize) -> Vec<CacheEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            let fetched = timeout(Duration::from_secs(5), cache.next_fetched())
                .await
                .expect("fetch timed out")
                .expect("no fetch running");
            if let Some(event) = cache.complete(fetched) {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn ensure_is_idempotent() {
        let source = MockSource::new(&[], true);
        let mut cache = PreloadCache::new(Arc::clone(&source), list(5), 3);

        assert_eq!(cache.ensure(&[0, 1, 2]), 3);
        assert_eq!(cache.ensure(&[0, 1, 2]), 0);
        drain(&mut cache, 3).await;
        assert_eq!(cache.ensure(&[0, 1, 2]), 0);

        for id in ["img0.jpg", "img1.jpg", "img2.jpg"] {
            assert_eq!(source.calls_for(id), 1, "{id}");
        }
        assert!(matches!(cache.get(1).unwrap().state, EntryState::Ready(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shifting_window_evicts_outside_entries() {
        let source = MockSource::new(&[], true);
        let mut cache = PreloadCache::new(source, list(6), 3);

        cache.ensure(&[0, 1, 5]);
        drain(&mut cache, 3).await;
        cache.ensure(&[1, 2, 0]);
        assert_eq!(cache.cached_indices(), vec![0, 1, 2]);
        assert!(cache.get(5).is_none());
        drain(&mut cache, 1).await;
        cache.ensure(&[3, 4, 2]);
        assert_eq!(cache.cached_indices(), vec![2, 3, 4]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_fetches_are_capped() {
        let source = MockSource::new(&[], false);
        let mut cache = PreloadCache::new(Arc::clone(&source), list(6), 2);

        assert_eq!(cache.ensure(&[0, 1, 2, 3, 4, 5]), 6);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.active.load(Ordering::SeqCst), 2);

        source.gate.add_permits(6);
        let events = drain(&mut cache, 6).await;
        assert_eq!(events.len(), 6);
        assert_eq!(source.peak.load(Ordering::SeqCst), 2);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn evicted_pending_result_is_discarded() {
        let source = MockSource::new(&[], false);
        let mut cache = PreloadCache::new(Arc::clone(&source), list(6), 3);

        cache.ensure(&[0]);
        cache.ensure(&[3]);
        assert!(cache.get(0).is_none());

        source.gate.add_permits(2);
        let mut events = Vec::new();
        for _ in 0..2 {
            let fetched = timeout(Duration::from_secs(5), cache.next_fetched())
                .await
                .unwrap()
                .unwrap();
            events.extend(cache.complete(fetched));
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CacheEvent::ImageReady { index: 3, .. }));
        assert!(cache.get(0).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reentering_window_adopts_running_fetch() {
        let source = MockSource::new(&[], false);
        let mut cache = PreloadCache::new(Arc::clone(&source), list(6), 3);

        cache.ensure(&[0]);
        cache.ensure(&[3]);
        assert_eq!(cache.ensure(&[0, 3]), 0);
        assert!(cache.get(0).unwrap().is_pending());

        source.gate.add_permits(2);
        drain(&mut cache, 2).await;
        assert_eq!(source.calls_for("img0.jpg"), 1);
        assert!(matches!(cache.get(0).unwrap().state, EntryState::Ready(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queued_fetch_for_evicted_entry_skips_source() {
        let source = MockSource::new(&[], false);
        let mut cache = PreloadCache::new(Arc::clone(&source), list(6), 1);

        cache.ensure(&[0]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.active.load(Ordering::SeqCst), 1);
        assert_eq!(cache.ensure(&[0, 1]), 1);
        cache.ensure(&[0]);
        source.gate.add_permits(2);
        let events = drain(&mut cache, 2).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CacheEvent::ImageReady { index: 0, .. }));
        assert_eq!(source.calls_for("img1.jpg"), 0);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queued_fetch_readopted_before_its_turn_still_runs() {
        let source = MockSource::new(&[], false);
        let mut cache = PreloadCache::new(Arc::clone(&source), list(6), 1);

        cache.ensure(&[0]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.ensure(&[0, 1]);
        cache.ensure(&[0]);
        assert_eq!(cache.ensure(&[0, 1]), 0);
        source.gate.add_permits(2);
        drain(&mut cache, 2).await;

        assert_eq!(source.calls_for("img1.jpg"), 1);
        assert!(matches!(cache.get(1).unwrap().state, EntryState::Ready(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_entry_retries_only_after_leaving_window() {
        let source = MockSource::new(&["img1.jpg"], true);
        let mut cache = PreloadCache::new(Arc::clone(&source), list(6), 3);

        cache.ensure(&[1]);
        let events = drain(&mut cache, 1).await;
        assert!(matches!(
            &events[0],
            CacheEvent::ImageFailed { index: 1, reason: SourceError::NotFound(_), .. }
        ));
        assert_eq!(cache.ensure(&[1, 2]), 1);
        drain(&mut cache, 1).await;
        assert_eq!(source.calls_for("img1.jpg"), 1);
        assert!(matches!(cache.get(1).unwrap().state, EntryState::Failed(_)));

        cache.ensure(&[4]);
        drain(&mut cache, 1).await;
        assert_eq!(cache.ensure(&[1]), 1);
        drain(&mut cache, 1).await;
        assert_eq!(source.calls_for("img1.jpg"), 2);

        cache.invalidate(1);
        assert_eq!(cache.ensure(&[1]), 1);
        drain(&mut cache, 1).await;
        assert_eq!(source.calls_for("img1.jpg"), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn out_of_range_indices_are_ignored() {
        let source = MockSource::new(&[], true);
        let mut cache = PreloadCache::new(source, list(2), 3);
        assert_eq!(cache.ensure(&[1, 7]), 1);
        drain(&mut cache, 1).await;
        assert_eq!(cache.cached_indices(), vec![1]);
    }
}
