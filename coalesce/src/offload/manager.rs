//! OffloadManager implementation for background task execution.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use coalesce_core::CacheKey;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use smol_str::SmolStr;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info_span, warn};

use super::policy::{OffloadConfig, TimeoutPolicy};
use crate::metrics;

/// Key for identifying offloaded tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OffloadKey {
    /// Key derived from a cache key (enables deduplication of writes to it).
    Keyed(CacheKey),
    /// Auto-generated key for tasks that are never deduplicated.
    Generated {
        /// Kind of the task (e.g., "mirror", "verdict").
        kind: SmolStr,
        /// Unique identifier within the manager.
        id: u64,
    },
}

impl OffloadKey {
    /// Returns the key type for metrics labels.
    ///
    /// For `Keyed` keys returns the cache key prefix.
    /// For `Generated` keys returns the kind.
    pub fn key_type(&self) -> SmolStr {
        match self {
            Self::Keyed(key) => SmolStr::new(key.prefix()),
            Self::Generated { kind, .. } => kind.clone(),
        }
    }
}

impl From<CacheKey> for OffloadKey {
    fn from(key: CacheKey) -> Self {
        Self::Keyed(key)
    }
}

/// Holds one unit of the in-flight budget until the task's future is
/// dropped, whether it completed, timed out or was aborted.
struct LiveSlot(Arc<OffloadManagerInner>);

impl Drop for LiveSlot {
    fn drop(&mut self) {
        // Only the counter: the future may be dropped on the spawning thread
        // while it holds a shard lock of `tasks`.
        self.0.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
struct TrackedTask {
    id: u64,
    handle: JoinHandle<()>,
}

/// Internal state shared across clones.
#[derive(Debug)]
struct OffloadManagerInner {
    config: OffloadConfig,
    tasks: DashMap<OffloadKey, TrackedTask>,
    task_counter: AtomicU64,
    live: AtomicUsize,
}

/// Manager for offloading tasks to background execution.
///
/// Supports keyed deduplication, per-task timeout policies, a bound on the
/// number of tasks in flight, and metrics collection. Clones share state.
#[derive(Clone, Debug)]
pub struct OffloadManager {
    inner: Arc<OffloadManagerInner>,
}

impl OffloadManager {
    /// Create a new OffloadManager with the given configuration.
    pub fn new(config: OffloadConfig) -> Self {
        Self {
            inner: Arc::new(OffloadManagerInner {
                config,
                tasks: DashMap::new(),
                task_counter: AtomicU64::new(0),
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a new OffloadManager with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(OffloadConfig::default())
    }

    fn next_id(&self) -> u64 {
        self.inner.task_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Spawn a task with an auto-generated key of the given kind.
    ///
    /// Returns `false` if the task was dropped because too many tasks are in
    /// flight.
    pub fn spawn<F>(&self, kind: impl Into<SmolStr>, timeout: TimeoutPolicy, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id();
        let key = OffloadKey::Generated {
            kind: kind.into(),
            id,
        };
        let Some(slot) = self.reserve(&key) else {
            return false;
        };

        // Insert under the shard lock so the task's own removal cannot run
        // before its entry exists.
        self.inner
            .tasks
            .entry(key.clone())
            .or_insert_with(|| TrackedTask {
                id,
                handle: self.spawn_inner(task, key.clone(), id, timeout, slot),
            });
        metrics::record_offload_spawned(&key.key_type());
        true
    }

    /// Spawn a task keyed by a cache key.
    ///
    /// If a task with the same key is still running and deduplication is
    /// enabled, the new task is skipped.
    ///
    /// Returns `true` if the task was spawned.
    pub fn spawn_keyed<F>(&self, key: CacheKey, timeout: TimeoutPolicy, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = OffloadKey::Keyed(key);
        let id = self.next_id();
        match self.inner.tasks.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if self.inner.config.deduplicate && !occupied.get().handle.is_finished() {
                    debug!(?key, "Task deduplicated - already in flight");
                    metrics::record_offload_deduplicated(&key.key_type());
                    return false;
                }
                let Some(slot) = self.reserve(&key) else {
                    return false;
                };
                let handle = self.spawn_inner(task, key.clone(), id, timeout, slot);
                occupied.insert(TrackedTask { id, handle });
            }
            Entry::Vacant(vacant) => {
                let Some(slot) = self.reserve(&key) else {
                    return false;
                };
                let handle = self.spawn_inner(task, key.clone(), id, timeout, slot);
                vacant.insert(TrackedTask { id, handle });
            }
        }

        metrics::record_offload_spawned(&key.key_type());
        true
    }

    /// Take one unit of the in-flight budget, or `None` when it is spent.
    ///
    /// Only tasks whose future is still alive count, so finished entries not
    /// yet cleaned up never block new work.
    fn reserve(&self, key: &OffloadKey) -> Option<LiveSlot> {
        let live = self.inner.live.fetch_add(1, Ordering::AcqRel);
        let slot = LiveSlot(Arc::clone(&self.inner));
        match self.inner.config.max_concurrent_tasks {
            Some(max) if live >= max => {
                drop(slot);
                warn!(?key, max, "Offload task dropped - too many tasks in flight");
                None
            }
            _ => Some(slot),
        }
    }

    /// Get the number of tasks whose future has not finished or been dropped.
    pub fn active_task_count(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Get the total number of tracked tasks (including finished).
    pub fn total_task_count(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Clean up finished task handles.
    pub fn cleanup_finished(&self) {
        self.inner
            .tasks
            .retain(|_, tracked| !tracked.handle.is_finished());
    }

    /// Cancel all running tasks.
    pub fn cancel_all(&self) {
        for entry in self.inner.tasks.iter() {
            entry.handle.abort();
        }
    }

    /// Check if a task with the given key is in flight.
    pub fn is_in_flight(&self, key: &OffloadKey) -> bool {
        self.inner
            .tasks
            .get(key)
            .is_some_and(|tracked| !tracked.handle.is_finished())
    }

    /// Wait for all currently tracked tasks to complete.
    ///
    /// Sleeps briefly between checks so that a paused test clock can
    /// auto-advance to the tasks' own timers.
    pub async fn wait_all(&self) {
        loop {
            self.cleanup_finished();
            if self.inner.tasks.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Wait for all tasks with a timeout.
    ///
    /// Returns `true` if all tasks completed within the timeout,
    /// `false` if the timeout was reached.
    pub async fn wait_all_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_all()).await.is_ok()
    }

    fn spawn_inner<F>(
        &self,
        task: F,
        key: OffloadKey,
        id: u64,
        timeout: TimeoutPolicy,
        slot: LiveSlot,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let key_type = key.key_type();

        let span = info_span!(
            "offload_task",
            key_type = %key_type,
            key = ?key,
        );

        tokio::spawn(
            async move {
                let _slot = slot;
                let start = Instant::now();
                let mut timed_out = false;
                match timeout {
                    TimeoutPolicy::None => task.await,
                    TimeoutPolicy::Cancel(duration) => {
                        if tokio::time::timeout(duration, task).await.is_err() {
                            warn!(
                                ?key,
                                timeout_ms = duration.as_millis(),
                                "Offload task cancelled due to timeout"
                            );
                            timed_out = true;
                        }
                    }
                    TimeoutPolicy::Warn(duration) => {
                        task.await;
                        let elapsed = start.elapsed();
                        if elapsed > duration {
                            warn!(
                                ?key,
                                elapsed_ms = elapsed.as_millis(),
                                threshold_ms = duration.as_millis(),
                                "Offload task exceeded timeout threshold"
                            );
                        }
                    }
                }
                inner.tasks.remove_if(&key, |_, tracked| tracked.id == id);
                metrics::record_offload_finished(start.elapsed(), &key_type, timed_out);
            }
            .instrument(span),
        )
    }
}

impl Default for OffloadManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}
