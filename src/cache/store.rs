//! In-memory store for conversion results
//!
//! Entries are keyed by a SHA-256 fingerprint of the raw input and carry a
//! last-used timestamp. A background task evicts entries that have not been
//! used within the retention window.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Retention, DEFAULT_SWEEP_INTERVAL};

/// Smallest interval the sweep task will tick at
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Computes the cache key for a raw input
pub fn fingerprint(raw: &[u8]) -> String {
    format!("{:x}", Sha256::digest(raw))
}

/// A cached conversion result
#[derive(Debug, Clone)]
struct CacheEntry {
    /// The produced Turtle
    output: String,
    /// When the entry was stored or last returned
    last_used_at: DateTime<Utc>,
}

impl CacheEntry {
    fn touch(&mut self, now: DateTime<Utc>) {
        // Never move backwards if the wall clock does
        if now > self.last_used_at {
            self.last_used_at = now;
        }
    }
}

/// Counters describing cache activity since creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
}

/// Content-addressed store of conversion results
///
/// All methods take `&self`; the entry map sits behind a mutex that is never
/// held across an await point. A poisoned lock turns every operation into a
/// miss or a no-op rather than an error.
#[derive(Debug)]
pub struct CacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    retention: Retention,
    sweep_interval: Duration,
    counters: Counters,
    /// Dropping the sender ends the sweep task
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl CacheStore {
    /// Creates an empty store without a sweep task
    pub fn new(retention: Retention) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            retention,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            counters: Counters::default(),
            shutdown_tx: Mutex::new(None),
        }
    }

    /// Sets how often the sweep task runs
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    /// Retention policy of this store
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Period of the sweep task
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    fn lock_entries(&self) -> Option<MutexGuard<'_, HashMap<String, CacheEntry>>> {
        match self.entries.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("Conversion cache lock is poisoned, treating as a miss");
                None
            }
        }
    }

    /// Returns the cached output for `raw` and refreshes its timestamp
    pub fn lookup(&self, raw: &[u8]) -> Option<String> {
        let hash = fingerprint(raw);
        let mut entries = self.lock_entries()?;

        match entries.get_mut(&hash) {
            Some(entry) => {
                entry.touch(Utc::now());
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                info!(hash = %hash, "Use RDF from cache");
                Some(entry.output.clone())
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or overwrites the output for `raw`
    pub fn store(&self, raw: &[u8], output: &str) {
        let hash = fingerprint(raw);
        if let Some(mut entries) = self.lock_entries() {
            entries.insert(
                hash,
                CacheEntry {
                    output: output.to_string(),
                    last_used_at: Utc::now(),
                },
            );
            self.counters.stores.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// When the entry for `raw` was last stored or returned
    pub fn last_used_at(&self, raw: &[u8]) -> Option<DateTime<Utc>> {
        let hash = fingerprint(raw);
        self.lock_entries()?.get(&hash).map(|e| e.last_used_at)
    }

    /// Removes entries unused within the retention window, as of now
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// Removes entries whose last use is older than `now - retention`
    ///
    /// Returns the number of removed entries. Does nothing for unbounded retention.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let Some(window) = self.retention.window() else {
            return 0;
        };
        let Some(cutoff) = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| now.checked_sub_signed(w))
        else {
            return 0;
        };
        let Some(mut entries) = self.lock_entries() else {
            return 0;
        };

        let before = entries.len();
        entries.retain(|hash, entry| {
            let keep = entry.last_used_at >= cutoff;
            if !keep {
                info!(hash = %hash, "Removing RDF from cache");
            }
            keep
        });
        let removed = before - entries.len();

        self.counters
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.lock_entries().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the activity counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Spawns the periodic sweep task on the current tokio runtime
    ///
    /// The task ticks every [`CacheStore::sweep_interval`]. It holds only a weak reference, so it also ends once the store is
    /// dropped. Calling this again replaces (and stops) the previous task.
    /// Without a runtime no task is started and entries are only evicted by
    /// explicit [`CacheStore::sweep`] calls.
    pub fn start_sweeper(self: &Arc<Self>) {
        if self.retention.window().is_none() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime available, cache sweep not scheduled");
            return;
        };

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let store = Arc::downgrade(self);
        let interval = self.sweep_interval;

        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match store.upgrade() {
                            Some(store) => {
                                store.sweep();
                            }
                            None => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
            debug!("Cache sweep task stopped");
        });

        if let Ok(mut slot) = self.shutdown_tx.lock() {
            *slot = Some(shutdown_tx);
        }
    }

    /// Whether a sweep task is currently scheduled
    pub fn is_sweeping(&self) -> bool {
        self.shutdown_tx
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    /// Stops the sweep task; safe to call repeatedly or when none was started
    pub fn stop(&self) {
        if let Ok(mut slot) = self.shutdown_tx.lock() {
            if slot.take().is_some() {
                debug!("Stopping cache sweep");
            }
        }
    }
}
