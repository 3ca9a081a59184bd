//! Background drivers: priority rebuild on tip advance, transaction gossip.
//!
//! Both are plain periodic threads with a cooperative stop flag, woken
//! early through a condvar where it matters. Per-pass failures are logged
//! and swallowed; the drivers never abort the process.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use tarn_core::types::Hash256;

use crate::pool::MemPool;

/// Expiring bounded cache of recently handled ids.
///
/// Entries live for `ttl` and the cache never exceeds `capacity` (oldest
/// entries are evicted first). Expiry is lazy, applied on insertion.
pub struct SeenCache {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<Hash256, Instant>,
    order: VecDeque<(Hash256, Instant)>,
}

impl SeenCache {
    /// Create a cache with the given capacity and entry lifetime.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Mark `id` as seen. Returns `true` if it was not already present.
    pub fn insert(&mut self, id: Hash256) -> bool {
        let now = Instant::now();
        self.purge_expired(now);

        if self.entries.contains_key(&id) {
            return false;
        }

        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some((oldest, at)) => {
                    if self.entries.get(&oldest) == Some(&at) {
                        self.entries.remove(&oldest);
                    }
                }
                None => break,
            }
        }

        self.entries.insert(id, now);
        self.order.push_back((id, now));
        true
    }

    /// Whether `id` is currently marked seen.
    pub fn contains(&self, id: &Hash256) -> bool {
        match self.entries.get(id) {
            Some(at) => at.elapsed() < self.ttl,
            None => false,
        }
    }

    /// Number of live entries (including any not yet lazily expired).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&mut self, now: Instant) {
        while let Some(&(id, at)) = self.order.front() {
            if now.duration_since(at) < self.ttl {
                break;
            }
            self.order.pop_front();
            if self.entries.get(&id) == Some(&at) {
                self.entries.remove(&id);
            }
        }
    }
}

/// Rebuilds the priority map when the chain ingestor signals a new tip.
///
/// Sleeps up to the configured period but is woken immediately by
/// [`MemPool::on_new_tip`]; consecutive passes are spaced by at least the
/// configured floor.
pub struct TipDriver {
    stop: Arc<AtomicBool>,
    pool: Arc<MemPool>,
    handle: Option<JoinHandle<()>>,
}

impl TipDriver {
    /// Start the driver thread.
    pub fn spawn(pool: Arc<MemPool>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            let pool = Arc::clone(&pool);
            thread::spawn(move || run_tip_loop(&pool, &stop))
        };
        Self {
            stop,
            pool,
            handle: Some(handle),
        }
    }

    /// Stop the driver and wait for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.pool.notify_tip_waiters();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TipDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.pool.notify_tip_waiters();
    }
}

fn run_tip_loop(pool: &MemPool, stop: &AtomicBool) {
    let period = pool.config().tip_check_period;
    let floor = pool.config().tip_check_floor;

    while !stop.load(Ordering::Relaxed) {
        pool.wait_for_tip_signal(period);
        if stop.load(Ordering::Relaxed) {
            break;
        }
        if let Some(root) = pool.take_pending_tip() {
            debug!(%root, "tip advanced, rebuilding priority map");
            pool.rebuild_priority_map(root);
        }
        thread::sleep(floor);
    }
}

/// Periodically samples one random pool transaction and broadcasts it to
/// peers, deduplicated through an expiring seen-cache.
///
/// Yields a bounded re-broadcast of a slowly rotating sample; does nothing
/// until a peer layer is attached to the pool.
pub struct GossipDriver {
    stop: Arc<AtomicBool>,
    park: Arc<(Mutex<()>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl GossipDriver {
    /// Start the driver thread.
    pub fn spawn(pool: Arc<MemPool>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let park = Arc::new((Mutex::new(()), Condvar::new()));
        let handle = {
            let stop = Arc::clone(&stop);
            let park = Arc::clone(&park);
            thread::spawn(move || run_gossip_loop(&pool, &stop, &park))
        };
        Self {
            stop,
            park,
            handle: Some(handle),
        }
    }

    /// Stop the driver and wait for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.park.1.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GossipDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.park.1.notify_all();
    }
}

fn run_gossip_loop(pool: &MemPool, stop: &AtomicBool, park: &(Mutex<()>, Condvar)) {
    let config = pool.config();
    let period = config.gossip_period.max(config.gossip_floor);
    let mut seen = SeenCache::new(config.gossip_cache_capacity, config.gossip_cache_ttl);

    while !stop.load(Ordering::Relaxed) {
        run_gossip_pass(pool, &mut seen);

        let (lock, cv) = park;
        let mut guard = lock.lock();
        if !stop.load(Ordering::Relaxed) {
            let _ = cv.wait_for(&mut guard, period);
        }
    }
}

fn run_gossip_pass(pool: &MemPool, seen: &mut SeenCache) {
    let Some(peerage) = pool.peerage() else {
        return;
    };
    let Some(info) = pool.random_pool_tx() else {
        return;
    };
    if seen.insert(info.txid()) {
        if let Err(error) = peerage.broadcast(info.transaction()) {
            warn!(%error, txid = %info.txid(), "transaction broadcast failed");
        }
    }
}
