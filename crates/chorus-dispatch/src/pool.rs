//! The elastic worker [`Pool`] (spec §4.2).
//!
//! Maintains between `min_workers` and `max_workers` running workers,
//! expanding on demand and contracting after an idle period, while a
//! dynamic floor (`min_dynamic`) prevents thrashing: a burst that
//! spawns workers above the configured floor raises `min_dynamic` for a
//! retention window before the idle sweeper is allowed to decay it back
//! down, so a short dip after a spike doesn't immediately retire
//! workers that will likely be needed again within seconds.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::worker::{self, WorkerHandle, WorkerId};

/// Static configuration for a [`Pool`] (part of spec §6's `DispatcherConfig`).
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Configured floor (`minBase`); the sweeper never retires below this.
    pub min_workers: usize,
    /// Hard ceiling on concurrently running workers.
    pub max_workers: usize,
    /// How long an idle worker may sit before becoming eligible for retirement,
    /// and the sweeper's tick cadence.
    pub worker_idle_timeout: Duration,
}

impl PoolConfig {
    /// How long a burst-induced boost to `min_dynamic` is held before the
    /// sweeper may decay it — the larger of the idle timeout and 60s
    /// (spec §4.2).
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.worker_idle_timeout.max(Duration::from_secs(60))
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 3,
            max_workers: 10,
            worker_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

struct IdleEntry {
    handle: Arc<WorkerHandle>,
    since: Instant,
}

pub(crate) struct PoolInner {
    config: PoolConfig,
    idle: Mutex<VecDeque<IdleEntry>>,
    running: AtomicUsize,
    min_dynamic: AtomicUsize,
    boost_until: Mutex<Option<Instant>>,
    idle_notify: Notify,
}

impl PoolInner {
    fn note_spawned(&self) {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        let min_dynamic = self.min_dynamic.load(Ordering::SeqCst);
        if running > min_dynamic {
            self.min_dynamic.store(running, Ordering::SeqCst);
            let mut boost_until = self
                .boost_until
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *boost_until = Some(Instant::now() + self.config.retention());
        }
    }

    pub(crate) async fn mark_idle(&self, handle: Arc<WorkerHandle>) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.push_back(IdleEntry {
            handle,
            since: Instant::now(),
        });
        drop(idle);
        self.idle_notify.notify_one();
    }

    pub(crate) async fn retire(&self, handle: &WorkerHandle) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.retain(|entry| entry.handle.id != handle.id);
    }

    fn try_take_idle(&self) -> Option<Arc<WorkerHandle>> {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        idle.pop_front().map(|entry| entry.handle)
    }

    fn sweep(&self) {
        let now = Instant::now();
        {
            let mut boost_until = self
                .boost_until
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(until) = *boost_until {
                if now >= until {
                    let running = self.running.load(Ordering::SeqCst);
                    let floor = running.max(self.config.min_workers);
                    self.min_dynamic.store(floor, Ordering::SeqCst);
                    *boost_until = None;
                }
            }
        }

        let min_dynamic = self.min_dynamic.load(Ordering::SeqCst);
        let mut to_stop = Vec::new();
        {
            let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
            let timeout = self.config.worker_idle_timeout;
            let mut survivors = VecDeque::with_capacity(idle.len());
            while let Some(entry) = idle.pop_front() {
                let running = self.running.load(Ordering::SeqCst);
                let idle_long_enough = now.duration_since(entry.since) >= timeout;
                if idle_long_enough && running.saturating_sub(to_stop.len()) > min_dynamic {
                    to_stop.push(entry.handle);
                } else {
                    survivors.push_back(entry);
                }
            }
            *idle = survivors;
        }

        for handle in to_stop {
            debug!(worker_id = %handle.id, "sweeper retiring idle worker");
            let _ = handle.send_stop();
        }
        // The worker's own loop decrements `running` via `retire()` once
        // it processes the Stop job; we don't double-count it here.
    }
}

/// An elastic pool of workers (spec §4.2).
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool, pre-spawning `config.min_workers` idle workers and
    /// starting its background idle sweeper.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let inner = Arc::new(PoolInner {
            config,
            idle: Mutex::new(VecDeque::new()),
            running: AtomicUsize::new(0),
            min_dynamic: AtomicUsize::new(config.min_workers),
            boost_until: Mutex::new(None),
            idle_notify: Notify::new(),
        });

        let pool = Self { inner: inner.clone() };
        for _ in 0..config.min_workers {
            pool.spawn_worker(true);
        }

        tokio::spawn(sweep_loop(inner));
        pool
    }

    /// Spawn a new worker. `start_idle` is true for workers pre-spawned
    /// to fill the configured floor (they must publish themselves as
    /// idle so `acquire` can find them) and false for workers spawned
    /// on-demand inside `acquire`, which are handed directly to the
    /// caller and must not race their own first idle announcement
    /// against that hand-off.
    fn spawn_worker(&self, start_idle: bool) -> Arc<WorkerHandle> {
        let handle = worker::spawn(self.inner.clone(), start_idle);
        self.inner.note_spawned();
        handle
    }

    /// Block until an idle worker is available, spawning a new one
    /// instead of blocking if `running < max_workers` (spec §4.2).
    pub async fn acquire(&self) -> Arc<WorkerHandle> {
        self.replenish_floor();
        loop {
            if let Some(handle) = self.inner.try_take_idle() {
                trace!(worker_id = %handle.id, "acquired idle worker");
                return handle;
            }

            if self.inner.running.load(Ordering::SeqCst) < self.inner.config.max_workers {
                return self.spawn_worker(false);
            }

            self.inner.idle_notify.notified().await;
        }
    }

    /// Top up the pool back to `min_dynamic` if a panicked worker left
    /// `running` below the floor (spec §4.2: "a worker that panics must
    /// retire itself and the pool must replenish back to `minBase` on
    /// the next `acquire`"). `retire()` only ever decrements `running`;
    /// this is the one place that grows it back out, so every call to
    /// `acquire` — not just the one that happens to race the panic —
    /// restores the floor before trying to hand out a worker.
    fn replenish_floor(&self) {
        let min_dynamic = self.inner.min_dynamic.load(Ordering::SeqCst);
        while self.inner.running.load(Ordering::SeqCst) < min_dynamic {
            self.spawn_worker(true);
        }
    }

    /// Currently running worker count, for tests and diagnostics.
    #[must_use]
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Current effective floor (`minDynamic`), for tests and diagnostics.
    #[must_use]
    pub fn min_dynamic(&self) -> usize {
        self.inner.min_dynamic.load(Ordering::SeqCst)
    }
}

async fn sweep_loop(inner: Arc<PoolInner>) {
    let mut ticker = tokio::time::interval(inner.config.worker_idle_timeout);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        inner.sweep();
    }
}
