//! The [`Dispatcher`]: round-robin fair queueing across users, feeding
//! jobs to idle workers (spec §4.4).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chorus_core::{ChorusError, ChorusResult, UserId};
use tokio::sync::{Mutex, Notify};
use tracing::trace;

use crate::job::{Job, JobFn};
use crate::pool::{Pool, PoolConfig};

/// Configuration for a [`Dispatcher`] and the [`Pool`] it owns (spec §6,
/// `DispatcherConfig`). Defaults match the spec's stated values.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Floor for the worker pool.
    pub min_workers: usize,
    /// Ceiling for the worker pool.
    pub max_workers: usize,
    /// Bounded intake queue capacity — the total number of jobs that
    /// may be admitted but not yet handed to a worker.
    pub queue_size: usize,
    /// Idle-worker retirement threshold and sweeper cadence.
    pub worker_idle_timeout: Duration,
    /// How long `enqueue_job` waits for intake capacity before failing
    /// with [`ChorusError::DispatcherBusy`].
    pub enqueue_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_workers: 3,
            max_workers: 10,
            queue_size: 100,
            worker_idle_timeout: Duration::from_secs(30 * 60),
            enqueue_timeout: Duration::from_secs(1),
        }
    }
}

impl DispatcherConfig {
    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_workers: self.min_workers,
            max_workers: self.max_workers,
            worker_idle_timeout: self.worker_idle_timeout,
        }
    }

    /// Layer `CHORUS_MIN_WORKERS` / `CHORUS_MAX_WORKERS` / `CHORUS_QUEUE_SIZE`
    /// / `CHORUS_WORKER_IDLE_TIMEOUT_SECS` / `CHORUS_ENQUEUE_TIMEOUT_MS` over
    /// the defaults. An unset or unparseable variable falls back to the
    /// default rather than failing startup.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_workers: env_usize("CHORUS_MIN_WORKERS", defaults.min_workers),
            max_workers: env_usize("CHORUS_MAX_WORKERS", defaults.max_workers),
            queue_size: env_usize("CHORUS_QUEUE_SIZE", defaults.queue_size),
            worker_idle_timeout: Duration::from_secs(env_u64(
                "CHORUS_WORKER_IDLE_TIMEOUT_SECS",
                defaults.worker_idle_timeout.as_secs(),
            )),
            enqueue_timeout: Duration::from_millis(env_u64(
                "CHORUS_ENQUEUE_TIMEOUT_MS",
                defaults.enqueue_timeout.as_millis() as u64,
            )),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

struct DispatchState {
    queues: HashMap<UserId, VecDeque<Job>>,
    ready: VecDeque<UserId>,
    enqueued: HashSet<UserId>,
    queued_count: usize,
}

impl DispatchState {
    fn new() -> Self {
        Self {
            queues: HashMap::new(),
            ready: VecDeque::new(),
            enqueued: HashSet::new(),
            queued_count: 0,
        }
    }

    fn admit(&mut self, job: Job) {
        let Some(user_id) = job.user_id() else {
            return;
        };
        self.queues.entry(user_id).or_default().push_back(job);
        self.queued_count += 1;
        if self.enqueued.insert(user_id) {
            self.ready.push_back(user_id);
        }
    }

    /// Pop the next job to run per the fair round-robin rule (spec §4.4
    /// dispatch loop): take the ready list's front user, take its head
    /// job, and re-queue the user at the back if it still has work.
    fn pop_next(&mut self) -> Option<Job> {
        let user_id = self.ready.pop_front()?;
        let job = self.queues.get_mut(&user_id).and_then(VecDeque::pop_front);
        if job.is_some() {
            self.queued_count = self.queued_count.saturating_sub(1);
        }

        let still_has_work = self
            .queues
            .get(&user_id)
            .is_some_and(|q| !q.is_empty());

        if still_has_work {
            self.ready.push_back(user_id);
        } else {
            self.queues.remove(&user_id);
            self.enqueued.remove(&user_id);
        }

        job
    }

    fn cancel_user(&mut self, user_id: UserId) {
        if let Some(removed) = self.queues.remove(&user_id) {
            self.queued_count = self.queued_count.saturating_sub(removed.len());
        }
        self.ready.retain(|&id| id != user_id);
        self.enqueued.remove(&user_id);
    }
}

/// Fair per-user job dispatcher over an elastic [`Pool`] (spec §4.4).
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<Mutex<DispatchState>>,
    queue_size: usize,
    enqueue_timeout: Duration,
    job_available: Arc<Notify>,
    space_available: Arc<Notify>,
}

impl Dispatcher {
    /// Build a dispatcher and its worker pool, and start the background
    /// dispatch loop.
    #[must_use]
    pub fn new(config: DispatcherConfig) -> Self {
        let state = Arc::new(Mutex::new(DispatchState::new()));
        let pool = Pool::new(config.pool_config());
        let job_available = Arc::new(Notify::new());
        let space_available = Arc::new(Notify::new());

        tokio::spawn(run_loop(
            state.clone(),
            pool,
            job_available.clone(),
            space_available.clone(),
        ));

        Self {
            state,
            queue_size: config.queue_size,
            enqueue_timeout: config.enqueue_timeout,
            job_available,
            space_available,
        }
    }

    /// Submit work for `user_id`. Blocks up to the configured
    /// `enqueue_timeout` for intake capacity; fails with
    /// [`ChorusError::DispatcherBusy`] if the queue stays full for the
    /// whole window (spec §4.4, "Admission control").
    pub async fn enqueue_job(&self, user_id: UserId, run: JobFn) -> ChorusResult<()> {
        let deadline = tokio::time::Instant::now() + self.enqueue_timeout;
        loop {
            {
                let mut state = self.state.lock().await;
                if state.queued_count < self.queue_size {
                    state.admit(Job::Work { user_id, run });
                    drop(state);
                    self.job_available.notify_one();
                    return Ok(());
                }
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(ChorusError::DispatcherBusy);
            }
            if tokio::time::timeout(remaining, self.space_available.notified())
                .await
                .is_err()
            {
                return Err(ChorusError::DispatcherBusy);
            }
        }
    }

    /// Remove a user's queued (not yet dispatched) jobs. In-flight jobs
    /// already handed to a worker are not interrupted (spec §4.4,
    /// "Cancellation").
    pub async fn cancel_user(&self, user_id: UserId) {
        self.state.lock().await.cancel_user(user_id);
        self.space_available.notify_waiters();
    }
}

async fn run_loop(
    state: Arc<Mutex<DispatchState>>,
    pool: Pool,
    job_available: Arc<Notify>,
    space_available: Arc<Notify>,
) {
    loop {
        let job = loop {
            let mut st = state.lock().await;
            if let Some(job) = st.pop_next() {
                drop(st);
                space_available.notify_waiters();
                break job;
            }
            drop(st);
            job_available.notified().await;
        };

        trace!("dispatch loop handing job to an acquired worker");
        let worker = pool.acquire().await;
        if worker.send(job).await.is_err() {
            tracing::warn!("worker channel closed before job hand-off; job dropped");
        }
    }
}
