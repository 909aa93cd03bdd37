//! [`Worker`]: the single-threaded task loop described in spec §4.3.
//!
//! Workers are fungible — any worker can serve any user's job — so the
//! only state a worker needs is an inbox and a back-reference to its
//! pool for idle/retirement bookkeeping. Ordering per user is enforced
//! upstream by the dispatcher, never by worker affinity.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::job::Job;
use crate::pool::PoolInner;

/// Identifies one worker task for logging and idle-queue bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(Uuid);

impl WorkerId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A lease on a running worker, handed to the dispatcher by
/// [`crate::pool::Pool::acquire`] and used to hand off exactly one job.
pub struct WorkerHandle {
    pub(crate) id: WorkerId,
    tx: mpsc::Sender<Job>,
}

impl WorkerHandle {
    /// Hand a job to this worker. Errors only if the worker's task has
    /// already exited (e.g. raced with a sweep retirement).
    pub(crate) async fn send(&self, job: Job) -> Result<(), Job> {
        self.tx.send(job).await.map_err(|e| e.0)
    }

    /// Non-blocking retirement signal used by the idle sweeper, which
    /// runs outside an async context. The channel has capacity for
    /// exactly one job and the worker is idle (blocked in `recv`), so
    /// this always succeeds unless the worker has already exited.
    pub(crate) fn send_stop(&self) -> Result<(), ()> {
        self.tx.try_send(Job::Stop).map_err(|_| ())
    }
}

/// Spawn one worker task and return the handle the pool tracks for it.
///
/// The task loop mirrors spec §4.3: mark idle, receive one job, switch
/// on its kind, repeat. A job whose body panics is caught by running it
/// on its own `tokio::spawn`; a panic there retires this worker and the
/// pool replenishes on the next `acquire` (spec §4.2, "Failure semantics").
///
/// `start_idle` distinguishes the pool's two spawn paths: workers
/// pre-spawned to fill the configured floor must enter the idle queue
/// immediately so `acquire` can find them; a worker spawned on-demand
/// inside `acquire` is handed straight to that caller and must wait for
/// its first job without first publishing itself as idle (spec §4.2,
/// "spawns a new one instead of blocking").
pub(crate) fn spawn(pool: Arc<PoolInner>, start_idle: bool) -> Arc<WorkerHandle> {
    let (tx, rx) = mpsc::channel(1);
    let handle = Arc::new(WorkerHandle {
        id: WorkerId::new(),
        tx,
    });
    tokio::spawn(run(pool, handle.clone(), rx, start_idle));
    handle
}

async fn run(
    pool: Arc<PoolInner>,
    handle: Arc<WorkerHandle>,
    mut rx: mpsc::Receiver<Job>,
    mut mark_idle_before_recv: bool,
) {
    loop {
        if mark_idle_before_recv {
            pool.mark_idle(handle.clone()).await;
        }

        match rx.recv().await {
            None | Some(Job::Stop) => {
                debug!(worker_id = %handle.id, "worker retiring");
                pool.retire(&handle).await;
                return;
            },
            Some(Job::Work { run, .. }) => {
                if tokio::spawn(run()).await.is_err() {
                    warn!(worker_id = %handle.id, "worker job panicked, retiring");
                    pool.retire(&handle).await;
                    return;
                }
            },
        }

        mark_idle_before_recv = true;
    }
}
