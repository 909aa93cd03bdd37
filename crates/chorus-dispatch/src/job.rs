//! The unit of work handed from the [`crate::Dispatcher`] to a
//! [`crate::pool::Pool`] worker (spec §3, "Job").
//!
//! A job carries no conversation-specific payload itself: the
//! dispatcher and pool are generic over *who* owns a unit of work
//! (`UserId`, for fairness) and *what running it means* is left to the
//! caller as a boxed closure. This keeps scheduling fully decoupled
//! from the Init/Stream semantics that live in the runtime crate.

use std::future::Future;
use std::pin::Pin;

use chorus_core::UserId;

/// A boxed, one-shot unit of async work. The closure itself owns its
/// reply channel — the dispatcher never inspects a job's outcome.
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A thunk that produces a job's future when the worker is ready to run it.
pub type JobFn = Box<dyn FnOnce() -> JobFuture + Send>;

/// A unit of work routed through the dispatcher.
pub enum Job {
    /// Real work submitted by a caller, attributed to `user_id` for
    /// fair round-robin scheduling.
    Work {
        /// The submitting user, used only for fairness bookkeeping.
        user_id: UserId,
        /// The work itself.
        run: JobFn,
    },
    /// Internal retirement signal sent to a worker (spec §4.3): the
    /// worker retires and exits its loop instead of waiting for more work.
    Stop,
}

impl Job {
    /// Build a job from an async block, wrapping it in the boxed shape
    /// workers expect.
    pub fn work<F, Fut>(user_id: UserId, run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::Work {
            user_id,
            run: Box::new(move || Box::pin(run())),
        }
    }

    /// The owning user, if this is real work (`None` for `Stop`).
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Work { user_id, .. } => Some(*user_id),
            Self::Stop => None,
        }
    }
}
