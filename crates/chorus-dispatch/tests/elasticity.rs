//! Pool elasticity integration test (spec §8, property 9).

use std::sync::Arc;
use std::time::Duration;

use chorus_dispatch::{Pool, PoolConfig};
use tokio::sync::Notify;

#[tokio::test(start_paused = true)]
async fn running_rises_to_burst_size_and_decays_after_idle_timeout() {
    let idle_timeout = Duration::from_millis(100);
    let pool = Pool::new(PoolConfig {
        min_workers: 2,
        max_workers: 5,
        worker_idle_timeout: idle_timeout,
    });
    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(pool.running(), 2);

    // Burst of 4 concurrent turns (> min, <= max).
    let release = Arc::new(Notify::new());
    let mut handles = Vec::new();
    for _ in 0..4 {
        let worker = pool.acquire().await;
        let release = release.clone();
        handles.push(tokio::spawn(async move {
            release.notified().await;
            worker
        }));
    }
    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(pool.running(), 4);
    assert_eq!(pool.min_dynamic(), 4);

    release.notify_waiters();
    for handle in handles {
        let _ = handle.await;
    }

    // Immediately after the burst, running workers are kept around for
    // the retention window even though they're idle again.
    tokio::time::advance(Duration::from_millis(50)).await;
    assert!(pool.running() >= 2);

    // Past the retention window (60s floor) and a couple of idle-timeout
    // sweeps, the pool decays back to its configured minimum.
    tokio::time::advance(Duration::from_secs(65)).await;
    tokio::time::advance(idle_timeout * 2).await;
    assert_eq!(pool.min_dynamic(), 2);
}
