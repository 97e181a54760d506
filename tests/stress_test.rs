// Load tests for the accounting guarantees: nothing submitted may vanish,
// whichever shutdown mode ends the run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use aging_pool::{AgingPolicy, AgingPool, PoolConfig, ShutdownMode};

#[test]
fn no_task_is_lost_when_draining_under_load() {
    let config = PoolConfig {
        workers: 4,
        aging: AgingPolicy {
            interval: Duration::from_millis(10),
            increment: 5,
            ceiling: Some(500),
        },
        monitor_tick: Duration::from_millis(5),
    };
    let pool = AgingPool::new(config).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));

    const TASKS: usize = 500;
    for index in 0..TASKS {
        let completed = completed.clone();
        let priority = ((index * 31) % 100) as i64;
        pool.submit_detached(priority, None, move || {
            if index % 7 == 0 {
                thread::sleep(Duration::from_millis(1));
            }
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown(ShutdownMode::Drain);

    assert_eq!(completed.load(Ordering::SeqCst), TASKS);
    let stats = pool.stats();
    assert_eq!(stats.submitted, TASKS as u64);
    assert_eq!(stats.executed, TASKS as u64);
    assert_eq!(stats.cancelled, 0);
    assert_eq!(stats.queued, 0);
}

#[test]
fn immediate_shutdown_accounts_for_every_task() {
    let config = PoolConfig {
        workers: 2,
        aging: AgingPolicy::disabled(),
        monitor_tick: Duration::from_millis(50),
    };
    let pool = AgingPool::new(config).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));

    const TASKS: usize = 200;
    for index in 0..TASKS {
        let completed = completed.clone();
        pool.submit_detached((index % 50) as i64, None, move || {
            thread::sleep(Duration::from_micros(200));
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.shutdown(ShutdownMode::Immediate);

    let stats = pool.stats();
    assert_eq!(stats.submitted, TASKS as u64);
    assert_eq!(
        stats.executed + stats.failed + stats.cancelled,
        stats.submitted,
        "accounting must cover every submission: {stats:?}"
    );
    assert_eq!(stats.executed as usize, completed.load(Ordering::SeqCst));
    assert_eq!(stats.queued, 0);
}

#[test]
fn concurrent_submitters_all_get_their_results() {
    let config = PoolConfig {
        workers: 4,
        aging: AgingPolicy {
            interval: Duration::from_millis(20),
            increment: 10,
            ceiling: None,
        },
        monitor_tick: Duration::from_millis(10),
    };
    let pool = Arc::new(AgingPool::new(config).unwrap());

    let submitters: Vec<_> = (0..4i64)
        .map(|submitter| {
            let pool = pool.clone();
            thread::spawn(move || {
                let mut handles = Vec::new();
                for index in 0..50i64 {
                    let handle = pool
                        .submit(index % 10, None, move || Ok(submitter * 1000 + index))
                        .unwrap();
                    handles.push((submitter * 1000 + index, handle));
                }
                for (expected, handle) in handles {
                    assert_eq!(handle.wait().unwrap(), expected);
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }

    pool.shutdown(ShutdownMode::Drain);
    assert_eq!(pool.stats().executed, 200);
}
