mod common;
use crate::common::{Gate, TestResult, init_tracing, scheduler, wait_until, with_timeout};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use orderly::types::{TaskId, TaskOutcome, TaskState};

#[tokio::test]
async fn queued_work_waits_for_a_free_slot() -> TestResult {
    init_tracing();
    let s = scheduler(2);
    let gates = Gate::many(5);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    for gate in gates.iter().cloned() {
        let in_flight = Arc::clone(&in_flight);
        let max_seen = Arc::clone(&max_seen);
        s.submit(move |_id| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            gate.wait().await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            anyhow::Ok(())
        });
    }

    with_timeout(wait_until(|| s.running().len() == 2)).await;
    assert_eq!(s.running(), vec![TaskId(0), TaskId(1)]);
    assert_eq!(s.pending(), vec![TaskId(2), TaskId(3), TaskId(4)]);
    assert_eq!(s.state_of(TaskId(4)), Some(TaskState::Queued));

    // Finishing #0 admits #2 and nothing else.
    gates[0].open();
    with_timeout(wait_until(|| s.running() == vec![TaskId(1), TaskId(2)])).await;
    assert_eq!(s.pending_len(), 2);
    assert_eq!(
        s.state_of(TaskId(0)),
        Some(TaskState::Done(TaskOutcome::Succeeded))
    );

    for gate in &gates {
        gate.open();
    }
    assert!(s.await_all_complete(Duration::from_secs(2), &CancellationToken::new()).await);

    let stats = s.stats();
    assert_eq!(stats.finished, 5);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.peak_active, 2);
    assert!(max_seen.load(Ordering::SeqCst) <= 2);
    assert!(stats.all_accounted_for());
    Ok(())
}

#[tokio::test]
async fn admission_is_fifo() -> TestResult {
    init_tracing();
    let s = scheduler(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..6 {
        let started = Arc::clone(&started);
        s.submit(move |id| async move {
            started.lock().unwrap().push(id);
            tokio::task::yield_now().await;
            anyhow::Ok(())
        });
    }

    assert!(s.await_all_complete(Duration::from_secs(2), &CancellationToken::new()).await);
    let started = started.lock().unwrap().clone();
    assert_eq!(started, (0..6).map(TaskId).collect::<Vec<_>>());
    assert_eq!(s.stats().peak_active, 1);
    Ok(())
}

#[tokio::test]
async fn failures_free_their_slot() -> TestResult {
    init_tracing();
    let s = scheduler(1);
    let failures = Arc::new(Mutex::new(Vec::new()));
    {
        let failures = Arc::clone(&failures);
        s.set_failure_observer(move |id: TaskId, err: &anyhow::Error| {
            failures.lock().unwrap().push((id, err.to_string()));
        });
    }

    for i in 0..4u64 {
        s.submit(move |_id| async move {
            if i % 2 == 0 {
                anyhow::bail!("job {i} failed");
            }
            anyhow::Ok(())
        });
    }

    assert!(s.await_all_complete(Duration::from_secs(2), &CancellationToken::new()).await);
    let stats = s.stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.finished, 2);
    assert_eq!(stats.total, stats.completed());

    let failures = failures.lock().unwrap().clone();
    let ids: Vec<_> = failures.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![TaskId(0), TaskId(2)]);
    assert_eq!(failures[1].1, "job 2 failed");
    Ok(())
}

#[tokio::test]
async fn completion_wait_times_out_while_work_runs() -> TestResult {
    init_tracing();
    let s = scheduler(1);
    let gate = Gate::new();
    {
        let gate = gate.clone();
        s.submit(move |_id| async move {
            gate.wait().await;
            anyhow::Ok(())
        });
    }

    let done = s
        .await_all_complete(Duration::from_millis(20), &CancellationToken::new())
        .await;
    assert!(!done);

    // Arming is one-shot; a second wait still sees the outstanding item.
    gate.open();
    assert!(s.await_all_complete(Duration::from_secs(2), &CancellationToken::new()).await);
    Ok(())
}
