mod common;
use crate::common::{Event, RecordingSink, TestResult, init_tracing, obj, runner, with_timeout};

use std::num::NonZeroUsize;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use orderly::engine::{RunOptions, Runner, SUMMARY_ACTIVITY_ID};

#[tokio::test]
async fn output_follows_submission_order_not_completion_order() -> TestResult {
    init_tracing();
    let runner = runner(3);
    for i in 0..6u64 {
        runner.submit(move |w| async move {
            // Later submissions finish first.
            tokio::time::sleep(Duration::from_millis(5 * (6 - i))).await;
            w.write_object(format!("t{i}-a"));
            w.write_object(format!("t{i}-b"));
            anyhow::Ok(())
        });
    }

    let mut sink = RecordingSink::new();
    let summary = with_timeout(runner.run(&mut sink)).await?;

    let expected: Vec<String> = (0..6)
        .flat_map(|i| [format!("t{i}-a"), format!("t{i}-b")])
        .collect();
    assert_eq!(sink.objects(), expected);
    assert_eq!(summary.total, 6);
    assert_eq!(summary.finished, 6);
    assert!(summary.is_success());
    assert!(runner.scheduler().stats().peak_active <= 3);
    Ok(())
}

#[tokio::test]
async fn failed_task_reports_in_its_own_slot() -> TestResult {
    init_tracing();
    let runner = runner(2);
    for i in 0..3u64 {
        runner.submit(move |w| async move {
            if i == 1 {
                w.write_error(anyhow::anyhow!("boom"));
                anyhow::bail!("task {i} failed");
            }
            w.write_object(format!("ok {i}"));
            anyhow::Ok(())
        });
    }

    let mut sink = RecordingSink::new();
    let summary = with_timeout(runner.run(&mut sink)).await?;

    assert_eq!(
        sink.data(),
        vec![obj("ok 0"), Event::Error("boom".to_string()), obj("ok 2")]
    );
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.finished, 2);
    assert_eq!(summary.total, summary.finished + summary.failed + summary.skipped);
    assert!(!summary.is_success());
    Ok(())
}

#[tokio::test]
async fn panicking_work_is_a_failure() -> TestResult {
    init_tracing();
    let runner = runner(2);
    runner.submit(|w| async move {
        w.write_object("before".to_string());
        if w.id().get() == 0 {
            panic!("work item blew up");
        }
        anyhow::Ok(())
    });
    runner.submit(|w| async move {
        w.write_object("after".to_string());
        anyhow::Ok(())
    });

    let mut sink = RecordingSink::new();
    let summary = with_timeout(runner.run(&mut sink)).await?;

    assert_eq!(sink.objects(), vec!["before".to_string(), "after".to_string()]);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.finished, 1);
    Ok(())
}

#[tokio::test]
async fn summary_record_is_emitted_last() -> TestResult {
    init_tracing();
    let runner: Runner<String> = Runner::new(
        NonZeroUsize::new(2).unwrap(),
        CancellationToken::new(),
        RunOptions {
            poll_interval: Duration::from_millis(5),
            emit_summary: true,
        },
    );
    runner.submit(|w| async move {
        w.write_object("only".to_string());
        anyhow::Ok(())
    });

    let mut sink = RecordingSink::new();
    with_timeout(runner.run(&mut sink)).await?;

    let progress = sink.progress();
    let summary = progress.last().expect("summary record");
    assert_eq!(summary.activity_id, SUMMARY_ACTIVITY_ID);
    assert!(summary.completed);
    assert!(summary.status.contains("finished: 1"));
    Ok(())
}

#[tokio::test]
async fn run_with_no_work_finishes_at_once() -> TestResult {
    init_tracing();
    let runner = runner(1);
    let mut sink = RecordingSink::new();
    let summary = with_timeout(runner.run(&mut sink)).await?;
    assert_eq!(summary.total, 0);
    assert!(summary.is_success());
    assert!(sink.events().is_empty());
    Ok(())
}

#[tokio::test]
async fn stopping_sink_ends_the_run_early() -> TestResult {
    init_tracing();
    let runner = runner(2);
    for i in 0..4u64 {
        runner.submit(move |w| async move {
            w.write_object(format!("n{i}"));
            anyhow::Ok(())
        });
    }

    let mut sink = RecordingSink::new().stop_after(2);
    let summary = with_timeout(runner.run(&mut sink)).await?;

    assert!(summary.stopped_early);
    assert!(!summary.is_success());
    assert_eq!(sink.objects(), vec!["n0".to_string(), "n1".to_string()]);
    Ok(())
}

#[tokio::test]
async fn sink_failure_drops_one_payload_and_the_run_goes_on() -> TestResult {
    init_tracing();
    let runner = runner(2);
    runner.submit(|w| async move {
        for line in ["keep 1", "reject", "keep 2"] {
            w.write_object(line.to_string());
        }
        anyhow::Ok(())
    });
    runner.submit(|w| async move {
        w.write_object("next task".to_string());
        anyhow::Ok(())
    });

    let mut sink = RecordingSink::new().fail_on("reject".to_string());
    let summary = with_timeout(runner.run(&mut sink)).await?;

    assert_eq!(
        sink.objects(),
        vec!["keep 1".to_string(), "keep 2".to_string(), "next task".to_string()]
    );
    assert!(!summary.stopped_early);
    assert_eq!(summary.finished, 2);
    Ok(())
}
