use std::num::NonZeroUsize;
use std::time::Duration;

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use orderly::engine::{RunOptions, Runner};
use orderly_test_utils::{Event, RecordingSink};

/// One generated work item: how long it takes, how many objects it writes,
/// and whether it fails afterwards.
#[derive(Debug, Clone)]
struct Job {
    delay_ms: u64,
    objects: usize,
    fails: bool,
}

fn job_strategy() -> impl Strategy<Value = Job> {
    (0u64..15, 0usize..4, proptest::bool::weighted(0.25)).prop_map(|(delay_ms, objects, fails)| Job {
        delay_ms,
        objects,
        fails,
    })
}

fn expected_data(jobs: &[Job]) -> Vec<Event<String>> {
    let mut out = Vec::new();
    for (i, job) in jobs.iter().enumerate() {
        for j in 0..job.objects {
            out.push(Event::Object(format!("{i}:{j}")));
        }
        if job.fails {
            out.push(Event::Error(format!("job {i} failed")));
        }
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn data_output_is_replayed_in_submission_order(
        jobs in proptest::collection::vec(job_strategy(), 1..10),
        max in 1usize..5,
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let (summary, sink, peak) = rt.block_on(async {
            let runner: Runner<String> = Runner::new(
                NonZeroUsize::new(max).unwrap(),
                CancellationToken::new(),
                RunOptions {
                    poll_interval: Duration::from_millis(3),
                    emit_summary: false,
                },
            );

            for (i, job) in jobs.iter().cloned().enumerate() {
                runner.submit(move |w| async move {
                    tokio::time::sleep(Duration::from_millis(job.delay_ms)).await;
                    for j in 0..job.objects {
                        w.write_object(format!("{i}:{j}"));
                    }
                    if job.fails {
                        w.write_error(anyhow::anyhow!("job {i} failed"));
                        anyhow::bail!("job {i} failed");
                    }
                    anyhow::Ok(())
                });
            }

            let mut sink = RecordingSink::new();
            let summary = tokio::time::timeout(Duration::from_secs(10), runner.run(&mut sink))
                .await
                .expect("run timed out")
                .unwrap();
            let peak = runner.scheduler().stats().peak_active;
            (summary, sink, peak)
        });

        let failures = jobs.iter().filter(|j| j.fails).count() as u64;
        prop_assert_eq!(sink.data(), expected_data(&jobs));
        prop_assert_eq!(summary.total, jobs.len() as u64);
        prop_assert_eq!(summary.failed, failures);
        prop_assert_eq!(summary.finished + summary.failed + summary.skipped, summary.total);
        prop_assert!(peak <= max);
    }
}
