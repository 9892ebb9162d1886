#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use orderly::engine::{RunOptions, Runner};
use orderly::sched::BoundedScheduler;

pub use orderly_test_utils::{Event, Gate, RecordingSink, init_tracing, wait_until, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn scheduler(max: usize) -> BoundedScheduler {
    BoundedScheduler::new(NonZeroUsize::new(max).unwrap(), CancellationToken::new())
}

/// Runner with a short poll interval and no summary record.
pub fn runner(max: usize) -> Runner<String> {
    Runner::new(
        NonZeroUsize::new(max).unwrap(),
        CancellationToken::new(),
        RunOptions {
            poll_interval: Duration::from_millis(5),
            emit_summary: false,
        },
    )
}

pub fn obj(s: &str) -> Event<String> {
    Event::Object(s.to_string())
}
