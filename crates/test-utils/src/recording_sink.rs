//! An [`OutputSink`] that records everything it receives.

use orderly::output::{OutputSink, ProgressRecord, SinkError};

/// One call into the sink, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    Object(T),
    /// Rendered with `{:#}`.
    Error(String),
    Verbose(String),
    Debug(String),
    Progress(ProgressRecord),
    Confirm { caption: String, message: String },
}

impl<T> Event<T> {
    pub fn is_data(&self) -> bool {
        matches!(self, Event::Object(_) | Event::Error(_) | Event::Verbose(_))
    }
}

/// Recording sink with knobs for the failure paths.
#[derive(Debug)]
pub struct RecordingSink<T> {
    events: Vec<Event<T>>,
    confirm_answer: bool,
    stop_after: Option<usize>,
    fail_on: Vec<T>,
    data_delivered: usize,
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            confirm_answer: true,
            stop_after: None,
            fail_on: Vec::new(),
            data_delivered: 0,
        }
    }
}

impl<T: Clone + PartialEq> RecordingSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every confirmation with `answer` (default `true`).
    pub fn answering(mut self, answer: bool) -> Self {
        self.confirm_answer = answer;
        self
    }

    /// Accept `n` data payloads, then stop the pipeline on every later one.
    pub fn stop_after(mut self, n: usize) -> Self {
        self.stop_after = Some(n);
        self
    }

    /// Fail with [`SinkError::Failed`] whenever this object is written.
    pub fn fail_on(mut self, value: T) -> Self {
        self.fail_on.push(value);
        self
    }

    /// Lift a previous [`stop_after`](Self::stop_after).
    pub fn resume(&mut self) {
        self.stop_after = None;
    }

    pub fn events(&self) -> &[Event<T>] {
        &self.events
    }

    /// Delivered objects, in delivery order.
    pub fn objects(&self) -> Vec<T> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Object(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn data(&self) -> Vec<Event<T>> {
        self.events.iter().filter(|e| e.is_data()).cloned().collect()
    }

    pub fn progress(&self) -> Vec<ProgressRecord> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    fn admit_data(&mut self) -> Result<(), SinkError> {
        if let Some(limit) = self.stop_after {
            if self.data_delivered >= limit {
                return Err(SinkError::PipelineStopped);
            }
        }
        self.data_delivered += 1;
        Ok(())
    }
}

impl<T: Clone + PartialEq> OutputSink<T> for RecordingSink<T> {
    fn write_object(&mut self, value: T) -> Result<(), SinkError> {
        if self.fail_on.contains(&value) {
            return Err(SinkError::Failed(anyhow::anyhow!("sink rejected object")));
        }
        self.admit_data()?;
        self.events.push(Event::Object(value));
        Ok(())
    }

    fn write_error(&mut self, error: anyhow::Error) -> Result<(), SinkError> {
        self.admit_data()?;
        self.events.push(Event::Error(format!("{error:#}")));
        Ok(())
    }

    fn write_verbose(&mut self, message: String) -> Result<(), SinkError> {
        self.admit_data()?;
        self.events.push(Event::Verbose(message));
        Ok(())
    }

    fn write_debug(&mut self, message: String) -> Result<(), SinkError> {
        self.events.push(Event::Debug(message));
        Ok(())
    }

    fn write_progress(&mut self, record: ProgressRecord) -> Result<(), SinkError> {
        self.events.push(Event::Progress(record));
        Ok(())
    }

    fn confirm(&mut self, caption: &str, message: &str) -> bool {
        self.events.push(Event::Confirm {
            caption: caption.to_string(),
            message: message.to_string(),
        });
        self.confirm_answer
    }
}
