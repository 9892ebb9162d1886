// src/output/writer.rs

use std::fmt;
use std::sync::Arc;

use crate::output::confirm::ConfirmationHandle;
use crate::output::progress::ProgressRecord;
use crate::output::stream::OutputStream;
use crate::types::TaskId;

/// Handle a work item uses to write into the output stream under its own id.
pub struct TaskWriter<T> {
    id: TaskId,
    stream: Arc<OutputStream<T>>,
}

impl<T> Clone for TaskWriter<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            stream: Arc::clone(&self.stream),
        }
    }
}

impl<T> fmt::Debug for TaskWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWriter").field("id", &self.id).finish()
    }
}

impl<T> TaskWriter<T> {
    pub(crate) fn new(id: TaskId, stream: Arc<OutputStream<T>>) -> Self {
        Self { id, stream }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn write_object(&self, value: T) {
        self.stream.write_object(self.id, value);
    }

    pub fn write_error(&self, error: anyhow::Error) {
        self.stream.write_error(self.id, error);
    }

    pub fn write_verbose(&self, message: impl Into<String>) {
        self.stream.write_verbose(self.id, message);
    }

    pub fn write_debug(&self, message: impl Into<String>) {
        self.stream.write_debug(message);
    }

    pub fn write_progress(&self, record: ProgressRecord) {
        self.stream.write_progress(record);
    }

    pub fn request_confirmation(
        &self,
        caption: impl Into<String>,
        message: impl Into<String>,
    ) -> ConfirmationHandle {
        self.stream.request_confirmation(caption, message)
    }
}
