// src/output/confirm.rs

//! Confirmation requests answered by the pumping thread.

use tokio::sync::oneshot;

#[derive(Debug)]
pub(crate) struct ConfirmationRequest {
    pub caption: String,
    pub message: String,
    pub reply: oneshot::Sender<bool>,
}

/// Pending answer to a [`request_confirmation`] call.
///
/// Never wait on this from the thread that calls `pump`: only `pump` answers
/// it, so the wait would never end.
///
/// [`request_confirmation`]: crate::output::OutputStream::request_confirmation
#[derive(Debug)]
pub struct ConfirmationHandle {
    rx: oneshot::Receiver<bool>,
}

impl ConfirmationHandle {
    pub(crate) fn new(rx: oneshot::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Wait for the answer. A stream dropped before answering counts as a
    /// refusal.
    pub async fn confirmed(self) -> bool {
        self.rx.await.unwrap_or(false)
    }

    /// Non-blocking check; `None` while unanswered.
    pub fn try_confirmed(&mut self) -> Option<bool> {
        match self.rx.try_recv() {
            Ok(answer) => Some(answer),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(false),
        }
    }
}
