//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use invsync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};

/// A sync transport handles communication with the sync server.
///
/// This trait abstracts the network layer, allowing different
/// implementations (HTTP, loopback for tests, mock).
pub trait SyncTransport: Send + Sync {
    /// Sends a batch of queued mutations to the server's apply endpoint.
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Requests the delta since the given watermark.
    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;
}

/// A mock transport for testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    push_response: parking_lot::Mutex<Option<PushResponse>>,
    pull_responses: parking_lot::Mutex<Vec<PullResponse>>,
    fail_push: parking_lot::Mutex<Option<String>>,
    fail_pull: parking_lot::Mutex<Option<String>>,
    pushed: parking_lot::Mutex<Vec<PushRequest>>,
    pulled: parking_lot::Mutex<Vec<PullRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the push response.
    pub fn set_push_response(&self, response: PushResponse) {
        *self.push_response.lock() = Some(response);
    }

    /// Queues pull responses, served oldest-first; the last one repeats.
    pub fn set_pull_responses(&self, responses: Vec<PullResponse>) {
        let mut guard = self.pull_responses.lock();
        *guard = responses;
        guard.reverse();
    }

    /// Makes the next push calls fail with a transport error.
    pub fn fail_push_with(&self, message: impl Into<String>) {
        *self.fail_push.lock() = Some(message.into());
    }

    /// Makes the next pull calls fail with a transport error.
    pub fn fail_pull_with(&self, message: impl Into<String>) {
        *self.fail_pull.lock() = Some(message.into());
    }

    /// All push requests seen so far.
    pub fn pushed_requests(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// All pull requests seen so far.
    pub fn pulled_requests(&self) -> Vec<PullRequest> {
        self.pulled.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.pushed.lock().push(request.clone());
        if let Some(message) = self.fail_push.lock().clone() {
            return Err(SyncError::transport_retryable(message));
        }
        self.push_response
            .lock()
            .clone()
            .ok_or_else(|| SyncError::Protocol("no mock push response set".into()))
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pulled.lock().push(request.clone());
        if let Some(message) = self.fail_pull.lock().clone() {
            return Err(SyncError::transport_retryable(message));
        }
        let mut responses = self.pull_responses.lock();
        match responses.len() {
            0 => Err(SyncError::Protocol("no mock pull response set".into())),
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.pop().unwrap()),
        }
    }
}
