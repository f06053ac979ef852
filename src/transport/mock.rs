//! Scripted transport for tests.

use super::{ProgressSink, Transport};
use crate::deferred::Progress;
use crate::error::{Error, Result};
use crate::headers::Headers;
use crate::payload::SerializedPayload;
use crate::request::SerializedRequest;
use crate::response::RawResponse;
use async_trait::async_trait;
use http::StatusCode;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

enum Reply {
    Respond(RawResponse),
    Fail(Error),
    /// Never completes; exercises timeout and cancellation paths.
    Hang,
}

#[derive(Default)]
struct MockInner {
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<SerializedRequest>>,
}

/// A transport that replays scripted replies and records every request
/// it sees. With an empty script it answers `200` with no body.
///
/// # Example
///
/// ```rust
/// use courier_core::transport::MockTransport;
/// use http::StatusCode;
///
/// let transport = MockTransport::new();
/// transport.enqueue_json(StatusCode::OK, r#"{"id":1}"#);
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// Creates a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a raw response.
    pub fn enqueue_response(&self, response: RawResponse) {
        self.push(Reply::Respond(response));
    }

    /// Queues a JSON response with the given status and body.
    pub fn enqueue_json(&self, status: StatusCode, body: &str) {
        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json");
        self.push(Reply::Respond(RawResponse::new(
            status,
            headers,
            SerializedPayload::Text(body.to_owned()),
        )));
    }

    /// Queues a plain-text response.
    pub fn enqueue_text(&self, status: StatusCode, body: &str) {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        self.push(Reply::Respond(RawResponse::new(
            status,
            headers,
            SerializedPayload::Text(body.to_owned()),
        )));
    }

    /// Queues a transport failure.
    pub fn enqueue_error(&self, error: Error) {
        self.push(Reply::Fail(error));
    }

    /// Queues a send that never completes.
    pub fn enqueue_hang(&self) {
        self.push(Reply::Hang);
    }

    fn push(&self, reply: Reply) {
        self.inner
            .script
            .lock()
            .expect("mock lock poisoned")
            .push_back(reply);
    }

    /// Every request the transport has seen, in order.
    pub fn requests(&self) -> Vec<SerializedRequest> {
        self.inner
            .requests
            .lock()
            .expect("mock lock poisoned")
            .clone()
    }

    /// Number of sends performed.
    pub fn request_count(&self) -> usize {
        self.inner
            .requests
            .lock()
            .expect("mock lock poisoned")
            .len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: &SerializedRequest,
        progress: ProgressSink,
    ) -> Result<RawResponse> {
        self.inner
            .requests
            .lock()
            .expect("mock lock poisoned")
            .push(request.clone());

        let reply = self
            .inner
            .script
            .lock()
            .expect("mock lock poisoned")
            .pop_front();

        match reply {
            None => Ok(RawResponse::new(
                StatusCode::OK,
                Headers::new(),
                SerializedPayload::Absent,
            )),
            Some(Reply::Respond(response)) => {
                let len = response.payload().len() as u64;
                if len > 0 {
                    progress.download(Progress::new(len, Some(len)));
                }
                Ok(response)
            }
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future completed")
            }
        }
    }
}
