//! Deferred/Promise pair: producer and consumer sides of one
//! asynchronous settlement.
//!
//! A [`Deferred`] settles exactly once; a second `resolve` or `reject`
//! is a programming-error fault and panics. Its subscribers live in a
//! hub shared with the consumer-facing [`Promise`], so
//! [`Deferred::unresolved_copy`] can hand every polling tick a fresh
//! settlement slot that feeds the same callbacks.

mod progress;
mod promise;

pub use progress::Progress;
pub use promise::Promise;

use crate::error::Error;
use crate::request::RequestSnapshot;
use crate::response::{RawResponse, Response, StatusFamily};
use http::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Why a request failed.
#[derive(Debug)]
pub enum Rejection {
    /// The server answered with a non-success status; the payload stays
    /// in wire form.
    Status(Arc<RawResponse>),
    /// The request produced no usable response.
    Error {
        /// The originating snapshot.
        request: Arc<RequestSnapshot>,
        /// The cause.
        error: Error,
    },
}

impl Rejection {
    /// The raw response, when the server answered.
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Rejection::Status(raw) => Some(raw),
            Rejection::Error { .. } => None,
        }
    }

    /// The error, when no usable response arrived.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Rejection::Status(_) => None,
            Rejection::Error { error, .. } => Some(error),
        }
    }

    /// The configured timeout, when this is a timeout rejection.
    pub fn as_timeout(&self) -> Option<std::time::Duration> {
        self.error().and_then(Error::as_timeout)
    }
}

/// Matches responses for status-scoped callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMatcher {
    /// An exact status code.
    Code(StatusCode),
    /// A whole status family.
    Family(StatusFamily),
}

impl StatusMatcher {
    fn matches(&self, status: StatusCode) -> bool {
        match self {
            StatusMatcher::Code(code) => *code == status,
            StatusMatcher::Family(family) => family.includes(status),
        }
    }
}

impl From<StatusCode> for StatusMatcher {
    fn from(code: StatusCode) -> Self {
        StatusMatcher::Code(code)
    }
}

impl From<u16> for StatusMatcher {
    fn from(code: u16) -> Self {
        StatusCode::from_u16(code)
            .map(StatusMatcher::Code)
            .unwrap_or(StatusMatcher::Family(StatusFamily::Other))
    }
}

impl From<StatusFamily> for StatusMatcher {
    fn from(family: StatusFamily) -> Self {
        StatusMatcher::Family(family)
    }
}

/// The outcome of one settlement, shared with subscribers.
pub type Outcome<P> = Result<Arc<Response<P>>, Arc<Rejection>>;

type SuccessCb<P> = Arc<dyn Fn(&Response<P>) + Send + Sync>;
type FailCb = Arc<dyn Fn(&Rejection) + Send + Sync>;
type StatusCb = Arc<dyn Fn(&RawResponse) + Send + Sync>;
type ProgressCb = Arc<dyn Fn(Progress) + Send + Sync>;

/// Subscriber lists and settlement records shared by a promise and every
/// deferred of its polling chain.
pub(crate) struct CallbackHub<P> {
    success: Mutex<Vec<SuccessCb<P>>>,
    fail: Mutex<Vec<FailCb>>,
    status: Mutex<Vec<(StatusMatcher, StatusCb)>>,
    download: Mutex<Vec<ProgressCb>>,
    upload: Mutex<Vec<ProgressCb>>,
    first: Mutex<Option<Outcome<P>>>,
    last: Mutex<Option<Outcome<P>>>,
    settled_tx: watch::Sender<bool>,
}

impl<P> Default for CallbackHub<P> {
    fn default() -> Self {
        let (settled_tx, _) = watch::channel(false);
        Self {
            success: Mutex::new(Vec::new()),
            fail: Mutex::new(Vec::new()),
            status: Mutex::new(Vec::new()),
            download: Mutex::new(Vec::new()),
            upload: Mutex::new(Vec::new()),
            first: Mutex::new(None),
            last: Mutex::new(None),
            settled_tx,
        }
    }
}

impl<P: Send + Sync + 'static> CallbackHub<P> {
    fn settle(&self, outcome: Outcome<P>) {
        {
            let mut first = self.first.lock().expect("hub lock poisoned");
            if first.is_none() {
                *first = Some(outcome.clone());
            }
        }
        *self.last.lock().expect("hub lock poisoned") = Some(outcome.clone());

        let raw = match &outcome {
            Ok(response) => Some(Arc::clone(response.raw())),
            Err(rejection) => match rejection.as_ref() {
                Rejection::Status(raw) => Some(Arc::clone(raw)),
                Rejection::Error { .. } => None,
            },
        };
        if let Some(raw) = raw {
            let status_cbs: Vec<_> = self
                .status
                .lock()
                .expect("hub lock poisoned")
                .iter()
                .filter(|(matcher, _)| matcher.matches(raw.status()))
                .map(|(_, cb)| Arc::clone(cb))
                .collect();
            for cb in status_cbs {
                cb(&raw);
            }
        }

        match &outcome {
            Ok(response) => {
                let cbs: Vec<_> = self
                    .success
                    .lock()
                    .expect("hub lock poisoned")
                    .iter()
                    .map(Arc::clone)
                    .collect();
                for cb in cbs {
                    cb(response);
                }
            }
            Err(rejection) => {
                let cbs: Vec<_> = self
                    .fail
                    .lock()
                    .expect("hub lock poisoned")
                    .iter()
                    .map(Arc::clone)
                    .collect();
                for cb in cbs {
                    cb(rejection);
                }
            }
        }

        let _ = self.settled_tx.send(true);
    }

    fn fire_download(&self, progress: Progress) {
        let cbs: Vec<_> = self
            .download
            .lock()
            .expect("hub lock poisoned")
            .iter()
            .map(Arc::clone)
            .collect();
        for cb in cbs {
            cb(progress);
        }
    }

    fn fire_upload(&self, progress: Progress) {
        let cbs: Vec<_> = self
            .upload
            .lock()
            .expect("hub lock poisoned")
            .iter()
            .map(Arc::clone)
            .collect();
        for cb in cbs {
            cb(progress);
        }
    }

    pub(crate) fn first_outcome(&self) -> Option<Outcome<P>> {
        self.first.lock().expect("hub lock poisoned").clone()
    }

    pub(crate) fn last_outcome(&self) -> Option<Outcome<P>> {
        self.last.lock().expect("hub lock poisoned").clone()
    }

    pub(crate) fn subscribe_settled(&self) -> watch::Receiver<bool> {
        self.settled_tx.subscribe()
    }

    pub(crate) fn add_success(&self, cb: SuccessCb<P>) {
        self.success.lock().expect("hub lock poisoned").push(cb);
    }

    pub(crate) fn add_fail(&self, cb: FailCb) {
        self.fail.lock().expect("hub lock poisoned").push(cb);
    }

    pub(crate) fn add_status(&self, matcher: StatusMatcher, cb: StatusCb) {
        self.status
            .lock()
            .expect("hub lock poisoned")
            .push((matcher, cb));
    }

    pub(crate) fn add_download(&self, cb: ProgressCb) {
        self.download.lock().expect("hub lock poisoned").push(cb);
    }

    pub(crate) fn add_upload(&self, cb: ProgressCb) {
        self.upload.lock().expect("hub lock poisoned").push(cb);
    }
}

/// Cancel/is-pending handle bound to one in-flight transport operation.
#[derive(Clone)]
pub struct HttpConnection {
    token: CancellationToken,
    settled: Arc<AtomicBool>,
}

impl HttpConnection {
    pub(crate) fn new(token: CancellationToken, settled: Arc<AtomicBool>) -> Self {
        Self { token, settled }
    }

    /// Requests that the transport abandon the operation. Cooperative: a
    /// response already on the wire may still arrive and is then
    /// ignored. A no-op after settlement.
    pub fn cancel(&self) {
        if self.is_pending() {
            self.token.cancel();
        }
    }

    /// Whether the operation has not settled yet.
    pub fn is_pending(&self) -> bool {
        !self.settled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("pending", &self.is_pending())
            .finish()
    }
}

struct DeferredState {
    settled: Arc<AtomicBool>,
    connection: Mutex<Option<HttpConnection>>,
}

/// Producer-side handle for settling one asynchronous result.
pub struct Deferred<P> {
    hub: Arc<CallbackHub<P>>,
    state: Arc<DeferredState>,
}

impl<P> Clone for Deferred<P> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: Send + Sync + 'static> Default for Deferred<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send + Sync + 'static> Deferred<P> {
    /// Creates a standalone deferred with its own subscriber hub.
    /// Dispatch glue and tests use this; requests dispatched through a
    /// session get theirs from the dispatcher.
    pub fn new() -> Self {
        Self::with_hub(Arc::new(CallbackHub::default()))
    }

    pub(crate) fn with_hub(hub: Arc<CallbackHub<P>>) -> Self {
        Self {
            hub,
            state: Arc::new(DeferredState {
                settled: Arc::new(AtomicBool::new(false)),
                connection: Mutex::new(None),
            }),
        }
    }

    /// Whether this deferred has not settled yet.
    pub fn is_pending(&self) -> bool {
        !self.state.settled.load(Ordering::SeqCst)
    }

    /// Resolves with a successful response.
    ///
    /// # Panics
    ///
    /// Panics when called after settlement: settling twice is a
    /// programming error, not a recoverable condition.
    pub fn resolve(&self, response: Response<P>) {
        assert!(
            self.try_resolve(response),
            "Deferred::resolve called after settlement"
        );
    }

    /// Rejects with a failure.
    ///
    /// # Panics
    ///
    /// Panics when called after settlement.
    pub fn reject(&self, rejection: Rejection) {
        assert!(
            self.try_reject(rejection),
            "Deferred::reject called after settlement"
        );
    }

    /// Resolves unless already settled; returns whether it settled now.
    pub(crate) fn try_resolve(&self, response: Response<P>) -> bool {
        if self.state.settled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.hub.settle(Ok(Arc::new(response)));
        true
    }

    /// Rejects unless already settled; returns whether it settled now.
    pub(crate) fn try_reject(&self, rejection: Rejection) -> bool {
        if self.state.settled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.hub.settle(Err(Arc::new(rejection)));
        true
    }

    /// Forwards a download progress event. Silently dropped after
    /// settlement.
    pub fn notify_download(&self, progress: Progress) {
        if self.is_pending() {
            self.hub.fire_download(progress);
        }
    }

    /// Forwards an upload progress event. Silently dropped after
    /// settlement.
    pub fn notify_upload(&self, progress: Progress) {
        if self.is_pending() {
            self.hub.fire_upload(progress);
        }
    }

    /// A fresh unsettled deferred wired to the same subscribers. Each
    /// polling tick gets one so every tick has its own settlement slot.
    #[must_use]
    pub fn unresolved_copy(&self) -> Deferred<P> {
        Deferred::with_hub(Arc::clone(&self.hub))
    }

    /// Installs the connection handle for the in-flight operation.
    pub fn set_connection(&self, token: CancellationToken) -> HttpConnection {
        let connection = HttpConnection::new(token, Arc::clone(&self.state.settled));
        *self.state.connection.lock().expect("deferred lock poisoned") = Some(connection.clone());
        connection
    }

    /// The connection handle, once the operation is scheduled.
    pub fn connection(&self) -> Option<HttpConnection> {
        self.state
            .connection
            .lock()
            .expect("deferred lock poisoned")
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn hub(&self) -> &Arc<CallbackHub<P>> {
        &self.hub
    }
}

/// Tracks the deferreds of one dispatch so the promise always reaches
/// the tick currently in flight.
pub(crate) struct DeferredPool<P> {
    hub: Arc<CallbackHub<P>>,
    current: Mutex<Option<Deferred<P>>>,
}

impl<P: Send + Sync + 'static> DeferredPool<P> {
    pub(crate) fn new() -> Self {
        Self {
            hub: Arc::new(CallbackHub::default()),
            current: Mutex::new(None),
        }
    }

    /// The deferred for the next tick: the initial one, then unresolved
    /// copies.
    pub(crate) fn next_deferred(&self) -> Deferred<P> {
        let mut current = self.current.lock().expect("pool lock poisoned");
        let next = match current.as_ref() {
            Some(existing) => existing.unresolved_copy(),
            None => Deferred::with_hub(Arc::clone(&self.hub)),
        };
        *current = Some(next.clone());
        next
    }

    pub(crate) fn current(&self) -> Option<Deferred<P>> {
        self.current.lock().expect("pool lock poisoned").clone()
    }

    pub(crate) fn hub(&self) -> &Arc<CallbackHub<P>> {
        &self.hub
    }
}
