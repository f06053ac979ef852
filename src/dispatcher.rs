//! Request scheduling: delay, send, retry, timeout, polling and
//! cancellation.
//!
//! Each dispatch spawns a tick task per send. A tick sleeps the
//! configured delay, runs the outbound pipeline, sends (with retry
//! inside the overall timeout window), and feeds the transport result
//! into the inbound pipeline. Polling re-schedules ticks (right after
//! send initiation for the SHORT strategy, after inbound processing for
//! LONG), each tick settling its own unresolved copy of the deferred.
//! No failure escapes a tick: everything becomes a rejection carrying
//! the originating snapshot.

use crate::deferred::{Deferred, DeferredPool, Promise, Rejection};
use crate::error::{Error, Result};
use crate::processor::{
    Interruption, OutboundOutcome, RequestProcessor, ResponseProcessor, Settlement,
};
use crate::request::{MutableRequest, PollingStrategy, RequestSnapshot, SerializedRequest};
use crate::response::RawResponse;
use crate::retry::RetryPolicy;
use crate::serialization::PayloadReader;
use crate::transport::{ProgressSink, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

// Floor for the inter-poll timer, so a zero interval still yields.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    request_processor: RequestProcessor,
    response_processor: ResponseProcessor,
}

/// Schedules requests. A cheap-clone handle; every tick task carries
/// one.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        request_processor: RequestProcessor,
        response_processor: ResponseProcessor,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                request_processor,
                response_processor,
            }),
        }
    }

    /// Schedules the snapshot and returns the consumer-side promise.
    ///
    /// Never fails synchronously: every problem surfaces as a rejection.
    /// Must be called inside a tokio runtime.
    pub(crate) fn dispatch<P>(
        &self,
        snapshot: RequestSnapshot,
        reader: PayloadReader<P>,
    ) -> Promise<P>
    where
        P: Send + Sync + 'static,
    {
        let snapshot = Arc::new(snapshot);
        let pool = Arc::new(DeferredPool::new());
        let promise = Promise::new(Arc::clone(&pool), snapshot.polling().clone());
        let delay = snapshot.delay().unwrap_or(Duration::ZERO);
        debug!(
            method = %snapshot.method(),
            uri = %snapshot.uri(),
            delay_ms = delay.as_millis() as u64,
            polling = snapshot.polling().is_polling(),
            payload_kind = ?reader.kind(),
            "request dispatched"
        );
        self.schedule_tick(snapshot, reader, pool, delay);
        promise
    }

    fn schedule_tick<P>(
        &self,
        snapshot: Arc<RequestSnapshot>,
        reader: PayloadReader<P>,
        pool: Arc<DeferredPool<P>>,
        delay: Duration,
    ) where
        P: Send + Sync + 'static,
    {
        snapshot.polling().increment_counter();
        let deferred = pool.next_deferred();
        let token = CancellationToken::new();
        deferred.set_connection(token.clone());

        let dispatcher = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => {
                        reject_cancelled(&deferred, &snapshot);
                        return;
                    }
                    _ = sleep(delay) => {}
                }
            }
            if token.is_cancelled() {
                reject_cancelled(&deferred, &snapshot);
                return;
            }
            dispatcher.run_tick(snapshot, reader, pool, deferred, token).await;
        });
    }

    #[instrument(
        name = "dispatch_tick",
        skip_all,
        fields(method = %snapshot.method(), uri = %snapshot.uri(), tick = snapshot.polling().counter())
    )]
    async fn run_tick<P>(
        &self,
        snapshot: Arc<RequestSnapshot>,
        reader: PayloadReader<P>,
        pool: Arc<DeferredPool<P>>,
        deferred: Deferred<P>,
        token: CancellationToken,
    ) where
        P: Send + Sync + 'static,
    {
        let store = snapshot.store().leaf();
        let mut request = MutableRequest::from_snapshot(&snapshot, store.clone());

        // Everything up to the transport call is caught here and turned
        // into a rejection carrying the originating snapshot.
        let prepared = match self.inner.request_processor.process(&mut request).await {
            Ok(OutboundOutcome::Proceed) => request.freeze(),
            Ok(OutboundOutcome::Abort(Interruption::Response(response))) => {
                debug!("outbound stage aborted with a response");
                let serialized = request.freeze();
                let settlement =
                    self.inner
                        .response_processor
                        .settle_direct(response, &serialized, &reader);
                settle(settlement, &deferred, &snapshot);
                if snapshot.polling().strategy() == PollingStrategy::Long {
                    self.maybe_schedule_next(&snapshot, &reader, &pool);
                }
                return;
            }
            Ok(OutboundOutcome::Abort(Interruption::Error(error))) => {
                debug!(error = %error, "outbound stage aborted with an error");
                deferred.try_reject(Rejection::Error {
                    request: Arc::clone(&snapshot),
                    error,
                });
                return;
            }
            Err(error) => {
                warn!(error = %error, "outbound pipeline failed; rejecting");
                deferred.try_reject(Rejection::Error {
                    request: Arc::clone(&snapshot),
                    error,
                });
                return;
            }
        };

        let timeout = request.timeout();
        let retry = request.retry().cloned();
        drop(request);

        // SHORT polling measures the interval from send initiation.
        if snapshot.polling().strategy() == PollingStrategy::Short {
            self.maybe_schedule_next(&snapshot, &reader, &pool);
        }

        let progress = {
            let download = deferred.clone();
            let upload = deferred.clone();
            ProgressSink::new(
                Arc::new(move |p| download.notify_download(p)),
                Arc::new(move |p| upload.notify_upload(p)),
            )
        };

        let send = self.send_with_retry(&prepared, retry.as_ref(), progress);
        let result = match timeout {
            Some(limit) => tokio::select! {
                _ = token.cancelled() => {
                    reject_cancelled(&deferred, &snapshot);
                    return;
                }
                outcome = tokio::time::timeout(limit, send) => match outcome {
                    Ok(inner) => inner,
                    Err(_) => {
                        warn!(timeout_ms = limit.as_millis() as u64, "request timed out");
                        Err(Error::timeout(limit))
                    }
                },
            },
            None => tokio::select! {
                _ = token.cancelled() => {
                    reject_cancelled(&deferred, &snapshot);
                    return;
                }
                outcome = send => outcome,
            },
        };

        match result {
            Err(error) => {
                deferred.try_reject(Rejection::Error {
                    request: Arc::clone(&snapshot),
                    error,
                });
            }
            Ok(raw) => {
                let settlement =
                    self.inner
                        .response_processor
                        .process(raw, &prepared, &reader, &store);
                settle(settlement, &deferred, &snapshot);
                // LONG polling measures the interval from the end of
                // inbound processing.
                if snapshot.polling().strategy() == PollingStrategy::Long {
                    self.maybe_schedule_next(&snapshot, &reader, &pool);
                }
            }
        }
    }

    async fn send_with_retry(
        &self,
        request: &SerializedRequest,
        retry: Option<&RetryPolicy>,
        progress: ProgressSink,
    ) -> Result<RawResponse> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.transport.send(request, progress.clone()).await {
                Ok(response) => {
                    if let Some(policy) = retry {
                        if policy.should_retry_status(response.status(), attempt) {
                            let delay = policy.delay(attempt);
                            warn!(
                                status = response.status().as_u16(),
                                attempt = attempt + 1,
                                delay_ms = delay.as_millis() as u64,
                                "retryable status; retrying after delay"
                            );
                            sleep(delay).await;
                            attempt += 1;
                            continue;
                        }
                    }
                    return Ok(response);
                }
                Err(error) => match retry {
                    Some(policy) if policy.should_retry_error(&error, attempt) => {
                        let delay = policy.delay(attempt);
                        warn!(
                            error = %error,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "retryable failure; retrying after delay"
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                    _ => return Err(error),
                },
            }
        }
    }

    fn maybe_schedule_next<P>(
        &self,
        snapshot: &Arc<RequestSnapshot>,
        reader: &PayloadReader<P>,
        pool: &Arc<DeferredPool<P>>,
    ) where
        P: Send + Sync + 'static,
    {
        let polling = snapshot.polling();
        if polling.is_polling() {
            let interval = polling.interval().max(MIN_POLL_INTERVAL);
            self.schedule_tick(
                Arc::clone(snapshot),
                reader.clone(),
                Arc::clone(pool),
                interval,
            );
        }
    }
}

fn settle<P>(
    settlement: Result<Settlement<P>>,
    deferred: &Deferred<P>,
    snapshot: &Arc<RequestSnapshot>,
) where
    P: Send + Sync + 'static,
{
    match settlement {
        Ok(Settlement::Resolved(response)) => {
            deferred.try_resolve(response);
        }
        Ok(Settlement::Status(raw)) => {
            deferred.try_reject(Rejection::Status(raw));
        }
        Err(error) => {
            deferred.try_reject(Rejection::Error {
                request: Arc::clone(snapshot),
                error,
            });
        }
    }
}

fn reject_cancelled<P>(deferred: &Deferred<P>, snapshot: &Arc<RequestSnapshot>)
where
    P: Send + Sync + 'static,
{
    deferred.try_reject(Rejection::Error {
        request: Arc::clone(snapshot),
        error: Error::cancelled("request cancelled through its connection handle"),
    });
}
