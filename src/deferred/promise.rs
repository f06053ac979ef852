//! Consumer-side handle for a dispatched request.

use super::{CallbackHub, DeferredPool, Outcome, Progress, Rejection, StatusMatcher};
use crate::request::PollingOptions;
use crate::response::{RawResponse, Response};
use std::sync::Arc;

/// Subscribes to the settlement(s) of a dispatched request.
///
/// Callbacks registered after a settlement fire immediately with the
/// most recent outcome, then again for every later polling tick.
///
/// # Example
///
/// ```rust,no_run
/// # use courier_core::Session;
/// # use http::Method;
/// # fn demo(session: &Session) -> courier_core::error::Result<()> {
/// session
///     .req(Method::GET, "http://localhost/greeting")?
///     .send::<String>()
///     .on_success(|response| println!("got: {}", response.payload()))
///     .on_fail(|rejection| eprintln!("failed: {rejection:?}"));
/// # Ok(())
/// # }
/// ```
pub struct Promise<P> {
    hub: Arc<CallbackHub<P>>,
    pool: Arc<DeferredPool<P>>,
    polling: PollingOptions,
}

impl<P: Send + Sync + 'static> Promise<P> {
    pub(crate) fn new(pool: Arc<DeferredPool<P>>, polling: PollingOptions) -> Self {
        Self {
            hub: Arc::clone(pool.hub()),
            pool,
            polling,
        }
    }

    /// Registers a callback for successful (2xx, deserialized)
    /// responses.
    pub fn on_success<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Response<P>) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(&Response<P>) + Send + Sync> = Arc::new(callback);
        if let Some(Ok(response)) = self.hub.last_outcome() {
            callback(&response);
        }
        self.hub.add_success(callback);
        self
    }

    /// Registers a callback for failures: non-success statuses,
    /// transport faults, timeouts, aborts and cancellations.
    pub fn on_fail<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Rejection) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(&Rejection) + Send + Sync> = Arc::new(callback);
        if let Some(Err(rejection)) = self.hub.last_outcome() {
            callback(&rejection);
        }
        self.hub.add_fail(callback);
        self
    }

    /// Registers a callback for every received response whose status
    /// matches, by exact code or whole family, whether or not the
    /// response counts as a success.
    pub fn on_status<M, F>(&self, matcher: M, callback: F) -> &Self
    where
        M: Into<StatusMatcher>,
        F: Fn(&RawResponse) + Send + Sync + 'static,
    {
        let matcher = matcher.into();
        let callback: Arc<dyn Fn(&RawResponse) + Send + Sync> = Arc::new(callback);
        if let Some(outcome) = self.hub.last_outcome() {
            let raw = match &outcome {
                Ok(response) => Some(Arc::clone(response.raw())),
                Err(rejection) => rejection.response().map(|r| Arc::new(r.clone())),
            };
            if let Some(raw) = raw {
                if matcher.matches(raw.status()) {
                    callback(&raw);
                }
            }
        }
        self.hub.add_status(matcher, callback);
        self
    }

    /// Registers a download progress callback.
    pub fn on_download_progress<F>(&self, callback: F) -> &Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.hub.add_download(Arc::new(callback));
        self
    }

    /// Registers an upload progress callback.
    pub fn on_upload_progress<F>(&self, callback: F) -> &Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.hub.add_upload(Arc::new(callback));
        self
    }

    /// Waits for the first settlement.
    ///
    /// Polling requests settle once per tick; this returns the earliest
    /// one. Use callbacks to observe every tick.
    pub async fn outcome(&self) -> Outcome<P> {
        let mut rx = self.hub.subscribe_settled();
        loop {
            if let Some(outcome) = self.hub.first_outcome() {
                return outcome;
            }
            if rx.wait_for(|settled| *settled).await.is_err() {
                // The sender lives in the hub we hold; unreachable, but
                // never busy-loop on it.
                tokio::task::yield_now().await;
            }
        }
    }

    /// Stops the polling chain; ticks already in flight settle
    /// normally.
    pub fn stop_polling(&self) {
        self.polling.stop();
    }

    /// Cancels the tick currently in flight through its connection
    /// handle. A no-op once settled.
    pub fn cancel(&self) {
        if let Some(deferred) = self.pool.current() {
            if let Some(connection) = deferred.connection() {
                connection.cancel();
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::payload::SerializedPayload;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool() -> Arc<DeferredPool<String>> {
        Arc::new(DeferredPool::new())
    }

    fn ok_response(payload: &str) -> Response<String> {
        Response::new(
            Arc::new(RawResponse::new(
                StatusCode::OK,
                Headers::new(),
                SerializedPayload::Absent,
            )),
            payload.to_owned(),
        )
    }

    #[tokio::test]
    async fn outcome_returns_first_settlement() {
        let pool = pool();
        let promise = Promise::new(Arc::clone(&pool), PollingOptions::inactive());
        let deferred = pool.next_deferred();
        deferred.resolve(ok_response("first"));
        let outcome = promise.outcome().await.unwrap();
        assert_eq!(outcome.payload(), "first");
    }

    #[tokio::test]
    async fn late_subscriber_fires_immediately() {
        let pool = pool();
        let promise = Promise::new(Arc::clone(&pool), PollingOptions::inactive());
        pool.next_deferred().resolve(ok_response("done"));

        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        promise.on_success(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn status_callbacks_fire_for_failures_too() {
        let pool = pool();
        let promise = Promise::new(Arc::clone(&pool), PollingOptions::inactive());

        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        promise.on_status(404u16, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        pool.next_deferred().reject(Rejection::Status(Arc::new(RawResponse::new(
            StatusCode::NOT_FOUND,
            Headers::new(),
            SerializedPayload::Absent,
        ))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
