//! Dispatcher timing tests: delay, timeout, retry, polling and
//! cancellation. All run on a paused clock, so timers are deterministic
//! and instant.

use courier_core::error::Result;
use courier_core::prelude::*;
use courier_core::request::MutableRequest;
use courier_core::transport::MockTransport;
use courier_core::ProcessContext;
use http::{Method, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{advance, sleep, Instant};

// Lets the scheduled tick tasks run until the observed count stops
// changing or the expectation is met.
async fn settle_ticks(counter: &AtomicUsize, expected: usize) {
    for _ in 0..100 {
        if counter.load(Ordering::SeqCst) >= expected {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    // Give any stray tick a generous window to show up.
    sleep(Duration::from_secs(2)).await;
}

#[tokio::test(start_paused = true)]
async fn delay_defers_the_send() {
    let transport = MockTransport::new();
    let session = Session::new(transport.clone());

    let started = Instant::now();
    let outcome = session
        .req(Method::GET, "http://localhost/later")
        .unwrap()
        .delay(Duration::from_secs(5))
        .send_none()
        .outcome()
        .await;

    assert!(outcome.is_ok());
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_rejects_with_the_configured_value_exactly_once() {
    let transport = MockTransport::new();
    transport.enqueue_hang();
    let session = Session::new(transport);

    let promise = session
        .req(Method::GET, "http://localhost/slow")
        .unwrap()
        .timeout(Duration::from_millis(1500))
        .send_none();

    let failures = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&failures);
    promise.on_fail(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let rejection = promise.outcome().await.unwrap_err();
    assert_eq!(rejection.as_timeout(), Some(Duration::from_millis(1500)));

    // No second (transport-fault) rejection may follow.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_policy_replays_retryable_statuses() {
    let transport = MockTransport::new();
    transport.enqueue_text(StatusCode::SERVICE_UNAVAILABLE, "down");
    transport.enqueue_text(StatusCode::OK, "up");
    let session = Session::new(transport.clone());

    let outcome = session
        .req(Method::GET, "http://localhost/flaky")
        .unwrap()
        .retry(RetryPolicy {
            max_retries: 2,
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_millis(50),
            ..Default::default()
        })
        .send::<String>()
        .outcome()
        .await
        .unwrap();

    assert_eq!(outcome.payload(), "up");
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_budget_exhaustion_surfaces_the_last_outcome() {
    let transport = MockTransport::new();
    transport.enqueue_error(Error::network("refused"));
    transport.enqueue_error(Error::network("refused again"));
    let session = Session::new(transport.clone());

    let rejection = session
        .req(Method::GET, "http://localhost/dead")
        .unwrap()
        .retry(RetryPolicy {
            max_retries: 1,
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_millis(10),
            ..Default::default()
        })
        .send_none()
        .outcome()
        .await
        .unwrap_err();

    assert!(rejection.error().is_some());
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn polling_limit_bounds_the_number_of_settlements() {
    let transport = MockTransport::new();
    let session = Session::new(transport.clone());

    let settlements = Arc::new(AtomicUsize::new(0));
    let promise = session
        .req(Method::GET, "http://localhost/poll")
        .unwrap()
        .poll(PollingStrategy::Short, Duration::from_millis(10), 3)
        .send_none();
    let seen = Arc::clone(&settlements);
    promise.on_success(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    settle_ticks(&settlements, 3).await;
    assert_eq!(settlements.load(Ordering::SeqCst), 3);
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn long_polling_schedules_after_response_processing() {
    let transport = MockTransport::new();
    let session = Session::new(transport.clone());

    let settlements = Arc::new(AtomicUsize::new(0));
    let promise = session
        .req(Method::GET, "http://localhost/poll-long")
        .unwrap()
        .poll(PollingStrategy::Long, Duration::from_millis(25), 2)
        .send_none();
    let seen = Arc::clone(&settlements);
    promise.on_success(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    settle_ticks(&settlements, 2).await;
    assert_eq!(settlements.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_polling_from_a_pipeline_stage_ends_the_chain() {
    let transport = MockTransport::new();
    let session = Session::new(transport.clone());

    let ticks = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&ticks);
    session.register_request_filter(
        move |req: &mut MutableRequest, _ctx: &mut ProcessContext| -> Result<()> {
            if seen.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                req.stop_polling();
            }
            Ok(())
        },
    );

    let settlements = Arc::new(AtomicUsize::new(0));
    let promise = session
        .req(Method::GET, "http://localhost/poll-stop")
        .unwrap()
        // Unbounded: only stop_polling() ends the chain.
        .poll(PollingStrategy::Short, Duration::from_millis(10), 0)
        .send_none();
    let seen = Arc::clone(&settlements);
    promise.on_success(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    settle_ticks(&settlements, 2).await;
    assert_eq!(settlements.load(Ordering::SeqCst), 2);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_rejects_and_ignores_the_late_response() {
    let transport = MockTransport::new();
    transport.enqueue_hang();
    let session = Session::new(transport.clone());

    let promise = session
        .req(Method::GET, "http://localhost/cancel-me")
        .unwrap()
        .send_none();

    // Let the tick enter the transport, then give up on it.
    sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.request_count(), 1);
    promise.cancel();

    let rejection = promise.outcome().await.unwrap_err();
    let error = rejection.error().expect("error rejection");
    assert!(error.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_the_initial_delay_never_sends() {
    let transport = MockTransport::new();
    let session = Session::new(transport.clone());

    let promise = session
        .req(Method::GET, "http://localhost/never")
        .unwrap()
        .delay(Duration::from_secs(60))
        .send_none();

    // The tick is sleeping its delay; cancel before it fires. Yield so
    // the spawned task registers its timer first.
    tokio::task::yield_now().await;
    promise.cancel();

    let rejection = promise.outcome().await.unwrap_err();
    assert!(rejection.error().expect("error rejection").is_cancelled());
    sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn pre_send_failure_does_not_continue_polling() {
    let transport = MockTransport::new();
    let session = Session::new(transport.clone());
    session.register_request_filter(
        |_req: &mut MutableRequest, _ctx: &mut ProcessContext| -> Result<()> {
            Err(Error::configuration("broken stage"))
        },
    );

    let failures = Arc::new(AtomicUsize::new(0));
    let promise = session
        .req(Method::GET, "http://localhost/poll-broken")
        .unwrap()
        .poll(PollingStrategy::Short, Duration::from_millis(10), 5)
        .send_none();
    let seen = Arc::clone(&failures);
    promise.on_fail(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    settle_ticks(&failures, 1).await;
    assert_eq!(failures.load(Ordering::SeqCst), 1);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn advancing_time_without_dispatch_settles_nothing() {
    let transport = MockTransport::new();
    let session = Session::new(transport);
    let promise = session
        .req(Method::GET, "http://localhost/idle")
        .unwrap()
        .delay(Duration::from_secs(3))
        .send_none();

    advance(Duration::from_secs(1)).await;
    let fired = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&fired);
    promise.on_success(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    promise.outcome().await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
