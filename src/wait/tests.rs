//! Tests for the bounded polling primitive.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;

type Script = Arc<Mutex<VecDeque<Result<&'static str, String>>>>;

fn scripted(responses: Vec<Result<&'static str, String>>) -> (Script, Arc<Mutex<u32>>) {
    (
        Arc::new(Mutex::new(responses.into_iter().collect())),
        Arc::new(Mutex::new(0)),
    )
}

async fn next(script: &Script, calls: &Arc<Mutex<u32>>) -> Result<&'static str, String> {
    *calls.lock().expect("calls lock") += 1;
    script
        .lock()
        .expect("script lock")
        .pop_front()
        .unwrap_or(Ok("pending"))
}

#[fixture]
fn waiter() -> StateWaiter {
    StateWaiter::new(
        Duration::from_secs(5),
        Duration::from_secs(60),
        CancelToken::never(),
    )
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn returns_on_first_matching_state(waiter: StateWaiter) {
    let (script, calls) = scripted(vec![Ok("down"), Ok("cleaning"), Ok("up"), Ok("down")]);

    let state = waiter
        .wait_until("server up", || next(&script, &calls), |state| *state == "up")
        .await
        .expect("wait should succeed");

    assert_eq!(state, "up");
    assert_eq!(*calls.lock().expect("calls lock"), 3);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried(waiter: StateWaiter) {
    let (script, calls) = scripted(vec![
        Err("502 bad gateway".to_owned()),
        Ok("down"),
        Err("connection reset".to_owned()),
        Ok("up"),
    ]);

    let state = waiter
        .wait_until("server up", || next(&script, &calls), |state| *state == "up")
        .await
        .expect("transient errors should not abort the wait");

    assert_eq!(state, "up");
    assert_eq!(*calls.lock().expect("calls lock"), 4);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn persistent_errors_spend_the_budget(waiter: StateWaiter) {
    let waiter = waiter.with_error_budget(3);
    let (script, calls) = scripted(vec![
        Err("boom".to_owned()),
        Err("boom".to_owned()),
        Err("still broken".to_owned()),
    ]);

    let err = waiter
        .wait_until("disk available", || next(&script, &calls), |state| *state == "up")
        .await
        .expect_err("budget should be exhausted");

    assert_eq!(
        err,
        WaitError::QueryFailed {
            what: "disk available".to_owned(),
            attempts: 3,
            last_error: "still broken".to_owned(),
        }
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn times_out_when_predicate_never_holds(waiter: StateWaiter) {
    let (script, calls) = scripted(Vec::new());

    let err = waiter
        .wait_until("server up", || next(&script, &calls), |state| *state == "up")
        .await
        .expect_err("wait should time out");

    assert!(matches!(err, WaitError::Timeout { .. }));
    // One poll at t=0 and one per interval until the 60 s deadline.
    assert_eq!(*calls.lock().expect("calls lock"), 13);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_wait() {
    let (canceller, token) = cancel_pair();
    let waiter = StateWaiter::new(Duration::from_secs(5), Duration::from_secs(600), token);
    let (script, calls) = scripted(Vec::new());

    let wait = waiter.wait_until("server up", || next(&script, &calls), |state| *state == "up");
    let cancel = async {
        sleep(Duration::from_secs(12)).await;
        canceller.cancel();
    };
    let (result, ()) = tokio::join!(wait, cancel);

    assert_eq!(
        result,
        Err(WaitError::Cancelled {
            what: "server up".to_owned()
        })
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn hung_query_still_times_out(waiter: StateWaiter) {
    let started = Instant::now();

    let err = waiter
        .wait_until(
            "server up",
            std::future::pending::<Result<&'static str, String>>,
            |state| *state == "up",
        )
        .await
        .expect_err("a hung query cannot outlive the deadline");

    assert_eq!(
        err,
        WaitError::Timeout {
            what: "server up".to_owned(),
            waited: Duration::from_secs(60),
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn hung_query_yields_to_cancellation() {
    let (canceller, token) = cancel_pair();
    let waiter = StateWaiter::new(Duration::from_secs(5), Duration::from_secs(600), token);

    let wait = waiter.wait_until(
        "disk available",
        std::future::pending::<Result<&'static str, String>>,
        |state| *state == "available",
    );
    let cancel = async {
        sleep(Duration::from_secs(3)).await;
        canceller.cancel();
    };
    let (result, ()) = tokio::join!(wait, cancel);

    assert_eq!(
        result,
        Err(WaitError::Cancelled {
            what: "disk available".to_owned()
        })
    );
}

#[test]
fn never_token_is_not_cancelled() {
    assert!(!CancelToken::never().is_cancelled());
}
