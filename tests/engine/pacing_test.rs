//! Wait pacing between fetches, measured on the paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use livechat::engine::{run_poll_loop, EventBus, Pacing, PollSettings};
use livechat::feed::ChatGateway;

use crate::support::{next_batches, ScriptedGateway, FEED_ID};

/// Run the loop until `batches` batches were published and return the gaps
/// between consecutive fetch start times.
async fn fetch_gaps(gateway: Arc<ScriptedGateway>, pacing: Pacing, batches: usize) -> Vec<Duration> {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let (stop_tx, stop_rx) = watch::channel(false);
    let dyn_gateway: Arc<dyn ChatGateway> = gateway.clone();
    let settings = PollSettings {
        pacing,
        ..PollSettings::default()
    };

    let task = tokio::spawn(run_poll_loop(
        dyn_gateway,
        FEED_ID.to_owned(),
        settings,
        bus,
        stop_rx,
    ));
    next_batches(&mut rx, batches).await;
    stop_tx.send_replace(true);
    task.await
        .expect("poll loop should not panic")
        .expect("clean stop");

    gateway
        .fetch_times()
        .windows(2)
        .map(|pair| pair[1].duration_since(pair[0]))
        .collect()
}

/// Compare gaps allowing for timer-wheel rounding of a millisecond or two.
fn assert_gaps(gaps: &[Duration], expected_ms: &[u64]) {
    assert_eq!(gaps.len(), expected_ms.len(), "gaps: {gaps:?}");
    for (gap, expected) in gaps.iter().zip(expected_ms) {
        let expected = Duration::from_millis(*expected);
        let slack = Duration::from_millis(5);
        assert!(
            *gap >= expected && *gap < expected.saturating_add(slack),
            "gap {gap:?} should be about {expected:?} (all gaps: {gaps:?})"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn compatible_pacing_waits_twice_after_success() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .then_batch("A", Some(1000), &[])
            .then_batch("B", Some(1000), &["b"])
            .then_batch("C", Some(1500), &["c"]),
    );
    let gaps = fetch_gaps(gateway, Pacing::Compatible, 2).await;
    assert_gaps(&gaps, &[2000, 2000]);
}

#[tokio::test(start_paused = true)]
async fn single_pacing_waits_once_after_success() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .then_batch("A", Some(1000), &[])
            .then_batch("B", Some(1000), &["b"])
            .then_batch("C", Some(1500), &["c"])
            .then_batch("D", Some(1500), &["d"]),
    );
    let gaps = fetch_gaps(gateway, Pacing::Single, 3).await;
    assert_gaps(&gaps, &[1000, 1000, 1500]);
}

#[tokio::test(start_paused = true)]
async fn compatible_pacing_adds_interval_after_backoff() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .then_batch("A", Some(1000), &[])
            .then_timeout()
            .then_timeout()
            .then_batch("B", Some(1000), &["b"]),
    );
    let gaps = fetch_gaps(gateway, Pacing::Compatible, 1).await;
    // success: 1000 + 1000, retry 1: 1000 + 1000, retry 2: 2000 + 1000
    assert_gaps(&gaps, &[2000, 2000, 3000]);
}

#[tokio::test(start_paused = true)]
async fn single_pacing_waits_only_the_backoff() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .then_batch("A", Some(1000), &[])
            .then_timeout()
            .then_timeout()
            .then_batch("B", Some(1000), &["b"]),
    );
    let gaps = fetch_gaps(gateway, Pacing::Single, 1).await;
    assert_gaps(&gaps, &[1000, 1000, 2000]);
}

#[tokio::test(start_paused = true)]
async fn suggested_interval_drives_the_next_wait() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .then_batch("A", Some(5000), &[])
            .then_batch("B", Some(250), &["b"])
            .then_batch("C", Some(250), &["c"]),
    );
    let gaps = fetch_gaps(gateway, Pacing::Single, 2).await;
    assert_gaps(&gaps, &[5000, 250]);
}
