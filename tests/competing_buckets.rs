use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use aimd_token_bucket::AimdTokenBucket;
use tokio::time::{self, Instant};

const BUDGET_PER_SECOND: f64 = 50.0;
const WINDOW: Duration = Duration::from_millis(500);
const RUN_FOR: Duration = Duration::from_secs(60);
const MEASURE_FROM: Duration = Duration::from_secs(20);

/// Consumes every token until the deadline and returns the time offset and
/// rate of each one.
async fn consume(
    tokens: aimd_token_bucket::Tokens,
    consumed: Arc<AtomicU64>,
    start: Instant,
) -> Vec<(Duration, f64)> {
    let mut received = Vec::new();
    let deadline = time::sleep_until(start + RUN_FOR);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break received,
            token = tokens.recv() => {
                consumed.fetch_add(1, Ordering::Relaxed);
                received.push((start.elapsed(), token.rate_per_second()));
            }
        }
    }
}

/// Stands in for a downstream that can only take `BUDGET_PER_SECOND`
/// requests in total. When a window goes over budget both producers are told
/// to back off.
async fn detect_congestion(
    buckets: [Arc<AimdTokenBucket>; 2],
    consumed: Arc<AtomicU64>,
    start: Instant,
) -> u32 {
    let limit = (BUDGET_PER_SECOND * WINDOW.as_secs_f64()) as u64;
    let mut ticker = time::interval_at(start + WINDOW, WINDOW);
    let mut backoffs = 0;

    while start.elapsed() < RUN_FOR {
        ticker.tick().await;
        if consumed.swap(0, Ordering::Relaxed) > limit {
            for bucket in &buckets {
                bucket.backoff();
            }
            backoffs += 1;
        }
    }
    backoffs
}

struct Summary {
    throughput: f64,
    mean_rate: f64,
}

fn summarize(received: &[(Duration, f64)]) -> Summary {
    let measured: Vec<f64> = received
        .iter()
        .filter(|(at, _)| *at >= MEASURE_FROM)
        .map(|(_, rate)| *rate)
        .collect();
    let seconds = (RUN_FOR - MEASURE_FROM).as_secs_f64();

    Summary {
        throughput: measured.len() as f64 / seconds,
        mean_rate: measured.iter().sum::<f64>() / measured.len() as f64,
    }
}

#[tokio::test(start_paused = true)]
async fn competing_buckets_split_the_budget_fairly() {
    let start = Instant::now();
    let consumed = Arc::new(AtomicU64::new(0));

    let first = Arc::new(AimdTokenBucket::new(BUDGET_PER_SECOND, 10, Duration::from_secs(6)).unwrap());
    let second = Arc::new(AimdTokenBucket::new(BUDGET_PER_SECOND, 10, Duration::from_secs(6)).unwrap());

    let first_consumer = tokio::spawn(consume(first.tokens().clone(), Arc::clone(&consumed), start));
    let second_consumer = tokio::spawn(consume(second.tokens().clone(), Arc::clone(&consumed), start));
    let detector = tokio::spawn(detect_congestion(
        [Arc::clone(&first), Arc::clone(&second)],
        Arc::clone(&consumed),
        start,
    ));

    let first_received = first_consumer.await.unwrap();
    let second_received = second_consumer.await.unwrap();
    let backoffs = detector.await.unwrap();

    assert!(backoffs > 1, "the shared budget was never exceeded");

    let first = summarize(&first_received);
    let second = summarize(&second_received);

    for (name, summary) in [("first", &first), ("second", &second)] {
        assert!(
            (10.0..=35.0).contains(&summary.mean_rate),
            "{name} bucket settled at {} tokens/s",
            summary.mean_rate
        );
        assert!(
            (10.0..=35.0).contains(&summary.throughput),
            "{name} bucket consumed {} tokens/s",
            summary.throughput
        );
    }

    let combined = first.throughput + second.throughput;
    assert!(
        combined <= BUDGET_PER_SECOND * 1.1,
        "combined throughput {combined} tokens/s overshoots the budget"
    );

    let ratio = first.throughput / second.throughput;
    assert!(
        (0.8..=1.25).contains(&ratio),
        "unfair split: {} vs {} tokens/s",
        first.throughput,
        second.throughput
    );
}

#[tokio::test(start_paused = true)]
async fn lone_bucket_converges_to_max_rate() {
    let bucket = AimdTokenBucket::new(BUDGET_PER_SECOND, 10, Duration::from_secs(6)).unwrap();
    let tokens = bucket.tokens().clone();

    let start = Instant::now();
    let mut consumed = 0u32;
    while start.elapsed() < Duration::from_secs(10) {
        let token = tokens.recv().await;
        assert!(token.rate_per_second() <= BUDGET_PER_SECOND + 1e-9);
        consumed += 1;
    }

    // 10s at 50 tokens/s.
    assert!((499..=501).contains(&consumed), "consumed {consumed} tokens");
    bucket.shutdown().await;
}
