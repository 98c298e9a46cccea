//! Two producers share a downstream that only takes 50 requests per second.
//!
//! Each producer gates its requests on its own AIMD token bucket and backs off
//! whenever the downstream rejects a request. Run with
//! `cargo run --example competing_clients` and watch both settle around
//! half of the budget.

use std::collections::VecDeque;
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use aimd_token_bucket::{AimdSettings, AimdTokenBucket, JitterMode};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

const ENV_BUDGET_PER_SECOND: &str = "DEMO_BUDGET_PER_SECOND";
const ENV_BUCKET_SIZE: &str = "DEMO_BUCKET_SIZE";
const ENV_RECOVERY_SECS: &str = "DEMO_RECOVERY_SECS";
const ENV_RUN_SECS: &str = "DEMO_RUN_SECS";
const ENV_JITTER: &str = "DEMO_JITTER";

// Helper to parse environment variables with a default
fn get_env_var<T: FromStr + std::fmt::Debug>(var_name: &str, default_value: T) -> T
where
    <T as FromStr>::Err: std::fmt::Debug,
{
    env::var(var_name)
        .ok()
        .and_then(|val_str| match val_str.parse::<T>() {
            Ok(val) => Some(val),
            Err(e) => {
                warn!(
                    "Failed to parse env var '{}' (value: '{}'). Error: {:?}. Using default: {:?}",
                    var_name, val_str, e, default_value
                );
                None
            }
        })
        .unwrap_or(default_value)
}

/// Accepts a request unless the last few requests arrived faster than the budget allows.
struct Downstream {
    budget_per_second: f64,
    recent: Mutex<VecDeque<Instant>>,
}

impl Downstream {
    const WINDOW: usize = 5;

    fn new(budget_per_second: f64) -> Self {
        Self {
            budget_per_second,
            recent: Mutex::new(VecDeque::with_capacity(Self::WINDOW)),
        }
    }

    async fn accept(&self) -> bool {
        let now = Instant::now();
        let mut recent = self.recent.lock().await;
        recent.push_back(now);
        if recent.len() <= Self::WINDOW {
            return true;
        }

        let oldest = recent.pop_front().unwrap_or(now);
        let per_request = now.duration_since(oldest).as_secs_f64() / Self::WINDOW as f64;
        per_request >= 1.0 / self.budget_per_second
    }
}

async fn run_client(
    name: &'static str,
    bucket: AimdTokenBucket,
    downstream: Arc<Downstream>,
    run_for: Duration,
) {
    let start = Instant::now();
    let mut report = tokio::time::interval(Duration::from_secs(1));
    let mut accepted = 0u64;
    let mut rejected = 0u64;
    let mut last_rate = 0.0;

    while start.elapsed() < run_for {
        tokio::select! {
            token = bucket.tokens().recv() => {
                last_rate = token.rate_per_second();
                if downstream.accept().await {
                    accepted += 1;
                } else {
                    rejected += 1;
                    bucket.backoff();
                }
            }
            _ = report.tick() => {
                info!(
                    client = name,
                    rate_per_second = last_rate,
                    accepted,
                    rejected,
                    "Client status."
                );
            }
        }
    }

    bucket.shutdown().await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let default_log_filter = "info,aimd_token_bucket=info";
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| default_log_filter.to_string()))
        .init();

    let budget: f64 = get_env_var(ENV_BUDGET_PER_SECOND, 50.0);
    let bucket_size: usize = get_env_var(ENV_BUCKET_SIZE, 10);
    let recovery = Duration::from_secs(get_env_var(ENV_RECOVERY_SECS, 6));
    let run_for = Duration::from_secs(get_env_var(ENV_RUN_SECS, 30));
    let jitter_mode = if get_env_var(ENV_JITTER, false) {
        JitterMode::Full
    } else {
        JitterMode::None
    };

    info!(budget, bucket_size, ?recovery, ?run_for, ?jitter_mode, "Starting demo.");

    let downstream = Arc::new(Downstream::new(budget));
    let mut clients = Vec::new();
    for name in ["client-a", "client-b"] {
        // Each client believes it may use the whole budget.
        let settings = AimdSettings::builder()
            .max_rate(budget)
            .bucket_size(bucket_size)
            .recovery_duration(recovery)
            .jitter_mode(jitter_mode)
            .name(name)
            .build();
        let bucket = AimdTokenBucket::with_settings(settings)?;
        clients.push(tokio::spawn(run_client(
            name,
            bucket,
            Arc::clone(&downstream),
            run_for,
        )));
    }

    for client in clients {
        client.await?;
    }
    info!("Demo finished.");
    Ok(())
}
