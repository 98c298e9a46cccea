//! Token bucket with an AIMD (Additive Increase Multiplicative Decrease) refill rate
//!
//! A producer uses this crate to throttle itself when something downstream
//! reports congestion. The bucket refills at up to `max_rate` tokens per
//! second, and each token is permission for one unit of work.
//!
//! # Algorithm Overview
//!
//! 1. **Additive Increase**: on every tick the refill rate grows by a fixed step,
//!    so a full recovery from zero to `max_rate` takes `recovery_duration`
//! 2. **Multiplicative Decrease**: every call to [`AimdTokenBucket::backoff`]
//!    halves the refill rate (or divides it by up to two with [`JitterMode::Full`])
//!
//! The bucket starts empty. Tokens that would overflow `bucket_size` are shed,
//! never queued.
//!
//! # Concurrency
//! - One tokio task per bucket owns the rate state; ticks and backoffs are
//!   processed strictly one at a time
//! - Any number of tasks may consume tokens; each token goes to exactly one of them
//! - `backoff` and `stop` are synchronous and callable from any thread
//!
//! # Basic Usage
//! ```
//! use std::time::Duration;
//! use aimd_token_bucket::AimdTokenBucket;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bucket = AimdTokenBucket::new(100.0, 10, Duration::from_secs(5))?;
//!
//! let token = bucket.tokens().recv().await;
//! assert!(token.rate_per_second() <= 100.0);
//!
//! // The downstream said it is overloaded.
//! bucket.backoff();
//!
//! bucket.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//! See [`aimd::AimdSettings`] for the full set of tuning parameters.
//!
//! # Metrics
//! Emits metrics through the `metrics` facade via [`aimd::internal_event`].
pub mod aimd;
#[cfg(test)]
pub mod test_utils;

#[macro_use]
extern crate tracing;

pub use aimd::{AimdSettings, AimdTokenBucket, BuildError, JitterMode, Token, Tokens};
