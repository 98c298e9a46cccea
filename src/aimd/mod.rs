//! Refill a token bucket at a rate driven by congestion feedback.

mod bucket;
mod controller;
mod error;
pub mod internal_event;
mod tokens;

use std::time::Duration;

use bon::Builder;

pub use bucket::AimdTokenBucket;
pub use error::BuildError;
pub use tokens::{Token, Tokens};

pub(crate) use controller::RateController;

/// How often the controller adds water to the bucket unless configured otherwise.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

const DEFAULT_BUCKET_NAME: &str = "default";

/// The jitter mode applied to the multiplicative decrease.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterMode {
    /// No jitter. Every backoff halves the rate exactly.
    #[default]
    None,

    /// Full jitter.
    ///
    /// Every backoff divides the rate by a random factor in `(1, 2]`, so the
    /// rate drops by up to 50%. Buckets that are signalled at the same moment
    /// then recover out of step with each other instead of in lockstep.
    Full,
}

/// Configuration of an [`AimdTokenBucket`].
///
/// The three required parameters mirror [`AimdTokenBucket::new`]. The rest
/// rarely need changing.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `max_rate` | required | Refill ceiling in tokens per second |
/// | `bucket_size` | required | Most tokens the bucket holds at once |
/// | `recovery_duration` | required | Time for the rate to climb from zero back to `max_rate` |
/// | `tick_interval` | 10ms | Refill granularity |
/// | `jitter_mode` | `None` | Randomisation of the backoff factor |
/// | `name` | `"default"` | Value of the `bucket` label on metrics and logs |
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use aimd_token_bucket::aimd::AimdSettings;
/// use aimd_token_bucket::JitterMode;
///
/// let settings = AimdSettings::builder()
///     .max_rate(50.0)
///     .bucket_size(10)
///     .recovery_duration(Duration::from_secs(6))
///     .jitter_mode(JitterMode::Full)
///     .name("search-backend")
///     .build();
///
/// assert_eq!(settings.name(), "search-backend");
/// ```
#[derive(Clone, Debug, Builder)]
pub struct AimdSettings {
    /// Upper bound of the refill rate in tokens per second. The bucket starts
    /// refilling at this rate.
    ///
    /// **Range**: finite and greater than zero
    pub(super) max_rate: f64,

    /// Capacity of the token queue. Tokens minted while the queue is full are
    /// discarded, so a bucket left alone never holds more than this.
    ///
    /// **Range**: at least 1
    pub(super) bucket_size: usize,

    /// How long a full recovery from a rate of zero back up to `max_rate`
    /// takes. Recovery is linear, so recovering from a single halving takes
    /// half of this.
    ///
    /// **Range**: greater than zero
    pub(super) recovery_duration: Duration,

    /// How often the controller evaluates the refill.
    ///
    /// **Default**: 10ms
    #[builder(default = DEFAULT_TICK_INTERVAL)]
    pub(super) tick_interval: Duration,

    /// Randomisation of the backoff factor.
    ///
    /// **Default**: [`JitterMode::None`]
    #[builder(default)]
    pub(super) jitter_mode: JitterMode,

    /// Identifies the bucket in metrics and logs when a process runs several.
    #[builder(into)]
    pub(super) name: Option<String>,
}

impl AimdSettings {
    pub fn max_rate(&self) -> f64 {
        self.max_rate
    }
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }
    pub fn recovery_duration(&self) -> Duration {
        self.recovery_duration
    }
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
    pub fn jitter_mode(&self) -> JitterMode {
        self.jitter_mode
    }
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_BUCKET_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let settings = AimdSettings::builder()
            .max_rate(1.5)
            .bucket_size(4)
            .recovery_duration(Duration::from_secs(3))
            .build();

        assert_eq!(settings.tick_interval(), DEFAULT_TICK_INTERVAL);
        assert_eq!(settings.jitter_mode(), JitterMode::None);
        assert_eq!(settings.name(), "default");
        assert_eq!(settings.bucket_size(), 4);
    }
}
