//! Metrics and log lines emitted by the controller task.
//!
//! Metric handles are registered once when a bucket is built and reused on
//! every emission, so the per-tick cost is an atomic add.

mod aimd_token_bucket;

pub use aimd_token_bucket::{
    BackoffApplied, BackoffAppliedData, BucketStopped, RateChanged, TokensMinted,
    TokensMintedData,
};

/// An event whose metric handles are resolved ahead of time.
pub trait RegisteredEvent {
    type Data;

    fn emit(&self, data: Self::Data);
}

/// Every event a single bucket emits, registered under one `bucket` label.
pub(crate) struct BucketEvents {
    pub tokens_minted: TokensMinted,
    pub backoff_applied: BackoffApplied,
    pub rate_changed: RateChanged,
    pub stopped: BucketStopped,
}

impl BucketEvents {
    pub(crate) fn register(bucket: &str) -> Self {
        Self {
            tokens_minted: TokensMinted::register(bucket),
            backoff_applied: BackoffApplied::register(bucket),
            rate_changed: RateChanged::register(bucket),
            stopped: BucketStopped::register(bucket),
        }
    }
}
