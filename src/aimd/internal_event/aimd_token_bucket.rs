use metrics::{Counter, Histogram, counter, histogram};

use super::RegisteredEvent;

#[derive(Clone, Copy, Debug)]
pub struct TokensMintedData {
    pub minted: u64,
    pub dropped: u64,
    pub rate_per_second: f64,
}

pub struct TokensMinted {
    bucket: String,
    minted: Counter,
    dropped: Counter,
}

impl TokensMinted {
    pub fn register(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_owned(),
            minted: counter!("aimd_token_bucket_tokens_minted_total", "bucket" => bucket.to_owned()),
            dropped: counter!("aimd_token_bucket_tokens_dropped_total", "bucket" => bucket.to_owned()),
        }
    }
}

impl RegisteredEvent for TokensMinted {
    type Data = TokensMintedData;

    fn emit(&self, data: TokensMintedData) {
        self.minted.increment(data.minted);
        if data.dropped > 0 {
            self.dropped.increment(data.dropped);
            trace!(
                target: "aimd_token_bucket::stats",
                bucket = %self.bucket,
                minted = data.minted,
                dropped = data.dropped,
                rate_per_second = data.rate_per_second,
                "Bucket full, shedding tokens."
            );
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BackoffAppliedData {
    pub previous_rate: f64,
    pub rate: f64,
}

pub struct BackoffApplied {
    bucket: String,
    backoffs: Counter,
}

impl BackoffApplied {
    pub fn register(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_owned(),
            backoffs: counter!("aimd_token_bucket_backoffs_total", "bucket" => bucket.to_owned()),
        }
    }
}

impl RegisteredEvent for BackoffApplied {
    type Data = BackoffAppliedData;

    fn emit(&self, data: BackoffAppliedData) {
        self.backoffs.increment(1);
        debug!(
            target: "aimd_token_bucket::stats",
            bucket = %self.bucket,
            previous_rate = data.previous_rate,
            rate = data.rate,
            "Backing off."
        );
    }
}

pub struct RateChanged {
    // A histogram rather than a gauge: the rate can move on every tick, and
    // each intermediate value is useful when diagnosing a sawtooth.
    rate: Histogram,
}

impl RateChanged {
    pub fn register(bucket: &str) -> Self {
        Self {
            rate: histogram!("aimd_token_bucket_rate", "bucket" => bucket.to_owned()),
        }
    }
}

impl RegisteredEvent for RateChanged {
    type Data = f64;

    fn emit(&self, rate_per_second: f64) {
        self.rate.record(rate_per_second);
    }
}

pub struct BucketStopped {
    bucket: String,
}

impl BucketStopped {
    pub fn register(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_owned(),
        }
    }
}

impl RegisteredEvent for BucketStopped {
    type Data = f64;

    fn emit(&self, rate_per_second: f64) {
        info!(
            bucket = %self.bucket,
            rate_per_second,
            "Token bucket stopped; no further tokens will be minted."
        );
    }
}
