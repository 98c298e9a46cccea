use snafu::Snafu;

/// Reasons an [`AimdTokenBucket`](super::AimdTokenBucket) could not be built.
///
/// All of these are caught before the controller task is spawned, so a
/// failed construction leaves nothing running.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BuildError {
    /// The maximum rate was zero, negative, NaN or infinite.
    #[snafu(display("max rate must be a positive, finite number of tokens per second, got {max_rate}"))]
    InvalidMaxRate { max_rate: f64 },

    /// A bucket must be able to hold at least one token.
    #[snafu(display("bucket size must be at least 1"))]
    ZeroBucketSize,

    /// The per-tick recovery step divides by the recovery duration.
    #[snafu(display("recovery duration must be greater than zero"))]
    ZeroRecoveryDuration,

    #[snafu(display("tick interval must be greater than zero"))]
    ZeroTickInterval,

    /// The bucket was built outside of a tokio runtime, so there is nothing
    /// to drive the controller task.
    #[snafu(display("no tokio runtime to drive the token bucket: {source}"))]
    NoRuntime {
        source: tokio::runtime::TryCurrentError,
    },
}
