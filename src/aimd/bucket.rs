use std::time::Duration;

use snafu::{ResultExt, ensure};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant},
};

use super::{
    AimdSettings, RateController, Token, Tokens,
    error::{
        BuildError, InvalidMaxRateSnafu, NoRuntimeSnafu, ZeroBucketSizeSnafu,
        ZeroRecoveryDurationSnafu, ZeroTickIntervalSnafu,
    },
    internal_event::{BackoffAppliedData, BucketEvents, RegisteredEvent, TokensMintedData},
    tokens,
};

/// A token bucket whose refill rate follows AIMD.
///
/// Building one spawns a controller task on the current tokio runtime. That
/// task owns the rate and is the only writer of the token queue. The handle
/// only sends it signals, so every method here is synchronous and cheap
/// except [`shutdown`](Self::shutdown).
///
/// Dropping the handle stops the controller. Clones of [`Tokens`] handed out
/// earlier can still drain whatever was queued.
#[derive(Debug)]
pub struct AimdTokenBucket {
    tokens: Tokens,
    backoff: mpsc::UnboundedSender<()>,
    shutdown: watch::Sender<bool>,
    rate: watch::Receiver<f64>,
    worker: JoinHandle<()>,
}

impl AimdTokenBucket {
    /// Builds a bucket that refills at up to `max_rate` tokens per second,
    /// holds at most `bucket_size` tokens and recovers from a rate of zero to
    /// `max_rate` over `recovery_duration`.
    ///
    /// The bucket starts empty. Must be called from within a tokio runtime.
    pub fn new(
        max_rate: f64,
        bucket_size: usize,
        recovery_duration: Duration,
    ) -> Result<Self, BuildError> {
        Self::with_settings(
            AimdSettings::builder()
                .max_rate(max_rate)
                .bucket_size(bucket_size)
                .recovery_duration(recovery_duration)
                .build(),
        )
    }

    pub fn with_settings(settings: AimdSettings) -> Result<Self, BuildError> {
        validate(&settings)?;
        let runtime = tokio::runtime::Handle::try_current().context(NoRuntimeSnafu)?;

        let controller = RateController::new(&settings);
        let (sender, tokens) = tokens::channel(settings.bucket_size);
        let (backoff, backoff_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (rate_tx, rate) = watch::channel(controller.rate_per_second());

        debug!(
            bucket = settings.name(),
            max_rate = settings.max_rate,
            bucket_size = settings.bucket_size,
            recovery_duration_ms = settings.recovery_duration.as_millis() as u64,
            tick_interval_ms = settings.tick_interval.as_millis() as u64,
            jitter_mode = ?settings.jitter_mode,
            "Starting AIMD token bucket."
        );

        let worker = Worker {
            controller,
            sender,
            rate: rate_tx,
            events: BucketEvents::register(settings.name()),
        };
        let worker = runtime.spawn(worker.run(settings.tick_interval, backoff_rx, shutdown_rx));

        Ok(Self {
            tokens,
            backoff,
            shutdown,
            rate,
            worker,
        })
    }

    /// The consuming end of the bucket.
    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    /// Signals congestion, halving the refill rate.
    ///
    /// Never blocks. Every call is applied on its own, so `n` calls halve the
    /// rate `n` times. After [`stop`](Self::stop) this does nothing.
    pub fn backoff(&self) {
        if self.backoff.send(()).is_err() {
            trace!(message = "Backoff after stop ignored.");
        }
    }

    /// Stops minting tokens. Tokens already queued can still be consumed.
    ///
    /// Calling this more than once is harmless. There is no way to restart a
    /// stopped bucket; build a new one instead.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Stops the bucket and waits for the controller task to finish.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(error) = self.worker.await {
            error!(message = "Token bucket controller task failed.", %error);
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// The refill rate in tokens per second as of the latest tick or backoff.
    pub fn current_rate(&self) -> f64 {
        *self.rate.borrow()
    }
}

fn validate(settings: &AimdSettings) -> Result<(), BuildError> {
    ensure!(
        settings.max_rate.is_finite() && settings.max_rate > 0.0,
        InvalidMaxRateSnafu {
            max_rate: settings.max_rate
        }
    );
    ensure!(settings.bucket_size > 0, ZeroBucketSizeSnafu);
    ensure!(
        !settings.recovery_duration.is_zero(),
        ZeroRecoveryDurationSnafu
    );
    ensure!(!settings.tick_interval.is_zero(), ZeroTickIntervalSnafu);
    Ok(())
}

/// State moved into the controller task.
struct Worker {
    controller: RateController,
    sender: mpsc::Sender<Token>,
    rate: watch::Sender<f64>,
    events: BucketEvents,
}

impl Worker {
    async fn run(
        mut self,
        tick_interval: Duration,
        mut backoff: mpsc::UnboundedReceiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        // The first refill happens one interval after start, not immediately.
        let mut ticker = time::interval_at(Instant::now() + tick_interval, tick_interval);

        loop {
            tokio::select! {
                biased;

                // Also fires when the handle is dropped.
                _ = shutdown.changed() => break,

                Some(()) = backoff.recv() => self.on_backoff(),

                _ = ticker.tick() => self.on_tick(),
            }
        }

        self.events.stopped.emit(self.controller.rate_per_second());
    }

    fn on_tick(&mut self) {
        let refill = self.controller.tick();

        let token = Token::new(refill.rate_per_second);
        let mut sent = 0;
        while sent < refill.tokens {
            // A full bucket stays full; the surplus is thrown away. Stop at the
            // first rejection, a huge rate can mint more than fits in memory.
            if self.sender.try_send(token).is_err() {
                break;
            }
            sent += 1;
        }

        if refill.tokens > 0 {
            self.events.tokens_minted.emit(TokensMintedData {
                minted: sent,
                dropped: refill.tokens - sent,
                rate_per_second: refill.rate_per_second,
            });
        }
        self.publish_rate(refill.rate_per_second);
    }

    fn on_backoff(&mut self) {
        let previous_rate = self.controller.rate_per_second();
        let rate = self.controller.backoff();
        self.events.backoff_applied.emit(BackoffAppliedData {
            previous_rate,
            rate,
        });
        self.publish_rate(rate);
    }

    fn publish_rate(&self, rate: f64) {
        let changed = self.rate.send_if_modified(|current| {
            if *current == rate {
                false
            } else {
                *current = rate;
                true
            }
        });
        if changed {
            self.events.rate_changed.emit(rate);
        }
    }
}
