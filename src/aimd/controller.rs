use super::{AimdSettings, JitterMode};

/// Outcome of a single tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Refill {
    /// Rate stamped on every token minted by this tick.
    pub rate_per_second: f64,
    /// Whole tokens that crossed the fill threshold on this tick.
    pub tokens: u64,
}

/// The AIMD rate law.
///
/// All quantities are kept per tick so the hot path is a handful of float
/// operations. The controller task is the only owner, which is why nothing
/// here is atomic.
#[derive(Debug)]
pub(crate) struct RateController {
    max_per_tick: f64,
    recovery_per_tick: f64,
    current_per_tick: f64,
    // Tokens are whole, the refill is not. Below one token per tick the
    // remainder has to carry over.
    fill: f64,
    ticks_per_second: f64,
    jitter_mode: JitterMode,
}

impl RateController {
    /// Expects settings that already passed validation.
    pub(crate) fn new(settings: &AimdSettings) -> Self {
        let tick = settings.tick_interval.as_secs_f64();
        let max_per_tick = settings.max_rate * tick;
        let recovery_per_tick = max_per_tick * tick / settings.recovery_duration.as_secs_f64();

        Self {
            max_per_tick,
            recovery_per_tick,
            current_per_tick: max_per_tick,
            fill: 0.0,
            ticks_per_second: 1.0 / tick,
            jitter_mode: settings.jitter_mode,
        }
    }

    /// Additive increase followed by the refill.
    pub(crate) fn tick(&mut self) -> Refill {
        self.current_per_tick =
            (self.current_per_tick + self.recovery_per_tick).min(self.max_per_tick);
        let rate_per_second = self.rate_per_second();

        self.fill += self.current_per_tick;
        let whole = self.fill.floor();
        self.fill -= whole;

        Refill {
            rate_per_second,
            tokens: whole as u64,
        }
    }

    /// Multiplicative decrease. Returns the new rate in tokens per second.
    ///
    /// The fill carried between ticks is left alone.
    pub(crate) fn backoff(&mut self) -> f64 {
        let divisor = match self.jitter_mode {
            JitterMode::None => 2.0,
            // random::<f64>() is in [0, 1), so the divisor is in (1, 2].
            JitterMode::Full => 2.0 - rand::random::<f64>(),
        };
        self.current_per_tick /= divisor;
        self.rate_per_second()
    }

    pub(crate) fn rate_per_second(&self) -> f64 {
        self.current_per_tick * self.ticks_per_second
    }

    #[cfg(test)]
    pub(crate) fn fill(&self) -> f64 {
        self.fill
    }
}
