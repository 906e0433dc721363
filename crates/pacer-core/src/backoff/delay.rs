use std::time::Duration;

use pacer_model::BackoffConfig;

/// Largest nanosecond count accepted before conversion; anything above clamps to `max_delay`.
const MAX_NANOS: f64 = (i64::MAX - 512) as f64;

/// Delay to wait before running `attempt`.
///
/// `0` for the first attempt, otherwise `min_delay * factor^attempt` bounded by
/// `[min_delay, max_delay]`. The lower bound is applied first, so `min_delay > max_delay`
/// resolves to `max_delay` whenever the computed value exceeds it.
pub(crate) fn delay_for(cfg: &BackoffConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let growth = cfg.factor.powf(f64::from(attempt));
    let nanos = cfg.min_delay.as_nanos() as f64 * growth;
    if nanos > MAX_NANOS {
        return cfg.max_delay;
    }

    // Negative and NaN saturate to zero here and are lifted by the floor below.
    let d = Duration::from_nanos(nanos as u64);
    if d < cfg.min_delay {
        return cfg.min_delay;
    }
    if d > cfg.max_delay {
        return cfg.max_delay;
    }
    d
}
