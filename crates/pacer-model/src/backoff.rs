use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Default growth factor applied per attempt.
pub const DEFAULT_FACTOR: f64 = 2.0;

/// Default floor for a nonzero delay (in milliseconds).
pub const DEFAULT_MIN_MS: u64 = 100;

/// Default ceiling for any delay (in milliseconds).
pub const DEFAULT_MAX_MS: u64 = 10_000;

/// Exponential backoff parameters.
///
/// Values are never validated: a zero or negative factor, `min_delay > max_delay`
/// or zero durations are all legal and get resolved by clamping at the point where
/// a delay is computed.
///
/// On the wire delays are expressed in milliseconds:
/// ```json
/// { "maxAttempts": 5, "factor": 2.0, "minMs": 250, "maxMs": 5000 }
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffConfig {
    /// Max number of attempts; `0` means unlimited.
    pub max_attempts: u32,
    /// Multiplier applied to `min_delay` per attempt.
    pub factor: f64,
    /// Lower bound for any nonzero delay.
    #[serde(rename = "minMs", with = "millis")]
    pub min_delay: Duration,
    /// Upper bound for any delay.
    #[serde(rename = "maxMs", with = "millis")]
    pub max_delay: Duration,
}

impl BackoffConfig {
    /// Convenience constructor.
    pub fn new(max_attempts: u32, factor: f64, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            factor,
            min_delay,
            max_delay,
        }
    }

    /// Returns `true` when the number of attempts is not limited.
    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            factor: DEFAULT_FACTOR,
            min_delay: Duration::from_millis(DEFAULT_MIN_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_MS),
        }
    }
}

impl fmt::Display for BackoffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackoffConfig(max_attempts={}, factor={}, min={:?}, max={:?})",
            self.max_attempts, self.factor, self.min_delay, self.max_delay,
        )
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
