//! Configuration for the sync engine.

use serde::{Deserialize, Serialize};
use shadowsync_document::ShadowKey;
use std::time::Duration;

/// Default number of worker threads for realtime syncing.
pub const DEFAULT_PARALLELISM: usize = 1;
/// Default request queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
/// Default interval between periodic sync ticks.
pub const DEFAULT_PERIODIC_INTERVAL: Duration = Duration::from_secs(300);
/// Default time to wait for in-flight executors on stop.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Which side's mutations propagate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Mutations propagate both ways.
    #[default]
    BetweenDeviceAndCloud,
    /// Only device mutations propagate to the cloud.
    DeviceToCloud,
    /// Only cloud mutations propagate to the device.
    CloudToDevice,
}

impl Direction {
    /// Returns true if cloud-bound requests (device → cloud) are permitted.
    pub fn allows_cloud_bound(&self) -> bool {
        !matches!(self, Direction::CloudToDevice)
    }

    /// Returns true if device-bound requests (cloud → device) are permitted.
    pub fn allows_device_bound(&self) -> bool {
        !matches!(self, Direction::DeviceToCloud)
    }
}

/// Which drainer policy empties the request queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Worker pool draining continuously.
    Realtime,
    /// Single scheduled thread draining on an interval.
    Periodic,
}

/// Strategy selection with its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// The drainer policy.
    pub kind: StrategyKind,
    /// Tick interval for the periodic strategy. Ignored by realtime.
    #[serde(with = "duration_secs", default = "default_interval")]
    pub interval: Duration,
}

impl StrategyConfig {
    /// Realtime strategy.
    pub fn realtime() -> Self {
        Self {
            kind: StrategyKind::Realtime,
            interval: DEFAULT_PERIODIC_INTERVAL,
        }
    }

    /// Periodic strategy with the given tick interval.
    pub fn periodic(interval: Duration) -> Self {
        Self {
            kind: StrategyKind::Periodic,
            interval,
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::realtime()
    }
}

fn default_interval() -> Duration {
    DEFAULT_PERIODIC_INTERVAL
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// An atomic configuration snapshot.
///
/// A reload replaces the whole snapshot; the handler diffs it against the
/// previous one and applies the differences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfiguration {
    /// Strategy selection.
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Sync direction.
    #[serde(default)]
    pub direction: Direction,
    /// The set of shadows to sync.
    #[serde(default)]
    pub synced_shadows: Vec<ShadowKey>,
    /// Worker threads for the realtime strategy.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

impl Default for SyncConfiguration {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            direction: Direction::default(),
            synced_shadows: Vec::new(),
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

/// Engine-level tuning shared by all strategies.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Request queue capacity.
    pub queue_capacity: usize,
    /// Retry policy for retryable executor failures.
    pub retry: RetryConfig,
    /// Time to wait for in-flight executors when stopping.
    pub shutdown_timeout: Duration,
}

impl EngineConfig {
    /// Creates the default engine configuration.
    pub fn new() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry: RetryConfig::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Sets the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Jitter fraction applied symmetrically (`0.1` = ±10%).
    pub jitter: f64,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before the given retry (1-indexed; attempt 0 is
    /// the initial try and has no delay).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.jitter > 0.0 {
            // Symmetric jitter in [-jitter, +jitter].
            let offset = capped * self.jitter * (rand_jitter() * 2.0 - 1.0);
            Duration::from_secs_f64((capped + offset).max(0.0))
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Simple deterministic "jitter" (no external RNG dependency).
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}
