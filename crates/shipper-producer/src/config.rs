//! Producer configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::checkpoint::DEFAULT_CHECKPOINT_PATH;
use crate::error::{ProducerError, Result};

/// Default topic events are published to.
pub const DEFAULT_TOPIC: &str = "icinga";

/// Default pause between polls at end of file.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default capacity of the queue between tailer and publisher.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default time allowed to drain the queue on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How the tailer opens and follows the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailConfig {
    /// File to follow.
    pub path: PathBuf,
    /// Byte offset to start reading at.
    pub start_offset: u64,
    /// Fail instead of waiting when the file cannot be opened.
    pub must_exist: bool,
    /// Pause between polls at end of file.
    pub poll_interval: Duration,
}

impl TailConfig {
    /// Follows `path` from its beginning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            start_offset: 0,
            must_exist: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the starting offset.
    #[must_use]
    pub const fn with_start_offset(mut self, offset: u64) -> Self {
        self.start_offset = offset;
        self
    }

    /// Requires the file to exist when the tailer opens.
    #[must_use]
    pub const fn with_must_exist(mut self, must_exist: bool) -> Self {
        self.must_exist = must_exist;
        self
    }

    /// Sets the end-of-file poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Retry schedule for publishing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Sets the total number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the first retry delay.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Settings for [`crate::Producer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Log file to ship.
    pub file: PathBuf,
    /// Checkpoint file.
    pub checkpoint: PathBuf,
    /// Topic to publish to.
    pub topic: String,
    /// Fail at startup if the log file is missing.
    pub must_exist: bool,
    /// End-of-file poll interval.
    pub poll_interval: Duration,
    /// Capacity of the tailer to publisher queue.
    pub queue_capacity: usize,
    /// Save the published offset this often; `None` saves only on shutdown.
    pub checkpoint_interval: Option<Duration>,
    /// Time allowed to publish queued events on shutdown.
    pub drain_timeout: Duration,
    /// Publish retry schedule.
    pub retry: RetryPolicy,
}

impl ProducerConfig {
    /// Creates a config shipping `file` with defaults for everything else.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            checkpoint: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            topic: DEFAULT_TOPIC.to_string(),
            must_exist: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            checkpoint_interval: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Sets the checkpoint file.
    #[must_use]
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = path.into();
        self
    }

    /// Sets the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Requires the log file to exist at startup.
    #[must_use]
    pub const fn with_must_exist(mut self, must_exist: bool) -> Self {
        self.must_exist = must_exist;
        self
    }

    /// Sets the end-of-file poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Enables periodic checkpointing.
    #[must_use]
    pub const fn with_checkpoint_interval(mut self, interval: Option<Duration>) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Sets the shutdown drain timeout.
    #[must_use]
    pub const fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Sets the publish retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Tailer settings starting at `start_offset`.
    #[must_use]
    pub fn tail_config(&self, start_offset: u64) -> TailConfig {
        TailConfig::new(self.file.clone())
            .with_start_offset(start_offset)
            .with_must_exist(self.must_exist)
            .with_poll_interval(self.poll_interval)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProducerError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.file.as_os_str().is_empty() {
            return Err(ProducerError::Config("file must not be empty".to_string()));
        }
        if self.checkpoint.as_os_str().is_empty() {
            return Err(ProducerError::Config(
                "checkpoint must not be empty".to_string(),
            ));
        }
        if self.topic.is_empty() {
            return Err(ProducerError::Config("topic must not be empty".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ProducerError::Config(
                "queue capacity must be positive".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ProducerError::Config(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.checkpoint_interval.is_some_and(|d| d.is_zero()) {
            return Err(ProducerError::Config(
                "checkpoint interval must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ProducerError::Config(
                "publish attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ProducerConfig::new("icinga.log");
        assert_eq!(config.checkpoint, PathBuf::from("seek"));
        assert_eq!(config.topic, "icinga");
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.drain_timeout, Duration::from_secs(5));
        assert!(config.checkpoint_interval.is_none());
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tail_config_carries_file_settings() {
        let config = ProducerConfig::new("icinga.log")
            .with_must_exist(true)
            .with_poll_interval(Duration::from_millis(10));
        let tail = config.tail_config(42);
        assert_eq!(tail.path, PathBuf::from("icinga.log"));
        assert_eq!(tail.start_offset, 42);
        assert!(tail.must_exist);
        assert_eq!(tail.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let base = ProducerConfig::new("icinga.log");
        assert!(base.clone().with_topic("").validate().is_err());
        assert!(base.clone().with_queue_capacity(0).validate().is_err());
        assert!(base.clone().with_checkpoint("").validate().is_err());
        assert!(
            base.clone()
                .with_checkpoint_interval(Some(Duration::ZERO))
                .validate()
                .is_err()
        );
        assert!(
            base.with_retry(RetryPolicy::default().with_max_attempts(0))
                .validate()
                .is_err()
        );
        assert!(ProducerConfig::new("").validate().is_err());
    }

    #[test]
    fn retry_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(400));
        assert_eq!(policy.delay_after(3), Duration::from_millis(800));
        assert_eq!(policy.delay_after(10), Duration::from_secs(5));
        assert_eq!(policy.delay_after(100), Duration::from_secs(5));
    }
}
