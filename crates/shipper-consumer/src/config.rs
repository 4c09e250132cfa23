//! Consumer configuration.

use std::time::Duration;

use shipper_bus::{StartPolicy, SubscribeOptions};

use crate::error::{ConsumerError, Result};

/// Default topic events are read from.
pub const DEFAULT_TOPIC: &str = "icinga";

/// Default number of messages indexed concurrently.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default delay after the first failed receive.
pub const DEFAULT_RECEIVE_BACKOFF: Duration = Duration::from_millis(100);

/// Upper bound on the delay between failed receives.
pub const MAX_RECEIVE_BACKOFF: Duration = Duration::from_secs(5);

/// Default number of consecutive failed receives before the run gives up.
pub const DEFAULT_MAX_RECEIVE_FAILURES: u32 = 10;

/// Settings for [`crate::Consumer`] and [`crate::Subscriber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Topic to subscribe to.
    pub topic: String,
    /// Durable cursor name; restarts with the same name resume.
    pub durable_name: String,
    /// Queue group shared by load-balanced instances.
    pub queue_group: Option<String>,
    /// Where a new durable starts.
    pub start: StartPolicy,
    /// Remove the durable cursor on orderly exit.
    pub delete_durable_on_exit: bool,
    /// Messages processed concurrently.
    pub worker_count: usize,
    /// Delay after the first failed receive; doubles per consecutive failure.
    pub receive_backoff: Duration,
    /// Consecutive failed receives tolerated before the run fails.
    pub max_receive_failures: u32,
}

impl ConsumerConfig {
    /// Creates a config for the given durable name.
    #[must_use]
    pub fn new(durable_name: impl Into<String>) -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            durable_name: durable_name.into(),
            queue_group: None,
            start: StartPolicy::DeliverAll,
            delete_durable_on_exit: false,
            worker_count: DEFAULT_WORKER_COUNT,
            receive_backoff: DEFAULT_RECEIVE_BACKOFF,
            max_receive_failures: DEFAULT_MAX_RECEIVE_FAILURES,
        }
    }

    /// Sets the topic.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Sets the queue group.
    #[must_use]
    pub fn with_queue_group(mut self, group: Option<String>) -> Self {
        self.queue_group = group;
        self
    }

    /// Sets the start policy.
    #[must_use]
    pub const fn with_start(mut self, start: StartPolicy) -> Self {
        self.start = start;
        self
    }

    /// Deletes the durable cursor on exit.
    #[must_use]
    pub const fn with_delete_durable_on_exit(mut self, delete: bool) -> Self {
        self.delete_durable_on_exit = delete;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Sets the delay after the first failed receive.
    #[must_use]
    pub const fn with_receive_backoff(mut self, backoff: Duration) -> Self {
        self.receive_backoff = backoff;
        self
    }

    /// Sets how many consecutive failed receives are tolerated.
    #[must_use]
    pub const fn with_max_receive_failures(mut self, failures: u32) -> Self {
        self.max_receive_failures = failures;
        self
    }

    /// Delay before receiving again after `failures` consecutive failures.
    #[must_use]
    pub fn receive_backoff_after(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.receive_backoff
            .saturating_mul(1 << shift)
            .min(MAX_RECEIVE_BACKOFF)
    }

    /// Bus subscription options for this config.
    #[must_use]
    pub fn subscribe_options(&self) -> SubscribeOptions {
        let mut options = SubscribeOptions::new(self.topic.clone(), self.durable_name.clone())
            .with_start(self.start)
            .with_delete_durable_on_close(self.delete_durable_on_exit);
        if let Some(group) = &self.queue_group {
            options = options.with_queue_group(group.clone());
        }
        options
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.topic.is_empty() {
            return Err(ConsumerError::Config("topic must not be empty".to_string()));
        }
        if self.durable_name.is_empty() {
            return Err(ConsumerError::Config(
                "durable name must not be empty".to_string(),
            ));
        }
        if self.queue_group.as_deref().is_some_and(str::is_empty) {
            return Err(ConsumerError::Config(
                "queue group must not be empty".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(ConsumerError::Config(
                "worker count must be positive".to_string(),
            ));
        }
        if self.max_receive_failures == 0 {
            return Err(ConsumerError::Config(
                "max receive failures must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
