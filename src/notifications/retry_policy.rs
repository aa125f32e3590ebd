//! Retry policy for notification delivery.
//!
//! Fixed backoff with a bounded attempt count: each job is tried up to
//! `max_attempts` times with `backoff_ms` between attempts, then dead-lettered.

use super::models::NotificationJob;
use crate::config::NotificationSettings;

pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;
pub const DEFAULT_BACKOFF_MS: i64 = 5_000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts a freshly enqueued job is granted.
    pub max_attempts: i64,
    /// Fixed delay between attempts, in milliseconds.
    pub backoff_ms: i64,
}

impl RetryPolicy {
    pub fn new(settings: &NotificationSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            backoff_ms: settings.backoff_ms,
        }
    }

    /// Whether a just-failed job has attempts left. `attempts_made` already
    /// includes the failed attempt.
    pub fn should_retry(&self, job: &NotificationJob) -> bool {
        job.attempts_made < job.max_attempts
    }

    /// When a failed job becomes claimable again.
    pub fn next_attempt_at(&self, job: &NotificationJob, now: i64) -> i64 {
        now + job.backoff_ms
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_attempts(attempts_made: i64, max_attempts: i64, backoff_ms: i64) -> NotificationJob {
        let mut job = NotificationJob::new(
            "a@example.com".to_string(),
            "sub-1".to_string(),
            "Form".to_string(),
            max_attempts,
            backoff_ms,
        );
        job.attempts_made = attempts_made;
        job
    }

    #[test]
    fn default_policy_matches_queue_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_ms, 5000);
    }

    #[test]
    fn new_from_settings() {
        let settings = NotificationSettings {
            max_attempts: 5,
            backoff_ms: 250,
            ..Default::default()
        };
        let policy = RetryPolicy::new(&settings);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff_ms, 250);
    }

    #[test]
    fn retries_until_attempts_exhausted() {
        let policy = RetryPolicy::default();

        assert!(policy.should_retry(&job_with_attempts(1, 3, 5000)));
        assert!(policy.should_retry(&job_with_attempts(2, 3, 5000)));
        assert!(!policy.should_retry(&job_with_attempts(3, 3, 5000)));
        assert!(!policy.should_retry(&job_with_attempts(4, 3, 5000)));
    }

    #[test]
    fn backoff_is_fixed() {
        let policy = RetryPolicy::default();
        let job = job_with_attempts(1, 3, 5000);

        assert_eq!(policy.next_attempt_at(&job, 1_000), 6_000);
        let job = job_with_attempts(2, 3, 5000);
        assert_eq!(policy.next_attempt_at(&job, 1_000), 6_000);
    }
}
