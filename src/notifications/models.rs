//! Data models for the notification queue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a queued notification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    RetryWaiting,
    Sent, // terminal
    Dead, // terminal, kept for operator inspection
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Sent | JobStatus::Dead)
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::RetryWaiting => "RETRY_WAITING",
            JobStatus::Sent => "SENT",
            JobStatus::Dead => "DEAD",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "RETRY_WAITING" => Some(JobStatus::RetryWaiting),
            "SENT" => Some(JobStatus::Sent),
            "DEAD" => Some(JobStatus::Dead),
            _ => None,
        }
    }
}

/// A queued unit of work representing a pending outbound notification.
///
/// Delivery is at-least-once: a job claimed but not acknowledged is
/// redelivered, so duplicate sends are possible.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationJob {
    /// Unique identifier (UUID), assigned per enqueue.
    pub id: String,
    /// Recipient address, taken from the submitter's authenticated identity.
    pub to: String,
    pub submission_id: String,
    pub form_title: String,
    pub status: JobStatus,
    /// When the job was enqueued (unix millis).
    pub created_at: i64,
    /// When processing first started.
    pub started_at: Option<i64>,
    /// When the job reached a terminal state.
    pub completed_at: Option<i64>,
    /// Timestamp of the latest delivery attempt.
    pub last_attempt_at: Option<i64>,
    /// The job is not claimable before this instant.
    pub next_attempt_at: i64,
    /// Delivery attempts made so far (incremented at claim time).
    pub attempts_made: i64,
    /// Maximum delivery attempts before the job is dead-lettered.
    pub max_attempts: i64,
    /// Fixed delay between attempts, in milliseconds.
    pub backoff_ms: i64,
    pub last_error: Option<String>,
}

impl NotificationJob {
    pub fn new(
        to: String,
        submission_id: String,
        form_title: String,
        max_attempts: i64,
        backoff_ms: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            to,
            submission_id,
            form_title,
            status: JobStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            last_attempt_at: None,
            next_attempt_at: now,
            attempts_made: 0,
            max_attempts,
            backoff_ms,
            last_error: None,
        }
    }

    pub fn attempts_left(&self) -> i64 {
        (self.max_attempts - self.attempts_made).max(0)
    }
}
