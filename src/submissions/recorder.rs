//! Recording of validated submissions.
//!
//! One guaranteed outcome per submission (the row insert) and two
//! best-effort outcomes (audit entry, notification enqueue) whose failures
//! are observable only through logs and metrics, never through the caller's
//! response.

use std::sync::Arc;

use tracing::{error, warn};

use super::audit_logger::AuditLogger;
use crate::form_store::{AnswerMap, FormStore, FormStoreError, Submission};
use crate::notifications::{NotificationJob, NotificationQueueStore, RetryPolicy};
use crate::server::metrics;

pub struct SubmissionRecorder {
    form_store: Arc<dyn FormStore>,
    queue_store: Arc<dyn NotificationQueueStore>,
    audit_logger: AuditLogger,
    retry_policy: RetryPolicy,
}

impl SubmissionRecorder {
    pub fn new(
        form_store: Arc<dyn FormStore>,
        queue_store: Arc<dyn NotificationQueueStore>,
        audit_logger: AuditLogger,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            form_store,
            queue_store,
            audit_logger,
            retry_policy,
        }
    }

    /// Record a submission against a version. The answers must already have
    /// passed validation for that version's schema.
    pub fn record(
        &self,
        version_id: &str,
        answers: &AnswerMap,
        submitter_email: &str,
    ) -> Result<Submission, FormStoreError> {
        let version = self
            .form_store
            .get_version(version_id)?
            .ok_or_else(|| FormStoreError::VersionNotFound(version_id.to_string()))?;
        let form = self
            .form_store
            .get_form(&version.form_id)?
            .ok_or_else(|| FormStoreError::FormNotFound(version.form_id.clone()))?;

        // Durability boundary: once this insert returns, the submission is
        // received regardless of what the remaining steps do.
        let submission = self.form_store.insert_submission(version_id, answers)?;

        if let Err(e) = self
            .audit_logger
            .log_submission_created(&submission, version.version)
        {
            metrics::AUDIT_WRITE_FAILURES_TOTAL.inc();
            warn!(
                "Failed to write audit entry for submission {}: {}",
                submission.id, e
            );
        }

        let job = NotificationJob::new(
            submitter_email.to_string(),
            submission.id.clone(),
            form.title.clone(),
            self.retry_policy.max_attempts,
            self.retry_policy.backoff_ms,
        );
        match self.queue_store.enqueue(job) {
            Ok(()) => metrics::NOTIFICATIONS_ENQUEUED_TOTAL.inc(),
            Err(e) => {
                metrics::NOTIFICATION_ENQUEUE_FAILURES_TOTAL.inc();
                error!(
                    "Failed to enqueue confirmation for submission {}: {}",
                    submission.id, e
                );
            }
        }

        Ok(submission)
    }
}
