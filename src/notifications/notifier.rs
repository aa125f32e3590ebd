//! Delivery seam for outbound notifications.

use async_trait::async_trait;
use tracing::info;

use super::models::NotificationJob;

/// Performs the external notification side effect for one job.
///
/// Implementations must tolerate being called more than once for the same
/// job: delivery is at-least-once and duplicates are accepted.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, job: &NotificationJob) -> anyhow::Result<()>;
}

/// Notifier that logs the confirmation instead of talking to a mail provider.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, job: &NotificationJob) -> anyhow::Result<()> {
        info!(
            "Preparing confirmation for {} (submission {})",
            job.to, job.submission_id
        );
        info!(
            "Sent confirmation to {} for form \"{}\"",
            job.to, job.form_title
        );
        Ok(())
    }
}
