//! Background consumer for the notification queue.
//!
//! Runs independently of the request handlers: polls the durable queue,
//! claims one due job at a time and hands it to the [`Notifier`]. Failed
//! jobs wait out their backoff before redelivery; a job that fails its last
//! attempt is dead-lettered, never silently dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::models::NotificationJob;
use super::notifier::Notifier;
use super::queue_store::NotificationQueueStore;
use super::retry_policy::RetryPolicy;
use crate::server::metrics;

pub struct NotificationWorker {
    queue_store: Arc<dyn NotificationQueueStore>,
    notifier: Arc<dyn Notifier>,
    retry_policy: RetryPolicy,
    poll_interval: Duration,
    stale_threshold: Duration,
}

impl NotificationWorker {
    pub fn new(
        queue_store: Arc<dyn NotificationQueueStore>,
        notifier: Arc<dyn Notifier>,
        retry_policy: RetryPolicy,
        poll_interval: Duration,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            queue_store,
            notifier,
            retry_policy,
            poll_interval,
            stale_threshold,
        }
    }

    /// Main processing loop - call from a spawned task.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Notification worker starting (poll_interval={}ms)",
            self.poll_interval.as_millis()
        );

        // Jobs stranded IN_PROGRESS by a previous run are put back in line.
        match self
            .queue_store
            .requeue_stale_in_progress(Self::now(), self.stale_threshold.as_millis() as i64)
        {
            Ok(0) => {}
            Ok(n) => warn!("Requeued {} notification jobs stranded in progress", n),
            Err(e) => error!("Failed to requeue stale notification jobs: {}", e),
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.process_due_jobs().await {
                        error!("Notification worker pass failed: {}", e);
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Notification worker shutting down");
                    break;
                }
            }
        }

        info!("Notification worker stopped");
    }

    /// Claim and process every job currently due. Returns the number handled.
    pub async fn process_due_jobs(&self) -> anyhow::Result<usize> {
        let mut processed = 0;
        while let Some(job) = self.queue_store.claim_next_due(Self::now())? {
            self.process(job).await?;
            processed += 1;
        }
        Ok(processed)
    }

    async fn process(&self, job: NotificationJob) -> anyhow::Result<()> {
        debug!(
            "Delivering notification {} (attempt {}/{})",
            job.id, job.attempts_made, job.max_attempts
        );
        match self.notifier.send(&job).await {
            Ok(()) => {
                self.queue_store.mark_sent(&job.id, Self::now())?;
                metrics::NOTIFICATIONS_SENT_TOTAL.inc();
            }
            Err(e) => {
                if self.retry_policy.should_retry(&job) {
                    let next_attempt_at = self.retry_policy.next_attempt_at(&job, Self::now());
                    self.queue_store
                        .mark_retry_waiting(&job.id, next_attempt_at, &e.to_string())?;
                    metrics::NOTIFICATION_RETRIES_TOTAL.inc();
                    warn!(
                        "Notification {} attempt {}/{} failed: {}, retrying in {}ms",
                        job.id, job.attempts_made, job.max_attempts, e, job.backoff_ms
                    );
                } else {
                    self.queue_store
                        .mark_dead(&job.id, Self::now(), &e.to_string())?;
                    metrics::NOTIFICATIONS_DEAD_TOTAL.inc();
                    error!(
                        "Notification {} failed permanently after {} attempts: {}",
                        job.id, job.attempts_made, e
                    );
                }
            }
        }
        Ok(())
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::models::JobStatus;
    use crate::notifications::queue_store::SqliteNotificationQueueStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fails the first `failures` sends, then succeeds.
    struct ScriptedNotifier {
        failures: AtomicI64,
        sends: AtomicI64,
    }

    impl ScriptedNotifier {
        fn failing(failures: i64) -> Self {
            Self {
                failures: AtomicI64::new(failures),
                sends: AtomicI64::new(0),
            }
        }
    }

    #[async_trait]
    impl Notifier for ScriptedNotifier {
        async fn send(&self, _job: &NotificationJob) -> anyhow::Result<()> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                anyhow::bail!("smtp unreachable");
            }
            Ok(())
        }
    }

    fn immediate_job(max_attempts: i64) -> NotificationJob {
        // Zero backoff keeps retried jobs immediately due, so one
        // process_due_jobs pass drives a job through its whole lifecycle.
        NotificationJob::new(
            "dex@example.com".to_string(),
            "sub-1".to_string(),
            "Sunday Service".to_string(),
            max_attempts,
            0,
        )
    }

    fn make_worker(
        notifier: Arc<ScriptedNotifier>,
    ) -> (Arc<dyn NotificationQueueStore>, NotificationWorker) {
        let store: Arc<dyn NotificationQueueStore> =
            Arc::new(SqliteNotificationQueueStore::in_memory().unwrap());
        let worker = NotificationWorker::new(
            store.clone(),
            notifier,
            RetryPolicy::default(),
            Duration::from_millis(10),
            Duration::from_secs(60),
        );
        (store, worker)
    }

    #[tokio::test]
    async fn first_attempt_success_marks_sent() {
        let notifier = Arc::new(ScriptedNotifier::failing(0));
        let (store, worker) = make_worker(notifier.clone());
        let job = immediate_job(3);
        store.enqueue(job.clone()).unwrap();

        let processed = worker.process_due_jobs().await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);

        let done = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Sent);
        assert_eq!(done.attempts_made, 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let notifier = Arc::new(ScriptedNotifier::failing(2));
        let (store, worker) = make_worker(notifier.clone());
        let job = immediate_job(3);
        store.enqueue(job.clone()).unwrap();

        worker.process_due_jobs().await.unwrap();

        let done = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Sent);
        assert_eq!(done.attempts_made, 3);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn dead_letters_after_final_attempt() {
        let notifier = Arc::new(ScriptedNotifier::failing(i64::MAX));
        let (store, worker) = make_worker(notifier.clone());
        let job = immediate_job(3);
        store.enqueue(job.clone()).unwrap();

        worker.process_due_jobs().await.unwrap();

        let dead = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(dead.status, JobStatus::Dead);
        assert_eq!(dead.attempts_made, 3);
        assert_eq!(dead.last_error, Some("smtp unreachable".to_string()));
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 3);
        assert_eq!(store.count_by_status(JobStatus::Dead).unwrap(), 1);
    }

    #[tokio::test]
    async fn backoff_defers_the_retry() {
        let notifier = Arc::new(ScriptedNotifier::failing(1));
        let store: Arc<dyn NotificationQueueStore> =
            Arc::new(SqliteNotificationQueueStore::in_memory().unwrap());
        let worker = NotificationWorker::new(
            store.clone(),
            notifier.clone(),
            RetryPolicy::default(),
            Duration::from_millis(10),
            Duration::from_secs(60),
        );

        // Real backoff: the failed job must not be reclaimed within the pass.
        let job = NotificationJob::new(
            "dex@example.com".to_string(),
            "sub-1".to_string(),
            "Sunday Service".to_string(),
            3,
            60_000,
        );
        store.enqueue(job.clone()).unwrap();

        let processed = worker.process_due_jobs().await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);

        let waiting = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(waiting.status, JobStatus::RetryWaiting);
        assert!(waiting.next_attempt_at > waiting.last_attempt_at.unwrap());

        // A second pass finds nothing due.
        assert_eq!(worker.process_due_jobs().await.unwrap(), 0);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_loop_stops_on_cancellation() {
        let notifier = Arc::new(ScriptedNotifier::failing(0));
        let (store, worker) = make_worker(notifier.clone());
        let job = immediate_job(3);
        store.enqueue(job.clone()).unwrap();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { worker.run(shutdown).await }
        });

        // Give the loop a few ticks to drain the queue, then stop it.
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let done = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Sent);
    }
}
