//! Notification queue storage and persistence.
//!
//! SQLite-backed durable queue. Jobs survive restarts; a claimed job that is
//! never acknowledged is requeued by the stale-in-progress sweep.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{JobStatus, NotificationJob};
use super::schema::NOTIFICATION_QUEUE_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::open_versioned;

/// Trait for notification queue storage operations.
pub trait NotificationQueueStore: Send + Sync {
    /// Add a job to the queue.
    fn enqueue(&self, job: NotificationJob) -> Result<()>;

    /// Get a job by ID.
    fn get_job(&self, id: &str) -> Result<Option<NotificationJob>>;

    /// Atomically claim the next due job (PENDING or RETRY_WAITING with
    /// `next_attempt_at <= now`), moving it to IN_PROGRESS and counting the
    /// attempt. Returns None when nothing is due.
    fn claim_next_due(&self, now: i64) -> Result<Option<NotificationJob>>;

    /// Mark a job as delivered (SENT, terminal).
    fn mark_sent(&self, id: &str, now: i64) -> Result<()>;

    /// Put a failed job back in the queue, eligible again at `next_attempt_at`.
    fn mark_retry_waiting(&self, id: &str, next_attempt_at: i64, error: &str) -> Result<()>;

    /// Dead-letter a job after its attempts are exhausted (DEAD, terminal).
    fn mark_dead(&self, id: &str, now: i64, error: &str) -> Result<()>;

    /// List jobs in a given status, newest first.
    fn list_by_status(
        &self,
        status: JobStatus,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NotificationJob>>;

    /// All jobs enqueued for a submission, oldest first.
    fn list_for_submission(&self, submission_id: &str) -> Result<Vec<NotificationJob>>;

    fn count_by_status(&self, status: JobStatus) -> Result<usize>;

    /// Requeue jobs stuck IN_PROGRESS for longer than the threshold (e.g.
    /// after a crash mid-delivery). Returns the number requeued.
    fn requeue_stale_in_progress(&self, now: i64, stale_threshold_ms: i64) -> Result<usize>;
}

/// SQLite-backed notification queue store.
pub struct SqliteNotificationQueueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteNotificationQueueStore {
    /// Open an existing queue database or create a new one.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, NOTIFICATION_QUEUE_VERSIONED_SCHEMAS)?;
        Ok(SqliteNotificationQueueStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = crate::sqlite_persistence::create_in_memory(NOTIFICATION_QUEUE_VERSIONED_SCHEMAS)?;
        Ok(SqliteNotificationQueueStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<NotificationJob> {
        Ok(NotificationJob {
            id: row.get("id")?,
            to: row.get("to_address")?,
            submission_id: row.get("submission_id")?,
            form_title: row.get("form_title")?,
            status: JobStatus::from_db_str(&row.get::<_, String>("status")?)
                .unwrap_or(JobStatus::Pending),
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            last_attempt_at: row.get("last_attempt_at")?,
            next_attempt_at: row.get("next_attempt_at")?,
            attempts_made: row.get("attempts_made")?,
            max_attempts: row.get("max_attempts")?,
            backoff_ms: row.get("backoff_ms")?,
            last_error: row.get("last_error")?,
        })
    }
}

impl NotificationQueueStore for SqliteNotificationQueueStore {
    fn enqueue(&self, job: NotificationJob) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO notification_jobs (
                id, to_address, submission_id, form_title, status,
                created_at, started_at, completed_at, last_attempt_at,
                next_attempt_at, attempts_made, max_attempts, backoff_ms, last_error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                job.id,
                job.to,
                job.submission_id,
                job.form_title,
                job.status.as_db_str(),
                job.created_at,
                job.started_at,
                job.completed_at,
                job.last_attempt_at,
                job.next_attempt_at,
                job.attempts_made,
                job.max_attempts,
                job.backoff_ms,
                job.last_error,
            ],
        )?;
        Ok(())
    }

    fn get_job(&self, id: &str) -> Result<Option<NotificationJob>> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row(
                "SELECT * FROM notification_jobs WHERE id = ?1",
                [id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    fn claim_next_due(&self, now: i64) -> Result<Option<NotificationJob>> {
        let conn = self.conn.lock().unwrap();

        let candidate: Option<String> = conn
            .query_row(
                r#"SELECT id FROM notification_jobs
                   WHERE status IN ('PENDING', 'RETRY_WAITING') AND next_attempt_at <= ?1
                   ORDER BY next_attempt_at ASC, created_at ASC
                   LIMIT 1"#,
                [now],
                |row| row.get(0),
            )
            .optional()?;

        let id = match candidate {
            Some(id) => id,
            None => return Ok(None),
        };

        // Guarded transition so a concurrently claimed job is not claimed twice.
        let changed = conn.execute(
            r#"UPDATE notification_jobs
               SET status = 'IN_PROGRESS',
                   started_at = COALESCE(started_at, ?2),
                   last_attempt_at = ?2,
                   attempts_made = attempts_made + 1
               WHERE id = ?1 AND status IN ('PENDING', 'RETRY_WAITING')"#,
            params![id, now],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        let job = conn.query_row(
            "SELECT * FROM notification_jobs WHERE id = ?1",
            [&id],
            Self::row_to_job,
        )?;
        Ok(Some(job))
    }

    fn mark_sent(&self, id: &str, now: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"UPDATE notification_jobs
               SET status = 'SENT', completed_at = ?2, last_error = NULL
               WHERE id = ?1"#,
            params![id, now],
        )?;
        Ok(())
    }

    fn mark_retry_waiting(&self, id: &str, next_attempt_at: i64, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"UPDATE notification_jobs
               SET status = 'RETRY_WAITING', next_attempt_at = ?2, last_error = ?3
               WHERE id = ?1"#,
            params![id, next_attempt_at, error],
        )?;
        Ok(())
    }

    fn mark_dead(&self, id: &str, now: i64, error: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"UPDATE notification_jobs
               SET status = 'DEAD', completed_at = ?2, last_error = ?3
               WHERE id = ?1"#,
            params![id, now, error],
        )?;
        Ok(())
    }

    fn list_by_status(
        &self,
        status: JobStatus,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<NotificationJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT * FROM notification_jobs
               WHERE status = ?1
               ORDER BY created_at DESC
               LIMIT ?2 OFFSET ?3"#,
        )?;
        let jobs = stmt
            .query_map(
                params![status.as_db_str(), limit as i64, offset as i64],
                Self::row_to_job,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn list_for_submission(&self, submission_id: &str) -> Result<Vec<NotificationJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT * FROM notification_jobs
               WHERE submission_id = ?1
               ORDER BY created_at ASC"#,
        )?;
        let jobs = stmt
            .query_map([submission_id], Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn count_by_status(&self, status: JobStatus) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notification_jobs WHERE status = ?1",
            [status.as_db_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn requeue_stale_in_progress(&self, now: i64, stale_threshold_ms: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"UPDATE notification_jobs
               SET status = 'PENDING', next_attempt_at = ?1
               WHERE status = 'IN_PROGRESS' AND last_attempt_at < ?2"#,
            params![now, now - stale_threshold_ms],
        )?;
        Ok(changed)
    }
}
