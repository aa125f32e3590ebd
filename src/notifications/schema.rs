//! Database schema for notifications.db.

use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const NOTIFICATION_JOBS_TABLE_V1: Table = Table {
    name: "notification_jobs",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("to_address", SqlType::Text).non_null(),
        Column::new("submission_id", SqlType::Text).non_null(),
        Column::new("form_title", SqlType::Text).non_null(),
        Column::new("status", SqlType::Text).non_null(),
        Column::new("created_at", SqlType::Integer).non_null(),
        Column::new("started_at", SqlType::Integer),
        Column::new("completed_at", SqlType::Integer),
        Column::new("last_attempt_at", SqlType::Integer),
        Column::new("next_attempt_at", SqlType::Integer).non_null(),
        Column::new("attempts_made", SqlType::Integer).default_value("0"),
        Column::new("max_attempts", SqlType::Integer).non_null(),
        Column::new("backoff_ms", SqlType::Integer).non_null(),
        Column::new("last_error", SqlType::Text),
    ],
    indices: &[
        ("idx_jobs_status_due", "status, next_attempt_at"),
        ("idx_jobs_submission", "submission_id"),
    ],
    unique_constraints: &[],
};

pub const NOTIFICATION_QUEUE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[NOTIFICATION_JOBS_TABLE_V1],
    migration: None,
}];
