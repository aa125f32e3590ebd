//! Durable notification queue and its background consumer.

mod models;
mod notifier;
mod queue_store;
mod retry_policy;
mod schema;
mod worker;

pub use models::{JobStatus, NotificationJob};
pub use notifier::{LogNotifier, Notifier};
pub use queue_store::{NotificationQueueStore, SqliteNotificationQueueStore};
pub use retry_policy::{RetryPolicy, DEFAULT_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS};
pub use schema::NOTIFICATION_QUEUE_VERSIONED_SCHEMAS;
pub use worker::NotificationWorker;
