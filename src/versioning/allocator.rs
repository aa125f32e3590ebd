//! Version allocation for form schema publishes.
//!
//! Concurrent publishes for the same form must never compute the same next
//! version number. The allocator serializes them with an exclusive per-form
//! lease, then runs the compute-and-insert as one exclusive unit of work in
//! the store. Publishes for different forms never contend on a lease.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::form_store::{FormSchema, FormStore, FormStoreError, FormVersion};

pub const DEFAULT_LEASE_TIMEOUT_MS: u64 = 5_000;

pub struct VersionAllocator {
    store: Arc<dyn FormStore>,
    leases: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    lease_timeout: Duration,
}

impl VersionAllocator {
    pub fn new(store: Arc<dyn FormStore>, lease_timeout: Duration) -> Self {
        Self {
            store,
            leases: Mutex::new(HashMap::new()),
            lease_timeout,
        }
    }

    /// Publish the next schema version for a form.
    ///
    /// Waits at most the configured lease timeout for other publishers of the
    /// same form; exceeding it fails with `LeaseTimeout` (retryable) rather
    /// than blocking indefinitely.
    pub async fn publish_version(
        &self,
        form_id: &str,
        schema: FormSchema,
    ) -> Result<FormVersion, FormStoreError> {
        if let Err(reason) = schema.validate() {
            return Err(FormStoreError::InvalidSchema(reason));
        }

        // An unknown form fails before any lease is taken. The store
        // re-verifies inside its unit of work.
        if self.store.get_form(form_id)?.is_none() {
            return Err(FormStoreError::FormNotFound(form_id.to_string()));
        }

        let lease = self.lease_for(form_id);
        let _guard = tokio::time::timeout(self.lease_timeout, lease.lock())
            .await
            .map_err(|_| FormStoreError::LeaseTimeout(form_id.to_string()))?;

        let version = self.store.publish_version(form_id, schema)?;
        debug!(
            "Published version {} for form {}",
            version.version, form_id
        );
        Ok(version)
    }

    fn lease_for(&self, form_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.leases
            .lock()
            .unwrap()
            .entry(form_id.to_string())
            .or_default()
            .clone()
    }
}
