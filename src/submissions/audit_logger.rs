//! Audit logging for the submission pipeline.
//!
//! Thin wrapper over the form store's append-only audit log that knows how
//! to build the entries this pipeline emits. Callers treat failures as
//! best-effort: an audit write never gates the operation it describes.

use std::sync::Arc;

use crate::form_store::{
    AuditEntry, FormStore, FormStoreError, Submission, ACTION_SUBMISSION_CREATED,
};

pub struct AuditLogger {
    store: Arc<dyn FormStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    /// Record that a submission was accepted against a given schema version.
    pub fn log_submission_created(
        &self,
        submission: &Submission,
        schema_version: i64,
    ) -> Result<(), FormStoreError> {
        let entry = AuditEntry::new(ACTION_SUBMISSION_CREATED)
            .with_entity(submission.id.clone())
            .with_details(serde_json::json!({ "version": schema_version }));
        self.store.append_audit_entry(entry).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form_store::{AnswerMap, SqliteFormStore};

    #[test]
    fn writes_a_submission_created_entry() {
        let store: Arc<dyn FormStore> = Arc::new(SqliteFormStore::in_memory().unwrap());
        let logger = AuditLogger::new(store.clone());

        let submission = Submission {
            id: "sub-1".to_string(),
            form_version_id: "v-1".to_string(),
            answers: AnswerMap::new(),
            created_at: 0,
        };
        logger.log_submission_created(&submission, 2).unwrap();

        let entries = store
            .list_audit_entries(Some(ACTION_SUBMISSION_CREATED), 10, 0)
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entity_id, Some("sub-1".to_string()));
        assert_eq!(entries[0].details.as_ref().unwrap()["version"], 2);
    }
}
