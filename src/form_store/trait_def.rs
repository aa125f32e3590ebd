//! Trait for the primary form store.

use super::error::FormStoreError;
use super::models::{AnswerMap, AuditEntry, Form, FormSchema, FormVersion, Submission};

pub type Result<T> = std::result::Result<T, FormStoreError>;

/// Storage operations for forms, their versions, submissions and the audit
/// log. All entities except `forms.updated_at` are append-only.
pub trait FormStore: Send + Sync {
    // === Forms ===

    /// Create a form. Fails with `SlugTaken` when the slug is already in use.
    fn create_form(&self, title: &str, slug: &str, description: Option<&str>) -> Result<Form>;

    fn get_form(&self, form_id: &str) -> Result<Option<Form>>;

    fn get_form_by_slug(&self, slug: &str) -> Result<Option<Form>>;

    // === Versions ===

    /// Insert the next schema version for a form in a single exclusive unit
    /// of work: verify the form exists, compute `MAX(version) + 1`, insert.
    /// Either the whole unit commits or nothing is written.
    fn publish_version(&self, form_id: &str, schema: FormSchema) -> Result<FormVersion>;

    fn get_version(&self, version_id: &str) -> Result<Option<FormVersion>>;

    /// The highest-numbered version of the form with the given slug.
    fn get_latest_version_by_slug(&self, slug: &str) -> Result<Option<FormVersion>>;

    /// All versions of a form, ordered by version number.
    fn list_versions(&self, form_id: &str) -> Result<Vec<FormVersion>>;

    // === Submissions ===

    /// Insert a submission against a version. The caller is responsible for
    /// having validated the answers against that version's schema.
    fn insert_submission(&self, version_id: &str, answers: &AnswerMap) -> Result<Submission>;

    fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>>;

    /// Submissions across all versions of a form, newest first.
    fn list_submissions_for_form(&self, form_id: &str) -> Result<Vec<Submission>>;

    // === Audit log ===

    /// Append an audit entry, returning its assigned id.
    fn append_audit_entry(&self, entry: AuditEntry) -> Result<i64>;

    fn list_audit_entries(
        &self,
        action: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>>;
}
