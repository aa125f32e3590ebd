//! SQLite-backed form store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::error::FormStoreError;
use super::models::{is_valid_slug, AnswerMap, AuditEntry, Form, FormSchema, FormVersion, Submission};
use super::schema::FORMS_VERSIONED_SCHEMAS;
use super::trait_def::{FormStore, Result};
use crate::sqlite_persistence::open_versioned;

/// SQLite-backed store for forms, versions, submissions and the audit log.
pub struct SqliteFormStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteFormStore {
    /// Open an existing database or create a new one with the current schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> anyhow::Result<Self> {
        let conn = open_versioned(db_path, FORMS_VERSIONED_SCHEMAS)?;
        Ok(SqliteFormStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = crate::sqlite_persistence::create_in_memory(FORMS_VERSIONED_SCHEMAS)?;
        Ok(SqliteFormStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_form(row: &rusqlite::Row) -> rusqlite::Result<Form> {
        Ok(Form {
            id: row.get("id")?,
            slug: row.get("slug")?,
            title: row.get("title")?,
            description: row.get("description")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_version(row: &rusqlite::Row) -> rusqlite::Result<FormVersion> {
        let schema_json: String = row.get("schema")?;
        let schema: FormSchema = serde_json::from_str(&schema_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        Ok(FormVersion {
            id: row.get("id")?,
            form_id: row.get("form_id")?,
            version: row.get("version")?,
            schema,
            published_at: row.get("published_at")?,
        })
    }

    fn row_to_submission(row: &rusqlite::Row) -> rusqlite::Result<Submission> {
        let answers_json: String = row.get("answers")?;
        let answers: AnswerMap = serde_json::from_str(&answers_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        Ok(Submission {
            id: row.get("id")?,
            form_version_id: row.get("form_version_id")?,
            answers,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_audit_entry(row: &rusqlite::Row) -> rusqlite::Result<AuditEntry> {
        let details: Option<String> = row.get("details")?;
        let details = match details {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
            })?),
            None => None,
        };
        Ok(AuditEntry {
            id: Some(row.get("id")?),
            action: row.get("action")?,
            entity_id: row.get("entity_id")?,
            details,
            created_at: row.get("created_at")?,
        })
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

impl FormStore for SqliteFormStore {
    // === Forms ===

    fn create_form(&self, title: &str, slug: &str, description: Option<&str>) -> Result<Form> {
        if !is_valid_slug(slug) {
            return Err(FormStoreError::InvalidSlug(slug.to_string()));
        }

        let conn = self.conn.lock().unwrap();
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM forms WHERE slug = ?1",
            [slug],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(FormStoreError::SlugTaken(slug.to_string()));
        }

        let now = Self::now();
        let form = Form {
            id: Uuid::new_v4().to_string(),
            slug: slug.to_string(),
            title: title.to_string(),
            description: description.map(|s| s.to_string()),
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            r#"INSERT INTO forms (id, slug, title, description, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                form.id,
                form.slug,
                form.title,
                form.description,
                form.created_at,
                form.updated_at,
            ],
        )?;
        Ok(form)
    }

    fn get_form(&self, form_id: &str) -> Result<Option<Form>> {
        let conn = self.conn.lock().unwrap();
        let form = conn
            .query_row(
                "SELECT * FROM forms WHERE id = ?1",
                [form_id],
                Self::row_to_form,
            )
            .optional()?;
        Ok(form)
    }

    fn get_form_by_slug(&self, slug: &str) -> Result<Option<Form>> {
        let conn = self.conn.lock().unwrap();
        let form = conn
            .query_row(
                "SELECT * FROM forms WHERE slug = ?1",
                [slug],
                Self::row_to_form,
            )
            .optional()?;
        Ok(form)
    }

    // === Versions ===

    fn publish_version(&self, form_id: &str, schema: FormSchema) -> Result<FormVersion> {
        let mut conn = self.conn.lock().unwrap();
        // IMMEDIATE takes the write lock up front, so the max(version) read
        // and the insert happen under one exclusive unit of work.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let form_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM forms WHERE id = ?1",
            [form_id],
            |row| row.get(0),
        )?;
        if form_exists == 0 {
            return Err(FormStoreError::FormNotFound(form_id.to_string()));
        }

        let max_version: Option<i64> = tx.query_row(
            "SELECT MAX(version) FROM form_versions WHERE form_id = ?1",
            [form_id],
            |row| row.get(0),
        )?;
        let next_version = max_version.unwrap_or(0) + 1;

        let version = FormVersion {
            id: Uuid::new_v4().to_string(),
            form_id: form_id.to_string(),
            version: next_version,
            schema,
            published_at: Self::now(),
        };
        tx.execute(
            r#"INSERT INTO form_versions (id, form_id, version, schema, published_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                version.id,
                version.form_id,
                version.version,
                serde_json::to_string(&version.schema)?,
                version.published_at,
            ],
        )?;
        tx.commit()?;
        Ok(version)
    }

    fn get_version(&self, version_id: &str) -> Result<Option<FormVersion>> {
        let conn = self.conn.lock().unwrap();
        let version = conn
            .query_row(
                "SELECT * FROM form_versions WHERE id = ?1",
                [version_id],
                Self::row_to_version,
            )
            .optional()?;
        Ok(version)
    }

    fn get_latest_version_by_slug(&self, slug: &str) -> Result<Option<FormVersion>> {
        let conn = self.conn.lock().unwrap();
        let version = conn
            .query_row(
                r#"SELECT v.* FROM form_versions v
                   JOIN forms f ON f.id = v.form_id
                   WHERE f.slug = ?1
                   ORDER BY v.version DESC
                   LIMIT 1"#,
                [slug],
                Self::row_to_version,
            )
            .optional()?;
        Ok(version)
    }

    fn list_versions(&self, form_id: &str) -> Result<Vec<FormVersion>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM form_versions WHERE form_id = ?1 ORDER BY version ASC",
        )?;
        let versions = stmt
            .query_map([form_id], Self::row_to_version)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    // === Submissions ===

    fn insert_submission(&self, version_id: &str, answers: &AnswerMap) -> Result<Submission> {
        let conn = self.conn.lock().unwrap();
        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            form_version_id: version_id.to_string(),
            answers: answers.clone(),
            created_at: Self::now(),
        };
        conn.execute(
            r#"INSERT INTO submissions (id, form_version_id, answers, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![
                submission.id,
                submission.form_version_id,
                serde_json::to_string(&submission.answers)?,
                submission.created_at,
            ],
        )?;
        Ok(submission)
    }

    fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>> {
        let conn = self.conn.lock().unwrap();
        let submission = conn
            .query_row(
                "SELECT * FROM submissions WHERE id = ?1",
                [submission_id],
                Self::row_to_submission,
            )
            .optional()?;
        Ok(submission)
    }

    fn list_submissions_for_form(&self, form_id: &str) -> Result<Vec<Submission>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"SELECT s.* FROM submissions s
               JOIN form_versions v ON v.id = s.form_version_id
               WHERE v.form_id = ?1
               ORDER BY s.created_at DESC"#,
        )?;
        let submissions = stmt
            .query_map([form_id], Self::row_to_submission)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(submissions)
    }

    // === Audit log ===

    fn append_audit_entry(&self, entry: AuditEntry) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let details = entry
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        conn.execute(
            r#"INSERT INTO audit_log (action, entity_id, details, created_at)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![entry.action, entry.entity_id, details, entry.created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn list_audit_entries(
        &self,
        action: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<AuditEntry>> {
        let conn = self.conn.lock().unwrap();
        let entries = match action {
            Some(action) => {
                let mut stmt = conn.prepare(
                    r#"SELECT * FROM audit_log WHERE action = ?1
                       ORDER BY created_at DESC, id DESC
                       LIMIT ?2 OFFSET ?3"#,
                )?;
                let rows = stmt
                    .query_map(
                        params![action, limit as i64, offset as i64],
                        Self::row_to_audit_entry,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    r#"SELECT * FROM audit_log
                       ORDER BY created_at DESC, id DESC
                       LIMIT ?1 OFFSET ?2"#,
                )?;
                let rows = stmt
                    .query_map(
                        params![limit as i64, offset as i64],
                        Self::row_to_audit_entry,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form_store::models::{FieldDef, FieldType, ACTION_SUBMISSION_CREATED};

    fn test_schema() -> FormSchema {
        FormSchema {
            fields: vec![FieldDef {
                key: "full_name".to_string(),
                label: "Full Name".to_string(),
                field_type: FieldType::Text,
                required: true,
                options: None,
            }],
        }
    }

    fn answers(pairs: &[(&str, serde_json::Value)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn create_and_get_form() {
        let store = SqliteFormStore::in_memory().unwrap();

        let form = store
            .create_form("Sunday Service", "sunday-service", Some("Weekly signup"))
            .unwrap();
        assert_eq!(form.slug, "sunday-service");

        let fetched = store.get_form(&form.id).unwrap().unwrap();
        assert_eq!(fetched, form);

        let by_slug = store.get_form_by_slug("sunday-service").unwrap().unwrap();
        assert_eq!(by_slug.id, form.id);
    }

    #[test]
    fn create_form_rejects_duplicate_slug() {
        let store = SqliteFormStore::in_memory().unwrap();
        store.create_form("A", "intake", None).unwrap();

        let err = store.create_form("B", "intake", None).unwrap_err();
        assert!(matches!(err, FormStoreError::SlugTaken(_)));
    }

    #[test]
    fn create_form_rejects_invalid_slug() {
        let store = SqliteFormStore::in_memory().unwrap();
        let err = store.create_form("A", "Not A Slug", None).unwrap_err();
        assert!(matches!(err, FormStoreError::InvalidSlug(_)));
    }

    #[test]
    fn publish_assigns_sequential_versions() {
        let store = SqliteFormStore::in_memory().unwrap();
        let form = store.create_form("A", "a", None).unwrap();

        for expected in 1..=3 {
            let version = store.publish_version(&form.id, test_schema()).unwrap();
            assert_eq!(version.version, expected);
        }

        let versions = store.list_versions(&form.id).unwrap();
        assert_eq!(
            versions.iter().map(|v| v.version).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn publish_unknown_form_writes_nothing() {
        let store = SqliteFormStore::in_memory().unwrap();

        let err = store.publish_version("missing", test_schema()).unwrap_err();
        assert!(matches!(err, FormStoreError::FormNotFound(_)));

        let count: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM form_versions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn published_schema_round_trips() {
        let store = SqliteFormStore::in_memory().unwrap();
        let form = store.create_form("A", "a", None).unwrap();
        let published = store.publish_version(&form.id, test_schema()).unwrap();

        let fetched = store.get_version(&published.id).unwrap().unwrap();
        assert_eq!(fetched.schema, test_schema());
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.form_id, form.id);
    }

    #[test]
    fn latest_version_by_slug_picks_highest() {
        let store = SqliteFormStore::in_memory().unwrap();
        let form = store.create_form("A", "a", None).unwrap();
        store.publish_version(&form.id, test_schema()).unwrap();
        let v2 = store.publish_version(&form.id, test_schema()).unwrap();

        let latest = store.get_latest_version_by_slug("a").unwrap().unwrap();
        assert_eq!(latest.id, v2.id);
        assert_eq!(latest.version, 2);

        assert!(store.get_latest_version_by_slug("nope").unwrap().is_none());
    }

    #[test]
    fn submission_round_trips_answers() {
        let store = SqliteFormStore::in_memory().unwrap();
        let form = store.create_form("A", "a", None).unwrap();
        let version = store.publish_version(&form.id, test_schema()).unwrap();

        let answers = answers(&[("full_name", serde_json::json!("Dex"))]);
        let submission = store.insert_submission(&version.id, &answers).unwrap();

        let fetched = store.get_submission(&submission.id).unwrap().unwrap();
        assert_eq!(fetched.answers, answers);
        assert_eq!(fetched.form_version_id, version.id);

        // Re-reading returns the identical record.
        let again = store.get_submission(&submission.id).unwrap().unwrap();
        assert_eq!(again, fetched);
    }

    #[test]
    fn submission_requires_existing_version() {
        let store = SqliteFormStore::in_memory().unwrap();
        let answers = answers(&[("full_name", serde_json::json!("Dex"))]);

        let err = store.insert_submission("missing", &answers).unwrap_err();
        assert!(matches!(err, FormStoreError::Storage(_)));
    }

    #[test]
    fn list_submissions_spans_all_versions_newest_first() {
        let store = SqliteFormStore::in_memory().unwrap();
        let form = store.create_form("A", "a", None).unwrap();
        let v1 = store.publish_version(&form.id, test_schema()).unwrap();
        let v2 = store.publish_version(&form.id, test_schema()).unwrap();

        let first = store
            .insert_submission(&v1.id, &answers(&[("full_name", serde_json::json!("One"))]))
            .unwrap();
        let second = store
            .insert_submission(&v2.id, &answers(&[("full_name", serde_json::json!("Two"))]))
            .unwrap();

        let listed = store.list_submissions_for_form(&form.id).unwrap();
        assert_eq!(listed.len(), 2);
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[test]
    fn audit_entries_append_and_filter() {
        let store = SqliteFormStore::in_memory().unwrap();

        let id = store
            .append_audit_entry(
                AuditEntry::new(ACTION_SUBMISSION_CREATED)
                    .with_entity("sub-1".to_string())
                    .with_details(serde_json::json!({"version": 1})),
            )
            .unwrap();
        assert!(id > 0);
        store
            .append_audit_entry(AuditEntry::new("OTHER_ACTION"))
            .unwrap();

        let created = store
            .list_audit_entries(Some(ACTION_SUBMISSION_CREATED), 10, 0)
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].entity_id, Some("sub-1".to_string()));
        assert_eq!(created[0].details.as_ref().unwrap()["version"], 1);

        let all = store.list_audit_entries(None, 10, 0).unwrap();
        assert_eq!(all.len(), 2);
    }
}
