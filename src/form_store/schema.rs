//! Database schema for forms.db.

use crate::sqlite_persistence::{Column, OnDelete, SqlType, Table, VersionedSchema};

const FORMS_TABLE_V1: Table = Table {
    name: "forms",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("slug", SqlType::Text).non_null().unique(),
        Column::new("title", SqlType::Text).non_null(),
        Column::new("description", SqlType::Text),
        Column::new("created_at", SqlType::Integer).non_null(),
        Column::new("updated_at", SqlType::Integer).non_null(),
    ],
    indices: &[],
    unique_constraints: &[],
};

const FORM_VERSIONS_TABLE_V1: Table = Table {
    name: "form_versions",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("form_id", SqlType::Text)
            .non_null()
            .references("forms", "id", OnDelete::Cascade),
        Column::new("version", SqlType::Integer).non_null(),
        Column::new("schema", SqlType::Text).non_null(),
        Column::new("published_at", SqlType::Integer).non_null(),
    ],
    indices: &[("idx_versions_form", "form_id")],
    unique_constraints: &[&["form_id", "version"]],
};

// Submissions must outlive their version: deleting a version with recorded
// submissions is forbidden, hence RESTRICT.
const SUBMISSIONS_TABLE_V1: Table = Table {
    name: "submissions",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("form_version_id", SqlType::Text)
            .non_null()
            .references("form_versions", "id", OnDelete::Restrict),
        Column::new("answers", SqlType::Text).non_null(),
        Column::new("created_at", SqlType::Integer).non_null(),
    ],
    indices: &[
        ("idx_submissions_version", "form_version_id"),
        ("idx_submissions_created", "created_at"),
    ],
    unique_constraints: &[],
};

const AUDIT_LOG_TABLE_V1: Table = Table {
    name: "audit_log",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("action", SqlType::Text).non_null(),
        Column::new("entity_id", SqlType::Text),
        Column::new("details", SqlType::Text),
        Column::new("created_at", SqlType::Integer).non_null(),
    ],
    indices: &[
        ("idx_audit_action", "action"),
        ("idx_audit_entity", "entity_id"),
        ("idx_audit_created", "created_at"),
    ],
    unique_constraints: &[],
};

pub const FORMS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        FORMS_TABLE_V1,
        FORM_VERSIONS_TABLE_V1,
        SUBMISSIONS_TABLE_V1,
        AUDIT_LOG_TABLE_V1,
    ],
    migration: None,
}];
