mod error;
mod models;
mod schema;
mod store;
mod trait_def;

pub use error::FormStoreError;
pub use models::{
    is_valid_slug, AnswerMap, AuditEntry, FieldDef, FieldType, Form, FormSchema, FormVersion,
    Submission, ACTION_SUBMISSION_CREATED,
};
pub use schema::FORMS_VERSIONED_SCHEMAS;
pub use store::SqliteFormStore;
pub use trait_def::FormStore;
