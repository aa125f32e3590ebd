//! Submission recording pipeline.

mod audit_logger;
mod recorder;

pub use audit_logger::AuditLogger;
pub use recorder::SubmissionRecorder;
