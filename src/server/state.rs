use axum::extract::FromRef;

use crate::form_store::FormStore;
use crate::submissions::SubmissionRecorder;
use crate::versioning::VersionAllocator;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedFormStore = Arc<dyn FormStore>;
pub type GuardedVersionAllocator = Arc<VersionAllocator>;
pub type GuardedSubmissionRecorder = Arc<SubmissionRecorder>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub form_store: GuardedFormStore,
    pub version_allocator: GuardedVersionAllocator,
    pub submission_recorder: GuardedSubmissionRecorder,
}

impl FromRef<ServerState> for GuardedFormStore {
    fn from_ref(input: &ServerState) -> Self {
        input.form_store.clone()
    }
}

impl FromRef<ServerState> for GuardedVersionAllocator {
    fn from_ref(input: &ServerState) -> Self {
        input.version_allocator.clone()
    }
}

impl FromRef<ServerState> for GuardedSubmissionRecorder {
    fn from_ref(input: &ServerState) -> Self {
        input.submission_recorder.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
