use anyhow::Result;
use std::time::{Duration, Instant};

use tracing::error;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::identity::{AdminIdentity, Identity};
use super::metrics::{
    metrics_handler, SUBMISSIONS_RECORDED_TOTAL, VERSIONS_PUBLISHED_TOTAL,
    VERSION_LEASE_TIMEOUTS_TOTAL,
};
use super::{log_requests, state::*, ServerConfig};
use crate::form_store::{AnswerMap, FormSchema, FormStoreError};
use crate::validation::{combined_message, validate_answers};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct CreateFormBody {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PublishVersionBody {
    pub schema: FormSchema,
}

#[derive(Deserialize, Debug)]
struct SubmitBody {
    pub answers: AnswerMap,
}

#[derive(Serialize)]
struct SubmitResponse {
    pub id: String,
    pub submitted_at: i64,
}

fn error_response(err: FormStoreError) -> Response {
    match &err {
        FormStoreError::FormNotFound(_) | FormStoreError::VersionNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string()).into_response()
        }
        FormStoreError::SlugTaken(_) => (StatusCode::CONFLICT, err.to_string()).into_response(),
        FormStoreError::InvalidSlug(_) | FormStoreError::InvalidSchema(_) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        FormStoreError::LeaseTimeout(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response()
        }
        FormStoreError::Storage(_) | FormStoreError::Serialization(_) => {
            error!("Internal error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(stats)
}

async fn create_form(
    _identity: AdminIdentity,
    State(form_store): State<GuardedFormStore>,
    Json(body): Json<CreateFormBody>,
) -> Response {
    match form_store.create_form(&body.title, &body.slug, body.description.as_deref()) {
        Ok(form) => (StatusCode::CREATED, Json(form)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn publish_version(
    _identity: AdminIdentity,
    State(allocator): State<GuardedVersionAllocator>,
    Path(form_id): Path<String>,
    Json(body): Json<PublishVersionBody>,
) -> Response {
    match allocator.publish_version(&form_id, body.schema).await {
        Ok(version) => {
            VERSIONS_PUBLISHED_TOTAL.inc();
            (StatusCode::CREATED, Json(version)).into_response()
        }
        Err(err) => {
            if matches!(err, FormStoreError::LeaseTimeout(_)) {
                VERSION_LEASE_TIMEOUTS_TOTAL.inc();
            }
            error_response(err)
        }
    }
}

// Public endpoint to render the form: the latest published version. The
// path parameter is the form's slug.
async fn get_form_latest(
    State(form_store): State<GuardedFormStore>,
    Path(slug): Path<String>,
) -> Response {
    match form_store.get_latest_version_by_slug(&slug) {
        Ok(Some(version)) => Json(version).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Version not found".to_string()).into_response(),
        Err(err) => error_response(err),
    }
}

async fn submit_response(
    identity: Identity,
    State(state): State<ServerState>,
    Path(version_id): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Response {
    // Validation always runs against the exact version named by the request,
    // never the form's latest.
    let version = match state.form_store.get_version(&version_id) {
        Ok(Some(version)) => version,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Form Version not found".to_string()).into_response()
        }
        Err(err) => return error_response(err),
    };

    let errors = validate_answers(&version.schema, &body.answers);
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, combined_message(&errors)).into_response();
    }

    match state
        .submission_recorder
        .record(&version_id, &body.answers, &identity.email)
    {
        Ok(submission) => {
            SUBMISSIONS_RECORDED_TOTAL.inc();
            (
                StatusCode::CREATED,
                Json(SubmitResponse {
                    id: submission.id,
                    submitted_at: submission.created_at,
                }),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

// Admin view across all versions of a form.
async fn list_form_submissions(
    _identity: AdminIdentity,
    State(form_store): State<GuardedFormStore>,
    Path(form_id): Path<String>,
) -> Response {
    match form_store.get_form(&form_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (StatusCode::NOT_FOUND, format!("Form not found: {}", form_id)).into_response()
        }
        Err(err) => return error_response(err),
    }
    match form_store.list_submissions_for_form(&form_id) {
        Ok(submissions) => Json(submissions).into_response(),
        Err(err) => error_response(err),
    }
}

impl ServerState {
    fn new(
        config: ServerConfig,
        form_store: GuardedFormStore,
        version_allocator: GuardedVersionAllocator,
        submission_recorder: GuardedSubmissionRecorder,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            form_store,
            version_allocator,
            submission_recorder,
        }
    }
}

pub fn make_app(
    config: ServerConfig,
    form_store: GuardedFormStore,
    version_allocator: GuardedVersionAllocator,
    submission_recorder: GuardedSubmissionRecorder,
) -> Router {
    let state = ServerState::new(config, form_store, version_allocator, submission_recorder);

    let form_routes: Router = Router::new()
        .route("/", post(create_form))
        .route("/{id}", get(get_form_latest))
        .route("/{id}/versions", post(publish_version))
        .route("/{id}/submissions", get(list_form_submissions))
        .with_state(state.clone());

    let submission_routes: Router = Router::new()
        .route("/{version_id}", post(submit_response))
        .with_state(state.clone());

    let mut app: Router = Router::new()
        .route("/", get(home))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone())
        .nest("/v1/forms", form_routes)
        .nest("/v1/submissions", submission_routes);

    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));
    app
}

pub async fn run_server(
    config: ServerConfig,
    form_store: GuardedFormStore,
    version_allocator: GuardedVersionAllocator,
    submission_recorder: GuardedSubmissionRecorder,
) -> Result<()> {
    let port = config.port;
    let app = make_app(config, form_store, version_allocator, submission_recorder);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
