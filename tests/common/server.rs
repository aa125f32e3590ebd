//! Test server lifecycle management
//!
//! Each test gets an isolated server on a random port with its own
//! databases. The stores stay accessible for direct state assertions.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;

use formforge_server::form_store::{FormStore, SqliteFormStore};
use formforge_server::notifications::{
    NotificationQueueStore, RetryPolicy, SqliteNotificationQueueStore,
};
use formforge_server::server::server::make_app;
use formforge_server::server::{RequestsLoggingLevel, ServerConfig};
use formforge_server::submissions::{AuditLogger, SubmissionRecorder};
use formforge_server::versioning::VersionAllocator;

use super::{user_headers, ADMIN_HEADERS};

/// Test server instance with isolated databases.
///
/// When dropped, the server gracefully shuts down and temp resources are
/// cleaned up. The notification worker is intentionally NOT started, so
/// enqueued jobs stay observable in the queue.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Stores for direct database access in tests
    pub form_store: Arc<dyn FormStore>,
    pub queue_store: Arc<dyn NotificationQueueStore>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port.
    pub async fn spawn() -> Self {
        let temp_db_dir = tempfile::tempdir().expect("Failed to create temp db dir");

        let form_store: Arc<dyn FormStore> = Arc::new(
            SqliteFormStore::new(temp_db_dir.path().join("forms.db"))
                .expect("Failed to open form store"),
        );
        let queue_store: Arc<dyn NotificationQueueStore> = Arc::new(
            SqliteNotificationQueueStore::new(temp_db_dir.path().join("notifications.db"))
                .expect("Failed to open notification queue store"),
        );

        let version_allocator = Arc::new(VersionAllocator::new(
            form_store.clone(),
            Duration::from_secs(5),
        ));
        let submission_recorder = Arc::new(SubmissionRecorder::new(
            form_store.clone(),
            queue_store.clone(),
            AuditLogger::new(form_store.clone()),
            RetryPolicy::default(),
        ));

        let app = make_app(
            ServerConfig {
                port: 0,
                requests_logging_level: RequestsLoggingLevel::None,
            },
            form_store.clone(),
            version_allocator,
            submission_recorder,
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().expect("No local addr").port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Test server failed");
        });

        TestServer {
            base_url: format!("http://127.0.0.1:{}", port),
            form_store,
            queue_store,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub async fn create_form(&self, title: &str, slug: &str) -> reqwest::Response {
        let client = reqwest::Client::new();
        let mut request = client
            .post(format!("{}/v1/forms", self.base_url))
            .json(&serde_json::json!({"title": title, "slug": slug}));
        for (name, value) in ADMIN_HEADERS {
            request = request.header(name, value);
        }
        request.send().await.expect("create_form request failed")
    }

    pub async fn publish_version(
        &self,
        form_id: &str,
        schema: serde_json::Value,
    ) -> reqwest::Response {
        let client = reqwest::Client::new();
        let mut request = client
            .post(format!("{}/v1/forms/{}/versions", self.base_url, form_id))
            .json(&serde_json::json!({"schema": schema}));
        for (name, value) in ADMIN_HEADERS {
            request = request.header(name, value);
        }
        request
            .send()
            .await
            .expect("publish_version request failed")
    }

    pub async fn submit(
        &self,
        version_id: &str,
        answers: serde_json::Value,
        email: &str,
    ) -> reqwest::Response {
        let client = reqwest::Client::new();
        let mut request = client
            .post(format!("{}/v1/submissions/{}", self.base_url, version_id))
            .json(&serde_json::json!({"answers": answers}));
        for (name, value) in user_headers(email) {
            request = request.header(name, value);
        }
        request.send().await.expect("submit request failed")
    }

    pub async fn get_latest(&self, slug: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{}/v1/forms/{}", self.base_url, slug))
            .send()
            .await
            .expect("get_latest request failed")
    }

    pub async fn list_submissions(&self, form_id: &str) -> reqwest::Response {
        let client = reqwest::Client::new();
        let mut request = client.get(format!(
            "{}/v1/forms/{}/submissions",
            self.base_url, form_id
        ));
        for (name, value) in ADMIN_HEADERS {
            request = request.header(name, value);
        }
        request
            .send()
            .await
            .expect("list_submissions request failed")
    }
}
