//! # Common Test Utilities
//!
//! `TestApp` spawns the real router on a random port. It can be backed by the
//! in-memory mocks from `boxvision-test-utils` or by a fully configured
//! `AppState` whose HTTP clients point at an `httpmock::MockServer`.

// Not every test file uses every helper.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use boxvision::{
    providers::{storage::BoxAppAuth, vision::ServiceAccountCredentials},
    SkillPipeline,
};
use boxvision_server::{
    config::{AppConfig, Endpoints},
    router,
    state::{build_app_state, AppState},
};
use boxvision_test_utils::{
    setup_tracing, MockAnnotationService, MockStorage, RSA_PRIVATE_KEY,
    RSA_PRIVATE_KEY_ENCRYPTED, RSA_PRIVATE_KEY_PASSPHRASE,
};
use httpmock::MockServer;
use reqwest::Client;
use std::net::SocketAddr;
use tokio::{net::TcpListener, task::JoinHandle};

pub const EVENT_BODY: &str = r#"{"source":{"owned_by":{"id":"111"},"id":"222"}}"#;

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the server with a pipeline backed by the in-memory mocks.
    pub async fn spawn_with_mocks(
        storage: &MockStorage,
        annotator: &MockAnnotationService,
    ) -> Result<Self> {
        let pipeline = SkillPipeline::builder()
            .storage_connector(Box::new(storage.clone()))
            .annotation_service(Box::new(annotator.clone()))
            .build()?;
        Self::spawn_with_state(AppState::new(pipeline)).await
    }

    /// Spawns the server with real Box and Google clients aimed at `mock_server`.
    pub async fn spawn_against(mock_server: &MockServer) -> Result<Self> {
        let app_state = build_app_state(mock_config(mock_server)).await?;
        Self::spawn_with_state(app_state).await
    }

    pub async fn spawn_with_state(app_state: AppState) -> Result<Self> {
        setup_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(app_state);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::new(),
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// A configuration whose endpoints all live on `mock_server`.
pub fn mock_config(mock_server: &MockServer) -> AppConfig {
    AppConfig {
        port: 0,
        max_file_bytes: 1024,
        box_auth: BoxAppAuth {
            client_id: "box-client-id".to_string(),
            client_secret: "box-client-secret".to_string(),
            key_id: "box-key-id".to_string(),
            private_key: RSA_PRIVATE_KEY_ENCRYPTED.to_string(),
            passphrase: RSA_PRIVATE_KEY_PASSPHRASE.to_string(),
        },
        vision_credentials: ServiceAccountCredentials {
            project_id: "demo-project".to_string(),
            client_email: "skill@demo-project.iam.gserviceaccount.com".to_string(),
            private_key: RSA_PRIVATE_KEY.to_string(),
        },
        endpoints: Endpoints {
            box_api_url: mock_server.base_url(),
            box_token_url: mock_server.url("/oauth2/token"),
            gcv_api_url: mock_server.url("/v1/images:annotate"),
            gcv_token_url: mock_server.url("/token"),
        },
    }
}
