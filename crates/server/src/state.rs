//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. The state holds the fully wired skill pipeline:
//! the Box connector and the Google Vision provider, both authenticated with
//! the credentials from the validated configuration.

use crate::config::AppConfig;
use boxvision::{
    providers::{
        storage::{BoxAuthenticator, BoxConnector},
        vision::GoogleVisionProvider,
    },
    SkillPipeline,
};
use reqwest::Client;
use std::sync::Arc;
use tracing::info;

/// The shared application state, accessible from all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub pipeline: Arc<SkillPipeline>,
}

impl AppState {
    pub fn new(pipeline: SkillPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Builds the shared application state from the configuration.
///
/// Signing keys are decoded here, so a key that cannot be used fails startup
/// instead of the first invocation.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let client = Client::builder().build()?;

    let authenticator = BoxAuthenticator::new(client.clone(), config.box_auth)?
        .with_token_url(config.endpoints.box_token_url);
    let storage_connector =
        BoxConnector::new(client, authenticator).with_api_url(config.endpoints.box_api_url);

    let annotation_service = GoogleVisionProvider::new(config.vision_credentials)?
        .with_api_url(config.endpoints.gcv_api_url)
        .with_token_url(config.endpoints.gcv_token_url);

    let pipeline = SkillPipeline::builder()
        .storage_connector(Box::new(storage_connector))
        .annotation_service(Box::new(annotation_service))
        .max_file_bytes(config.max_file_bytes)
        .build()?;

    info!(
        max_file_bytes = pipeline.max_file_bytes(),
        "Skill pipeline initialized."
    );

    Ok(AppState::new(pipeline))
}
