use super::{AnnotationService, FeatureType, ServiceAccountCredentials, ServiceAccountTokenSource};
use crate::{constants::GOOGLE_VISION_API_URL, errors::SkillError, types::AnnotationResponse};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

// --- Vision-specific request and response structures ---

#[derive(Serialize)]
struct BatchAnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Serialize)]
struct AnnotateImageRequest {
    image: Image,
    features: Vec<Feature>,
}

#[derive(Serialize)]
struct Image {
    content: String,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: FeatureType,
}

#[derive(Deserialize, Debug)]
struct BatchAnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotationResponse>,
}

// --- Vision Provider implementation ---

/// A provider for the Google Cloud Vision `images:annotate` endpoint.
#[derive(Clone, Debug)]
pub struct GoogleVisionProvider {
    client: ReqwestClient,
    api_url: String,
    project_id: String,
    token_source: ServiceAccountTokenSource,
}

impl GoogleVisionProvider {
    /// Creates a new `GoogleVisionProvider`.
    pub fn new(credentials: ServiceAccountCredentials) -> Result<Self, SkillError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(SkillError::ReqwestClientBuild)?;
        let token_source = ServiceAccountTokenSource::new(client.clone(), &credentials)?;
        Ok(Self {
            client,
            api_url: GOOGLE_VISION_API_URL.to_string(),
            project_id: credentials.project_id,
            token_source,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_source = self.token_source.with_token_url(token_url);
        self
    }
}

#[async_trait]
impl AnnotationService for GoogleVisionProvider {
    async fn annotate_image(
        &self,
        image: Vec<u8>,
        features: &[FeatureType],
    ) -> Result<AnnotationResponse, SkillError> {
        let request_body = BatchAnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: Image {
                    content: BASE64.encode(&image),
                },
                features: features.iter().map(|&kind| Feature { kind }).collect(),
            }],
        };
        drop(image);

        let access_token = self.token_source.access_token().await?;
        debug!(api_url = %self.api_url, "Sending annotate request");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(access_token)
            .header("x-goog-user-project", &self.project_id)
            .json(&request_body)
            .send()
            .await
            .map_err(SkillError::Annotation)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Vision API request failed");
            return Err(SkillError::AnnotationApi(format!("{status}: {error_text}")));
        }

        let batch: BatchAnnotateResponse = response.json().await.map_err(SkillError::Annotation)?;

        let annotation = batch
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| SkillError::AnnotationApi("response contained no results".to_string()))?;

        if let Some(status) = &annotation.error {
            let message = status.message.clone().unwrap_or_default();
            return Err(SkillError::AnnotationApi(format!(
                "image could not be annotated (code {}): {message}",
                status.code.unwrap_or_default()
            )));
        }

        Ok(annotation)
    }
}
