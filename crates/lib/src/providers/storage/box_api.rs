use super::{BoxAuthenticator, FileContent, StorageClient, StorageConnector};
use crate::{
    constants::{BOX_API_URL, BOX_METADATA_SCOPE},
    errors::SkillError,
    types::MetadataRecord,
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client as ReqwestClient, Response};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, sync::Arc};
use tracing::{debug, error, info};

// --- Connector ---

/// Creates Box clients authenticated as the acting user of a webhook.
#[derive(Clone, Debug)]
pub struct BoxConnector {
    client: ReqwestClient,
    api_url: String,
    authenticator: Arc<BoxAuthenticator>,
}

impl BoxConnector {
    pub fn new(client: ReqwestClient, authenticator: BoxAuthenticator) -> Self {
        Self {
            client,
            api_url: BOX_API_URL.to_string(),
            authenticator: Arc::new(authenticator),
        }
    }

    /// Overrides the API base URL (e.g. `https://api.box.com`).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl StorageConnector for BoxConnector {
    async fn connect_as_user(&self, user_id: &str) -> Result<Box<dyn StorageClient>, SkillError> {
        let access_token = self.authenticator.user_access_token(user_id).await?;
        info!(user_id, "Authenticated Box client for user");
        Ok(Box::new(BoxClient::new(
            self.client.clone(),
            self.api_url.clone(),
            access_token,
        )))
    }
}

// --- Client ---

/// A Box API client holding a user-scoped access token.
#[derive(Clone)]
pub struct BoxClient {
    client: ReqwestClient,
    api_url: String,
    access_token: String,
}

impl fmt::Debug for BoxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl BoxClient {
    pub fn new(client: ReqwestClient, api_url: String, access_token: String) -> Self {
        Self {
            client,
            api_url,
            access_token,
        }
    }

    fn metadata_url(&self, file_id: &str, template_key: &str) -> String {
        format!(
            "{}/2.0/files/{file_id}/metadata/{BOX_METADATA_SCOPE}/{template_key}",
            self.api_url
        )
    }

    async fn storage_error(response: Response) -> SkillError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        SkillError::StorageApi { status, body }
    }
}

/// Keeps the user fields of a platform metadata instance, dropping the
/// `$`-prefixed system fields (`$id`, `$version`, `$template`, ...).
fn record_from_instance(instance: Value) -> MetadataRecord {
    let fields = match instance {
        Value::Object(map) => map
            .into_iter()
            .filter(|(key, _)| !key.starts_with('$'))
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    MetadataRecord::from(fields)
}

#[async_trait]
impl StorageClient for BoxClient {
    async fn open_read_stream(&self, file_id: &str) -> Result<FileContent, SkillError> {
        let url = format!("{}/2.0/files/{file_id}/content", self.api_url);
        debug!(file_id, "Opening Box read stream");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| SkillError::FileStream {
                file_id: file_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(file_id, %status, "Box refused the content download");
            return Err(SkillError::FileStream {
                file_id: file_id.to_string(),
                reason: format!("download returned {status}: {body}"),
            });
        }

        let content_length = response.content_length();
        let stream_file_id = file_id.to_string();
        let stream = response
            .bytes_stream()
            .map_err(move |e| SkillError::FileStream {
                file_id: stream_file_id.clone(),
                reason: e.to_string(),
            })
            .boxed();

        Ok(FileContent {
            content_length,
            stream,
        })
    }

    async fn create_metadata(
        &self,
        file_id: &str,
        template_key: &str,
        record: &MetadataRecord,
    ) -> Result<MetadataRecord, SkillError> {
        let response = self
            .client
            .post(self.metadata_url(file_id, template_key))
            .bearer_auth(&self.access_token)
            .json(record)
            .send()
            .await
            .map_err(SkillError::StorageRequest)?;

        if !response.status().is_success() {
            return Err(Self::storage_error(response).await);
        }

        let instance: Value = response.json().await.map_err(SkillError::StorageRequest)?;
        Ok(record_from_instance(instance))
    }

    async fn get_metadata(
        &self,
        file_id: &str,
        template_key: &str,
    ) -> Result<MetadataRecord, SkillError> {
        let response = self
            .client
            .get(self.metadata_url(file_id, template_key))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(SkillError::StorageRequest)?;

        if !response.status().is_success() {
            return Err(Self::storage_error(response).await);
        }

        let instance: Value = response.json().await.map_err(SkillError::StorageRequest)?;
        Ok(record_from_instance(instance))
    }
}
