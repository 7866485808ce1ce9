//! # Skill Pipeline
//!
//! Drives one webhook invocation end to end:
//!
//! 1. extract the acting user and file from the event,
//! 2. connect to the storage platform as that user,
//! 3. buffer the file's content,
//! 4. request label and document-text annotations,
//! 5. write the keywords and transcripts records concurrently and join them.
//!
//! Every branch ends in a definitive `Result`; nothing is dropped silently.

use crate::{
    constants::DEFAULT_MAX_FILE_BYTES,
    errors::{FailedWrite, SkillError},
    fetcher::fetch_file_content,
    formatters::{keywords_metadata, transcripts_metadata},
    providers::{
        storage::{StorageClient, StorageConnector},
        vision::{AnnotationService, SKILL_FEATURES},
    },
    types::{AnnotationResponse, InvocationResponse, MetadataTemplate, WebhookEvent, WriteResponse},
    writer::save_metadata,
};
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};

/// Orchestrates the fetch, annotate and write steps for webhook events.
#[derive(Clone, Debug)]
pub struct SkillPipeline {
    storage_connector: Box<dyn StorageConnector>,
    annotation_service: Box<dyn AnnotationService>,
    max_file_bytes: usize,
}

/// A builder for `SkillPipeline`.
#[derive(Default)]
pub struct SkillPipelineBuilder {
    storage_connector: Option<Box<dyn StorageConnector>>,
    annotation_service: Option<Box<dyn AnnotationService>>,
    max_file_bytes: Option<usize>,
}

impl SkillPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage_connector(mut self, connector: Box<dyn StorageConnector>) -> Self {
        self.storage_connector = Some(connector);
        self
    }

    pub fn annotation_service(mut self, service: Box<dyn AnnotationService>) -> Self {
        self.annotation_service = Some(service);
        self
    }

    pub fn max_file_bytes(mut self, max_file_bytes: usize) -> Self {
        self.max_file_bytes = Some(max_file_bytes);
        self
    }

    /// Builds the `SkillPipeline`, failing if a provider is missing.
    pub fn build(self) -> Result<SkillPipeline, SkillError> {
        Ok(SkillPipeline {
            storage_connector: self.storage_connector.ok_or(SkillError::MissingStorageConnector)?,
            annotation_service: self
                .annotation_service
                .ok_or(SkillError::MissingAnnotationService)?,
            max_file_bytes: self.max_file_bytes.unwrap_or(DEFAULT_MAX_FILE_BYTES),
        })
    }
}

impl SkillPipeline {
    pub fn builder() -> SkillPipelineBuilder {
        SkillPipelineBuilder::new()
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    /// Handles one webhook event.
    ///
    /// A malformed event fails before any network call is made.
    #[instrument(skip_all)]
    pub async fn handle_event(&self, event: &WebhookEvent) -> Result<InvocationResponse, SkillError> {
        let file_ref = event
            .file_ref()
            .inspect_err(|e| warn!(error = %e, "Rejecting webhook event"))?;
        info!(
            owner_id = %file_ref.owner_id,
            file_id = %file_ref.file_id,
            "Processing webhook event"
        );

        let storage = self
            .storage_connector
            .connect_as_user(&file_ref.owner_id)
            .await?;
        self.process_file(storage.as_ref(), &file_ref.file_id).await
    }

    /// Annotates `file_id` and stores both metadata records on it.
    #[instrument(skip(self, storage))]
    pub async fn process_file(
        &self,
        storage: &dyn StorageClient,
        file_id: &str,
    ) -> Result<InvocationResponse, SkillError> {
        let image = fetch_file_content(storage, file_id, self.max_file_bytes).await?;
        let annotations = self.request_annotations(image).await?;

        let (keywords, transcripts) = tokio::join!(
            save_metadata(
                storage,
                file_id,
                MetadataTemplate::Keywords,
                keywords_metadata(&annotations),
            ),
            save_metadata(
                storage,
                file_id,
                MetadataTemplate::Transcripts,
                transcripts_metadata(&annotations),
            ),
        );

        join_writes(vec![
            (MetadataTemplate::Keywords, keywords),
            (MetadataTemplate::Transcripts, transcripts),
        ])
    }

    async fn request_annotations(&self, image: Vec<u8>) -> Result<AnnotationResponse, SkillError> {
        let size = image.len();
        let annotations = self
            .annotation_service
            .annotate_image(image, &SKILL_FEATURES)
            .await
            .inspect_err(|e| error!(error = %e, "Annotation request failed"))?;
        info!(
            bytes = size,
            labels = annotations.label_annotations.as_ref().map_or(0, Vec::len),
            has_text = annotations.full_text_annotation.is_some(),
            "Image annotated"
        );
        Ok(annotations)
    }
}

/// Combines the outcomes of the metadata writes into one result.
///
/// Succeeds only when every write succeeded; otherwise the error lists the
/// failed templates next to the ones that were written.
pub fn join_writes(
    outcomes: Vec<(MetadataTemplate, Result<WriteResponse, SkillError>)>,
) -> Result<InvocationResponse, SkillError> {
    let mut written = BTreeMap::new();
    let mut failed = Vec::new();

    for (template, outcome) in outcomes {
        match outcome {
            Ok(response) => {
                written.insert(template.key().to_string(), response.body);
            }
            Err(e) => failed.push(FailedWrite {
                template_key: template.key().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if failed.is_empty() {
        return Ok(InvocationResponse {
            status_code: 200,
            body: written,
        });
    }

    if !written.is_empty() {
        warn!(
            written = ?written.keys().collect::<Vec<_>>(),
            "Metadata only partially written"
        );
    }
    Err(SkillError::MetadataWrites {
        failed,
        written: written.into_keys().collect(),
    })
}
