use thiserror::Error;

/// A single metadata write that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub template_key: String,
    pub reason: String,
}

/// Custom error types for the skill pipeline.
#[derive(Error, Debug)]
pub enum SkillError {
    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),
    #[error("Storage connector is not configured")]
    MissingStorageConnector,
    #[error("Annotation service is not configured")]
    MissingAnnotationService,
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Invalid private key: {0}")]
    Key(String),
    #[error("Failed to sign JWT assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Failed to read file content for file {file_id}: {reason}")]
    FileStream { file_id: String, reason: String },
    #[error("File {file_id} exceeds the {limit} byte limit")]
    FileTooLarge { file_id: String, limit: usize },
    #[error("Failed to send request to the annotation service: {0}")]
    Annotation(reqwest::Error),
    #[error("Annotation service returned an error: {0}")]
    AnnotationApi(String),
    #[error("Storage API request failed: {0}")]
    StorageRequest(reqwest::Error),
    #[error("Storage API returned status {status}: {body}")]
    StorageApi { status: u16, body: String },
    #[error("Metadata write failed for [{}]; written: [{}]", describe_failures(.failed), .written.join(", "))]
    MetadataWrites {
        failed: Vec<FailedWrite>,
        written: Vec<String>,
    },
}

fn describe_failures(failed: &[FailedWrite]) -> String {
    failed
        .iter()
        .map(|f| format!("{}: {}", f.template_key, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl SkillError {
    /// Whether the error was caused by one of the upstream services rather
    /// than by the caller or by local configuration.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SkillError::Auth(_)
                | SkillError::FileStream { .. }
                | SkillError::Annotation(_)
                | SkillError::AnnotationApi(_)
                | SkillError::StorageRequest(_)
                | SkillError::StorageApi { .. }
                | SkillError::MetadataWrites { .. }
        )
    }
}
