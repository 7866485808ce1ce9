//! # Test Utilities
//!
//! In-memory stand-ins for the storage platform and the annotation service,
//! plus RSA key fixtures for the JWT flows. The mocks record every call so
//! tests can assert on what reached the "network".

use async_trait::async_trait;
use boxvision::{
    errors::SkillError,
    providers::{
        storage::{FileContent, StorageClient, StorageConnector},
        vision::{AnnotationService, FeatureType},
    },
    types::{AnnotationResponse, FullTextAnnotation, LabelAnnotation, MetadataRecord},
};
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};

pub const RSA_PRIVATE_KEY: &str = include_str!("../fixtures/rsa_private.pem");
pub const RSA_PRIVATE_KEY_ENCRYPTED: &str = include_str!("../fixtures/rsa_private_encrypted.pem");
pub const RSA_PRIVATE_KEY_PASSPHRASE: &str = "test-passphrase";

static INIT: Once = Once::new();

/// Initializes a test tracing subscriber once per process.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .with_test_writer()
            .try_init();
    });
}

/// Builds an annotation response with the given labels and optional text.
pub fn annotation(labels: &[&str], text: Option<&str>) -> AnnotationResponse {
    AnnotationResponse {
        label_annotations: Some(
            labels
                .iter()
                .map(|description| LabelAnnotation {
                    description: description.to_string(),
                    ..Default::default()
                })
                .collect(),
        ),
        full_text_annotation: text.map(|t| FullTextAnnotation {
            text: Some(t.to_string()),
        }),
        error: None,
    }
}

// --- Mock Storage ---

/// Every call the mock storage platform received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Connect { user_id: String },
    OpenReadStream { file_id: String },
    CreateMetadata { file_id: String, template_key: String },
    GetMetadata { file_id: String, template_key: String },
}

#[derive(Debug, Default)]
struct StorageState {
    files: HashMap<String, Vec<u8>>,
    metadata: HashMap<(String, String), MetadataRecord>,
    failing_templates: HashSet<String>,
    failing_streams: HashSet<String>,
    unsized_files: HashSet<String>,
    calls: Vec<StorageCall>,
}

/// An in-memory storage platform. Acts as both connector and client;
/// clones share state.
#[derive(Clone, Debug, Default)]
pub struct MockStorage {
    state: Arc<Mutex<StorageState>>,
    chunk_size: usize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            chunk_size: 4,
        }
    }

    /// Splits file content into chunks of `chunk_size` bytes.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Stores a file's content.
    pub fn add_file(&self, file_id: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(file_id.to_string(), content.to_vec());
    }

    /// Makes every metadata write under `template_key` fail.
    pub fn fail_metadata_writes(&self, template_key: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_templates.insert(template_key.to_string());
    }

    /// Makes the read stream for `file_id` error after its first chunk.
    pub fn fail_stream_midway(&self, file_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_streams.insert(file_id.to_string());
    }

    /// Streams `file_id` without advertising its length, like a chunked download.
    pub fn withhold_content_length(&self, file_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.unsized_files.insert(file_id.to_string());
    }

    pub fn metadata(&self, file_id: &str, template_key: &str) -> Option<MetadataRecord> {
        let state = self.state.lock().unwrap();
        state
            .metadata
            .get(&(file_id.to_string(), template_key.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: StorageCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl StorageConnector for MockStorage {
    async fn connect_as_user(&self, user_id: &str) -> Result<Box<dyn StorageClient>, SkillError> {
        self.record(StorageCall::Connect {
            user_id: user_id.to_string(),
        });
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl StorageClient for MockStorage {
    async fn open_read_stream(&self, file_id: &str) -> Result<FileContent, SkillError> {
        self.record(StorageCall::OpenReadStream {
            file_id: file_id.to_string(),
        });
        let state = self.state.lock().unwrap();
        let content = state
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| SkillError::FileStream {
                file_id: file_id.to_string(),
                reason: "404 Not Found".to_string(),
            })?;
        let fails_midway = state.failing_streams.contains(file_id);
        let content_length =
            (!state.unsized_files.contains(file_id)).then_some(content.len() as u64);

        let mut chunks: Vec<Result<Bytes, SkillError>> = content
            .chunks(self.chunk_size.max(1))
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        if fails_midway {
            chunks.truncate(1);
            chunks.push(Err(SkillError::FileStream {
                file_id: file_id.to_string(),
                reason: "connection reset".to_string(),
            }));
        }

        Ok(FileContent {
            content_length,
            stream: futures::stream::iter(chunks).boxed(),
        })
    }

    async fn create_metadata(
        &self,
        file_id: &str,
        template_key: &str,
        record: &MetadataRecord,
    ) -> Result<MetadataRecord, SkillError> {
        self.record(StorageCall::CreateMetadata {
            file_id: file_id.to_string(),
            template_key: template_key.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.failing_templates.contains(template_key) {
            return Err(SkillError::StorageApi {
                status: 404,
                body: format!("instance_not_found: template {template_key}"),
            });
        }
        let key = (file_id.to_string(), template_key.to_string());
        if state.metadata.contains_key(&key) {
            return Err(SkillError::StorageApi {
                status: 409,
                body: "tuple_already_exists".to_string(),
            });
        }
        state.metadata.insert(key, record.clone());
        Ok(record.clone())
    }

    async fn get_metadata(
        &self,
        file_id: &str,
        template_key: &str,
    ) -> Result<MetadataRecord, SkillError> {
        self.record(StorageCall::GetMetadata {
            file_id: file_id.to_string(),
            template_key: template_key.to_string(),
        });
        self.metadata(file_id, template_key)
            .ok_or_else(|| SkillError::StorageApi {
                status: 404,
                body: "instance_not_found".to_string(),
            })
    }
}

// --- Mock Annotation Service ---

#[derive(Debug, Default)]
struct AnnotationState {
    responses: HashMap<Vec<u8>, AnnotationResponse>,
    failure: Option<String>,
    calls: Vec<(Vec<u8>, Vec<FeatureType>)>,
}

/// An annotation service answering from a table keyed by image bytes.
#[derive(Clone, Debug, Default)]
pub struct MockAnnotationService {
    state: Arc<Mutex<AnnotationState>>,
}

impl MockAnnotationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-programs the response for an image.
    pub fn add_response(&self, image: &[u8], response: AnnotationResponse) {
        let mut state = self.state.lock().unwrap();
        state.responses.insert(image.to_vec(), response);
    }

    /// Makes every request fail with an API error.
    pub fn fail_with(&self, message: &str) {
        self.state.lock().unwrap().failure = Some(message.to_string());
    }

    /// Retrieves the recorded calls for assertion.
    pub fn calls(&self) -> Vec<(Vec<u8>, Vec<FeatureType>)> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl AnnotationService for MockAnnotationService {
    async fn annotate_image(
        &self,
        image: Vec<u8>,
        features: &[FeatureType],
    ) -> Result<AnnotationResponse, SkillError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((image.clone(), features.to_vec()));
        if let Some(message) = &state.failure {
            return Err(SkillError::AnnotationApi(message.clone()));
        }
        Ok(state.responses.get(&image).cloned().unwrap_or_default())
    }
}
