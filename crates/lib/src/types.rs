//! # Domain Types
//!
//! Request-scoped values that flow through the pipeline: the inbound webhook
//! event, the annotation service's response, and the metadata records
//! written back to Box.

use crate::{
    constants::{KEYWORDS_TEMPLATE_KEY, TRANSCRIPTS_TEMPLATE_KEY},
    errors::SkillError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Webhook Event ---

/// A raw invocation event. `body` holds the webhook payload as a JSON string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookEvent {
    pub body: String,
}

/// The user and file identifiers extracted from a webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub owner_id: String,
    pub file_id: String,
}

#[derive(Deserialize)]
struct WebhookPayload {
    source: Option<WebhookSource>,
}

#[derive(Deserialize)]
struct WebhookSource {
    id: Option<BoxId>,
    owned_by: Option<WebhookOwner>,
}

#[derive(Deserialize)]
struct WebhookOwner {
    id: Option<BoxId>,
}

/// Box ids are documented as strings but older payloads carry them as numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum BoxId {
    Text(String),
    Number(u64),
}

impl BoxId {
    fn into_string(self) -> String {
        match self {
            BoxId::Text(s) => s,
            BoxId::Number(n) => n.to_string(),
        }
    }
}

fn required_id(id: Option<BoxId>, field: &str) -> Result<String, SkillError> {
    let id = id
        .map(BoxId::into_string)
        .ok_or_else(|| SkillError::MalformedEvent(format!("missing `{field}`")))?;
    if id.trim().is_empty() {
        return Err(SkillError::MalformedEvent(format!("`{field}` is empty")));
    }
    Ok(id)
}

impl WebhookEvent {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// Parses the body and extracts `source.owned_by.id` and `source.id`.
    pub fn file_ref(&self) -> Result<FileRef, SkillError> {
        let payload: WebhookPayload = serde_json::from_str(&self.body)
            .map_err(|e| SkillError::MalformedEvent(format!("body is not valid JSON: {e}")))?;
        let source = payload
            .source
            .ok_or_else(|| SkillError::MalformedEvent("missing `source`".to_string()))?;
        let owner = source
            .owned_by
            .ok_or_else(|| SkillError::MalformedEvent("missing `source.owned_by`".to_string()))?;

        Ok(FileRef {
            owner_id: required_id(owner.id, "source.owned_by.id")?,
            file_id: required_id(source.id, "source.id")?,
        })
    }
}

// --- Annotation Response ---

/// The annotation result for a single image.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_annotations: Option<Vec<LabelAnnotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AnnotationStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelAnnotation {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topicality: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FullTextAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A per-image error status reported inside an otherwise successful response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnnotationStatus {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

// --- Metadata ---

/// The metadata templates this skill writes to, all in the global scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataTemplate {
    Keywords,
    Transcripts,
}

impl MetadataTemplate {
    pub const ALL: [MetadataTemplate; 2] = [MetadataTemplate::Keywords, MetadataTemplate::Transcripts];

    pub fn key(&self) -> &'static str {
        match self {
            MetadataTemplate::Keywords => KEYWORDS_TEMPLATE_KEY,
            MetadataTemplate::Transcripts => TRANSCRIPTS_TEMPLATE_KEY,
        }
    }

    /// The single field stored under the template.
    pub fn field(&self) -> &'static str {
        match self {
            MetadataTemplate::Keywords => "keywords",
            MetadataTemplate::Transcripts => "transcripts",
        }
    }
}

/// A flat field-to-string mapping stored against a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRecord(BTreeMap<String, String>);

impl MetadataRecord {
    /// Builds the record for `template` holding `value` in its field.
    pub fn new(template: MetadataTemplate, value: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(template.field().to_string(), value.into());
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for MetadataRecord {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }
}

/// The result of one successful metadata write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub status_code: u16,
    pub body: MetadataRecord,
}

impl WriteResponse {
    pub fn ok(body: MetadataRecord) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }
}

/// The aggregate result of one invocation: every written record keyed by
/// its template key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: BTreeMap<String, MetadataRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_ref_from_string_ids() {
        let event = WebhookEvent::new(r#"{"source":{"owned_by":{"id":"111"},"id":"222"}}"#);
        let file_ref = event.file_ref().unwrap();
        assert_eq!(file_ref.owner_id, "111");
        assert_eq!(file_ref.file_id, "222");
    }

    #[test]
    fn test_file_ref_accepts_numeric_ids() {
        let event = WebhookEvent::new(r#"{"source":{"owned_by":{"id":111},"id":222}}"#);
        let file_ref = event.file_ref().unwrap();
        assert_eq!(file_ref.owner_id, "111");
        assert_eq!(file_ref.file_id, "222");
    }

    #[test]
    fn test_file_ref_missing_file_id() {
        let event = WebhookEvent::new(r#"{"source":{"owned_by":{"id":"111"}}}"#);
        let err = event.file_ref().unwrap_err();
        assert!(matches!(err, SkillError::MalformedEvent(msg) if msg.contains("source.id")));
    }

    #[test]
    fn test_file_ref_missing_owner() {
        let event = WebhookEvent::new(r#"{"source":{"id":"222"}}"#);
        assert!(matches!(
            event.file_ref(),
            Err(SkillError::MalformedEvent(msg)) if msg.contains("owned_by")
        ));
    }

    #[test]
    fn test_file_ref_rejects_invalid_json() {
        let event = WebhookEvent::new("not json");
        assert!(matches!(
            event.file_ref(),
            Err(SkillError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_file_ref_rejects_empty_id() {
        let event = WebhookEvent::new(r#"{"source":{"owned_by":{"id":"111"},"id":"  "}}"#);
        assert!(matches!(
            event.file_ref(),
            Err(SkillError::MalformedEvent(msg)) if msg.contains("empty")
        ));
    }

    #[test]
    fn test_annotation_response_ignores_unknown_fields() {
        let json = r#"{
            "labelAnnotations": [{"mid": "/m/07j7r", "description": "Tree", "score": 0.97}],
            "fullTextAnnotation": {"text": "EXIT", "pages": []},
            "faceAnnotations": []
        }"#;
        let response: AnnotationResponse = serde_json::from_str(json).unwrap();
        let labels = response.label_annotations.unwrap();
        assert_eq!(labels[0].description, "Tree");
        assert_eq!(labels[0].mid.as_deref(), Some("/m/07j7r"));
        assert_eq!(response.full_text_annotation.unwrap().text.as_deref(), Some("EXIT"));
    }

    #[test]
    fn test_metadata_record_serializes_flat() {
        let record = MetadataRecord::new(MetadataTemplate::Keywords, "cat, dog");
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({ "keywords": "cat, dog" })
        );
        let response = WriteResponse::ok(record);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "statusCode": 200, "body": { "keywords": "cat, dog" } })
        );
    }
}
