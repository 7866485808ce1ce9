//! # Annotation Formatters
//!
//! Pure transforms from an `AnnotationResponse` to the flat metadata records
//! stored on the file. Missing or empty annotations degrade to an empty
//! string value; these functions never fail.

use crate::types::{AnnotationResponse, MetadataRecord, MetadataTemplate};

const KEYWORD_SEPARATOR: &str = ", ";

/// Joins every label description, in response order, into `{ keywords }`.
pub fn keywords_metadata(response: &AnnotationResponse) -> MetadataRecord {
    let keywords = response
        .label_annotations
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|label| label.description.as_str())
        .collect::<Vec<_>>()
        .join(KEYWORD_SEPARATOR);

    MetadataRecord::new(MetadataTemplate::Keywords, keywords)
}

/// Copies the full-text annotation verbatim into `{ transcripts }`.
pub fn transcripts_metadata(response: &AnnotationResponse) -> MetadataRecord {
    let transcript = response
        .full_text_annotation
        .as_ref()
        .and_then(|annotation| annotation.text.as_deref())
        .unwrap_or_default();

    MetadataRecord::new(MetadataTemplate::Transcripts, transcript)
}
