//! # Box Vision Skill
//!
//! Annotates image files stored in Box with Google Cloud Vision and writes the
//! results back onto the file as metadata. A webhook event names the file and
//! its owner; `SkillPipeline` fetches the content, requests label and
//! document-text annotations, and stores a keywords record and a transcripts
//! record under two global metadata templates.

pub mod constants;
pub mod errors;
pub mod fetcher;
pub mod formatters;
pub mod pipeline;
pub mod providers;
pub mod types;
pub mod writer;

pub use errors::SkillError;
pub use pipeline::{SkillPipeline, SkillPipelineBuilder};
pub use types::{
    AnnotationResponse, FileRef, InvocationResponse, MetadataRecord, MetadataTemplate,
    WebhookEvent, WriteResponse,
};
