pub mod google;
pub mod service_account;

use crate::{errors::SkillError, types::AnnotationResponse};
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::Serialize;
use std::fmt::Debug;

pub use google::GoogleVisionProvider;
pub use service_account::{ServiceAccountCredentials, ServiceAccountTokenSource};

/// The annotation kinds that can be requested for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureType {
    LabelDetection,
    DocumentTextDetection,
}

/// Every feature this skill asks for on each image.
pub const SKILL_FEATURES: [FeatureType; 2] =
    [FeatureType::LabelDetection, FeatureType::DocumentTextDetection];

/// A trait for interacting with an image annotation service.
#[async_trait]
pub trait AnnotationService: Send + Sync + Debug + DynClone {
    /// Annotates a single image, returning the result for that image.
    async fn annotate_image(
        &self,
        image: Vec<u8>,
        features: &[FeatureType],
    ) -> Result<AnnotationResponse, SkillError>;
}

dyn_clone::clone_trait_object!(AnnotationService);
