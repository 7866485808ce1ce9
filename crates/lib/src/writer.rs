//! # Metadata Writer

use crate::{
    errors::SkillError,
    providers::storage::StorageClient,
    types::{MetadataRecord, MetadataTemplate, WriteResponse},
};
use tracing::{error, info};

/// Creates the metadata instance for `template` on the file.
///
/// Creation is always attempted; if an instance already exists the
/// platform's rejection is returned as the error.
pub async fn save_metadata(
    storage: &dyn StorageClient,
    file_id: &str,
    template: MetadataTemplate,
    record: MetadataRecord,
) -> Result<WriteResponse, SkillError> {
    match storage
        .create_metadata(file_id, template.key(), &record)
        .await
    {
        Ok(_) => {
            info!(file_id, template_key = template.key(), "Metadata saved");
            Ok(WriteResponse::ok(record))
        }
        Err(e) => {
            error!(file_id, template_key = template.key(), error = %e, "Failed to save metadata");
            Err(e)
        }
    }
}
