//! # File Content Fetcher
//!
//! Buffers a file's content stream into memory, enforcing a size ceiling.

use crate::{errors::SkillError, providers::storage::StorageClient};
use futures::TryStreamExt;
use tracing::{debug, error};

/// Reads the whole content of `file_id` into one contiguous buffer.
///
/// Fails with `FileTooLarge` as soon as the advertised length or the bytes
/// received so far exceed `max_bytes`.
pub async fn fetch_file_content(
    storage: &dyn StorageClient,
    file_id: &str,
    max_bytes: usize,
) -> Result<Vec<u8>, SkillError> {
    let content = storage
        .open_read_stream(file_id)
        .await
        .inspect_err(|e| error!(file_id, error = %e, "Failed to open read stream"))?;

    let too_large = || SkillError::FileTooLarge {
        file_id: file_id.to_string(),
        limit: max_bytes,
    };

    if let Some(length) = content.content_length {
        if length > max_bytes as u64 {
            return Err(too_large());
        }
    }

    let mut buffer = Vec::with_capacity(content.content_length.unwrap_or(0) as usize);
    let mut stream = content.stream;
    while let Some(chunk) = stream
        .try_next()
        .await
        .inspect_err(|e| error!(file_id, error = %e, "File stream failed"))?
    {
        if buffer.len() + chunk.len() > max_bytes {
            return Err(too_large());
        }
        buffer.extend_from_slice(&chunk);
    }

    debug!(file_id, bytes = buffer.len(), "File content buffered");
    Ok(buffer)
}
