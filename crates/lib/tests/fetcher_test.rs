//! # File Content Fetcher Tests
//!
//! Covers the running size check applied while chunks arrive, which is the
//! only guard when the platform does not advertise a content length.

use boxvision::{errors::SkillError, fetcher::fetch_file_content};
use boxvision_test_utils::{setup_tracing, MockStorage};

/// Ten 8-byte chunks, streamed without a content length.
fn chunked_file() -> (MockStorage, Vec<u8>) {
    let storage = MockStorage::new().with_chunk_size(8);
    let content: Vec<u8> = (0..80u8).collect();
    storage.add_file("222", &content);
    storage.withhold_content_length("222");
    (storage, content)
}

#[tokio::test]
async fn test_running_total_over_limit_is_rejected() {
    // --- 1. Arrange ---
    setup_tracing();
    let (storage, _) = chunked_file();

    // --- 2. Act ---
    let result = fetch_file_content(&storage, "222", 32).await;

    // --- 3. Assert ---
    assert!(
        matches!(&result, Err(SkillError::FileTooLarge { file_id, limit: 32 }) if file_id == "222"),
        "unexpected result: {result:?}"
    );
}

#[tokio::test]
async fn test_content_exactly_at_limit_is_accepted() {
    setup_tracing();
    let (storage, content) = chunked_file();

    let buffered = fetch_file_content(&storage, "222", 80).await.unwrap();

    assert_eq!(buffered.len(), 80);
    assert_eq!(buffered, content);
}

#[tokio::test]
async fn test_limit_one_byte_short_is_rejected() {
    setup_tracing();
    let (storage, _) = chunked_file();

    let result = fetch_file_content(&storage, "222", 79).await;

    assert!(matches!(result, Err(SkillError::FileTooLarge { limit: 79, .. })));
}
