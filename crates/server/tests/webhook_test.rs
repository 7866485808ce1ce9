//! # Webhook Endpoint Tests
//!
//! Drives the HTTP surface against the in-memory storage and annotation mocks.

mod common;

use boxvision::MetadataTemplate;
use boxvision_test_utils::{annotation, MockAnnotationService, MockStorage, StorageCall};
use common::{TestApp, EVENT_BODY};
use reqwest::StatusCode;
use serde_json::{json, Value};

const IMAGE: &[u8] = b"\xff\xd8\xff\xe0fake-jpeg";

fn seeded() -> (MockStorage, MockAnnotationService) {
    let storage = MockStorage::new();
    let annotator = MockAnnotationService::new();
    storage.add_file("222", IMAGE);
    annotator.add_response(IMAGE, annotation(&["tree", "park"], Some("Sign: No Dogs")));
    (storage, annotator)
}

fn expected_body() -> Value {
    json!({
        "statusCode": 200,
        "body": {
            "box-skills-keywords-demo": { "keywords": "tree, park" },
            "box-skills-transcripts-demo": { "transcripts": "Sign: No Dogs" }
        }
    })
}

#[tokio::test]
async fn test_liveness_endpoints() {
    let (storage, annotator) = seeded();
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    let root = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(root.status(), StatusCode::OK);
    assert_eq!(root.text().await.unwrap(), "boxvision server is running.");

    let health = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_webhook_delivery_writes_both_templates() {
    // --- 1. Arrange ---
    let (storage, annotator) = seeded();
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    // --- 2. Act ---
    let response = app
        .client
        .post(app.url("/webhook"))
        .header("box-delivery-id", "f96bb54b-ee16-4fc5-aa65-8c2d9e5b546f")
        .header("content-type", "application/json")
        .body(EVENT_BODY)
        .send()
        .await
        .unwrap();

    // --- 3. Assert ---
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, expected_body());
    for template in MetadataTemplate::ALL {
        assert!(storage.metadata("222", template.key()).is_some());
    }
}

#[tokio::test]
async fn test_invoke_event_writes_both_templates() {
    let (storage, annotator) = seeded();
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    let response = app
        .client
        .post(app.url("/invoke"))
        .json(&json!({ "body": EVENT_BODY }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, expected_body());
}

#[tokio::test]
async fn test_malformed_event_is_a_bad_request() {
    let (storage, annotator) = seeded();
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    let response = app
        .client
        .post(app.url("/webhook"))
        .body(r#"{"source":{"id":"222"}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("source.owned_by"));
    assert!(storage.calls().is_empty());
    assert!(annotator.calls().is_empty());
}

#[tokio::test]
async fn test_invoke_without_event_envelope_is_a_bad_request() {
    let (storage, annotator) = seeded();
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    // The raw delivery sent where the `{ body }` envelope is expected.
    let response = app
        .client
        .post(app.url("/invoke"))
        .json(&json!({ "source": { "id": "222" } }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Malformed webhook event"));
    assert!(storage.calls().is_empty());
    assert!(annotator.calls().is_empty());
}

#[tokio::test]
async fn test_invoke_with_non_string_body_is_a_bad_request() {
    let (storage, annotator) = seeded();
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    let response = app
        .client
        .post(app.url("/invoke"))
        .json(&json!({ "body": { "source": { "owned_by": { "id": "111" }, "id": "222" } } }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(storage.calls().is_empty());
}

#[tokio::test]
async fn test_annotation_failure_is_a_bad_gateway() {
    let (storage, annotator) = seeded();
    annotator.fail_with("RESOURCE_EXHAUSTED");
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    let response = app
        .client
        .post(app.url("/webhook"))
        .body(EVENT_BODY)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("RESOURCE_EXHAUSTED"));
    assert!(!storage
        .calls()
        .iter()
        .any(|call| matches!(call, StorageCall::CreateMetadata { .. })));
}

#[tokio::test]
async fn test_partial_write_failure_names_both_templates() {
    let (storage, annotator) = seeded();
    storage.fail_metadata_writes(MetadataTemplate::Keywords.key());
    let app = TestApp::spawn_with_mocks(&storage, &annotator).await.unwrap();

    let response = app
        .client
        .post(app.url("/webhook"))
        .body(EVENT_BODY)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let message = response.json::<Value>().await.unwrap()["error"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("box-skills-keywords-demo"));
    assert!(message.contains("box-skills-transcripts-demo"));
    assert!(storage
        .metadata("222", MetadataTemplate::Transcripts.key())
        .is_some());
}

#[tokio::test]
async fn test_oversized_file_is_payload_too_large() {
    let storage = MockStorage::new();
    let annotator = MockAnnotationService::new();
    storage.add_file("222", &[1u8; 64]);
    let pipeline = boxvision::SkillPipeline::builder()
        .storage_connector(Box::new(storage.clone()))
        .annotation_service(Box::new(annotator.clone()))
        .max_file_bytes(16)
        .build()
        .unwrap();
    let app = TestApp::spawn_with_state(boxvision_server::state::AppState::new(pipeline))
        .await
        .unwrap();

    let response = app
        .client
        .post(app.url("/webhook"))
        .body(EVENT_BODY)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(annotator.calls().is_empty());
}
