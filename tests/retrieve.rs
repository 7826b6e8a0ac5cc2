//! Tests for POST /retrieve-license and /retrieve-license/request-code:
//! email validation, uniform not-found behavior, and the verification-code
//! gate.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use tower::ServiceExt;

use renaym_licensing::handlers::public::hash_retrieval_code;
use renaym_licensing::state::AppState;
use renaym_licensing::store::{self, CustomerStore, MetadataMap};

mod common;
use common::*;

async fn post_json(
    state: AppState,
    uri: &str,
    body: serde_json::Value,
) -> axum::http::Response<Body> {
    test_app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

fn annual_metadata() -> MetadataMap {
    license_metadata(
        "RENAYM-AAAAA-BBBBB-CCCCC-DDDDD",
        "annual",
        "2024-01-15T00:00:00Z",
        "2025-01-15T00:00:00Z",
    )
}

fn with_code(mut metadata: MetadataMap, code: &str, expires_in_secs: i64) -> MetadataMap {
    metadata.insert(
        store::META_RETRIEVAL_CODE_HASH.into(),
        hash_retrieval_code(code),
    );
    metadata.insert(
        store::META_RETRIEVAL_CODE_EXPIRES_AT.into(),
        (Utc::now().timestamp() + expires_in_secs).to_string(),
    );
    metadata
}

#[tokio::test]
async fn test_malformed_email_rejected_before_lookup() {
    let (state, _store) = test_state();

    let response = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "not-an-email" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid email address");
}

#[tokio::test]
async fn test_gated_mode_requires_verification_code() {
    let (state, store) = test_state();
    store.create("a@x.com", annual_metadata()).await.unwrap();

    let response = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_direct_mode_unknown_email_and_licenseless_customer_look_identical() {
    let (state, store) = test_state_with(Default::default(), false);
    // A customer record with no license metadata at all
    store.create("customer@x.com", MetadataMap::new()).await.unwrap();

    let unknown = post_json(
        state.clone(),
        "/retrieve-license",
        serde_json::json!({ "email": "ghost@x.com" }),
    )
    .await;
    let licenseless = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "customer@x.com" }),
    )
    .await;

    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(licenseless.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(unknown).await, body_bytes(licenseless).await);
}

#[tokio::test]
async fn test_direct_mode_returns_stored_license_unchanged() {
    let (state, store) = test_state_with(Default::default(), false);
    store.create("a@x.com", annual_metadata()).await.unwrap();

    let response = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["licenseKey"], "RENAYM-AAAAA-BBBBB-CCCCC-DDDDD");
    assert_eq!(body["plan"], "annual");
    assert_eq!(body["issuedAt"], "2024-01-15T00:00:00Z");
    assert_eq!(body["expiresAt"], "2025-01-15T00:00:00Z");

    // Retrieval never mutates the stored license
    let metadata = store
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap()
        .metadata;
    assert_eq!(metadata, annual_metadata());
}

#[tokio::test]
async fn test_lifetime_license_returns_explicit_null_expiry() {
    let (state, store) = test_state_with(Default::default(), false);
    store
        .create(
            "a@x.com",
            license_metadata(
                "RENAYM-AAAAA-BBBBB-CCCCC-DDDDD",
                "lifetime",
                "2024-01-15T00:00:00Z",
                "lifetime",
            ),
        )
        .await
        .unwrap();

    let response = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // The field must be present and null, not omitted
    assert!(body.as_object().unwrap().contains_key("expiresAt"));
    assert!(body["expiresAt"].is_null());
}

#[tokio::test]
async fn test_request_code_rejects_malformed_email() {
    let (state, _store) = test_state();

    let response = post_json(
        state,
        "/retrieve-license/request-code",
        serde_json::json!({ "email": "nope" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_code_response_is_uniform_for_unknown_emails() {
    let (state, store) = test_state();
    store.create("licensed@x.com", annual_metadata()).await.unwrap();

    let known = post_json(
        state.clone(),
        "/retrieve-license/request-code",
        serde_json::json!({ "email": "licensed@x.com" }),
    )
    .await;
    let unknown = post_json(
        state,
        "/retrieve-license/request-code",
        serde_json::json!({ "email": "ghost@x.com" }),
    )
    .await;

    assert_eq!(known.status(), StatusCode::OK);
    assert_eq!(unknown.status(), StatusCode::OK);
    assert_eq!(body_bytes(known).await, body_bytes(unknown).await);

    // But only the licensed customer has a pending code
    let metadata = store
        .find_by_email("licensed@x.com")
        .await
        .unwrap()
        .unwrap()
        .metadata;
    assert!(metadata.contains_key(store::META_RETRIEVAL_CODE_HASH));
    assert!(metadata.contains_key(store::META_RETRIEVAL_CODE_EXPIRES_AT));
    assert!(store.find_by_email("ghost@x.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_resending_invalidates_previous_code() {
    let (state, store) = test_state();
    store.create("a@x.com", annual_metadata()).await.unwrap();

    post_json(
        state.clone(),
        "/retrieve-license/request-code",
        serde_json::json!({ "email": "a@x.com" }),
    )
    .await;
    let first_hash = store
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap()
        .metadata
        .get(store::META_RETRIEVAL_CODE_HASH)
        .cloned()
        .unwrap();

    post_json(
        state,
        "/retrieve-license/request-code",
        serde_json::json!({ "email": "a@x.com" }),
    )
    .await;
    let second_hash = store
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap()
        .metadata
        .get(store::META_RETRIEVAL_CODE_HASH)
        .cloned()
        .unwrap();

    assert_ne!(first_hash, second_hash);
}

#[tokio::test]
async fn test_valid_code_returns_license_and_is_single_use() {
    let (state, store) = test_state();
    store
        .create("a@x.com", with_code(annual_metadata(), "123456", 600))
        .await
        .unwrap();

    let response = post_json(
        state.clone(),
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com", "verificationCode": "123456" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["licenseKey"], "RENAYM-AAAAA-BBBBB-CCCCC-DDDDD");

    // The code was consumed on success
    let metadata = store
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap()
        .metadata;
    assert!(!metadata.contains_key(store::META_RETRIEVAL_CODE_HASH));

    // Replaying it fails
    let replay = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com", "verificationCode": "123456" }),
    )
    .await;
    assert_eq!(replay.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_wrong_code_and_unknown_email_fail_identically() {
    let (state, store) = test_state();
    store
        .create("a@x.com", with_code(annual_metadata(), "123456", 600))
        .await
        .unwrap();

    let wrong_code = post_json(
        state.clone(),
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com", "verificationCode": "000000" }),
    )
    .await;
    let unknown_email = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "ghost@x.com", "verificationCode": "123456" }),
    )
    .await;

    assert_eq!(wrong_code.status(), StatusCode::FORBIDDEN);
    assert_eq!(unknown_email.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_bytes(wrong_code).await, body_bytes(unknown_email).await);
}

#[tokio::test]
async fn test_expired_code_rejected() {
    let (state, store) = test_state();
    store
        .create("a@x.com", with_code(annual_metadata(), "123456", -60))
        .await
        .unwrap();

    let response = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com", "verificationCode": "123456" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_valid_code_but_no_license_is_not_found() {
    let (state, store) = test_state();
    store
        .create("a@x.com", with_code(MetadataMap::new(), "123456", 600))
        .await
        .unwrap();

    let response = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "a@x.com", "verificationCode": "123456" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No license found for this email address");
}

#[tokio::test]
async fn test_retrieval_email_lookup_is_normalized() {
    let (state, store) = test_state_with(Default::default(), false);
    store.create("a@x.com", annual_metadata()).await.unwrap();

    let response = post_json(
        state,
        "/retrieve-license",
        serde_json::json!({ "email": "  A@X.COM " }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
}
