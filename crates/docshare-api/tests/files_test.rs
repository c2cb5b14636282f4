//! File API integration tests.
//!
//! Run with: `cargo test -p docshare-api --test files_test`

mod helpers;

use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;
use docshare_core::{AppError, ManualClock, Principal, SystemClock};
use helpers::auth::{admin_token, citizen_token};
use helpers::{local_path, setup_test_app, setup_test_app_with, upload, upload_pdf};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[tokio::test]
async fn test_health_is_public() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body, json!({ "status": "healthy", "service": "document-service" }));

    let response = app.client().get("/ready").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_missing_bearer_is_unauthorized() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/files/user/alice").await;
    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let response = app
        .client()
        .get("/api/files/user/alice")
        .add_header("Authorization", "Bearer not-a-jwt")
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_upload_records_metadata() {
    let app = setup_test_app().await;
    let token = citizen_token("alice");

    let response = upload(app.client(), &token, "Passport Scan.PDF", b"%PDF-1.4 hello").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    let path = body["storage_path"].as_str().unwrap();
    assert!(path.starts_with("files/alice/Passport Scan_"));
    assert!(path.ends_with(".pdf"));

    let response = app
        .client()
        .get("/api/files/user/alice")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total_files"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 20);
    let file = &body["files"][0];
    assert_eq!(file["original_name"], "Passport Scan.PDF");
    assert_eq!(file["category"], "general");
    assert_eq!(file["verified"], false);
    assert_eq!(file["size_bytes"], 14);
    assert_eq!(file["checksum"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_upload_category_from_form_field() {
    let app = setup_test_app().await;
    let token = citizen_token("alice");

    let form = MultipartForm::new()
        .add_text("category", "identity")
        .add_part("file", Part::bytes(b"png-bytes".to_vec()).file_name("id.png"));
    let response = app
        .client()
        .post("/api/files/upload")
        .add_header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = app
        .client()
        .get("/api/files/user/alice")
        .add_header("Authorization", format!("Bearer {}", token))
        .await
        .json();
    assert_eq!(body["files"][0]["category"], "identity");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_colliding_uploads_keep_record_and_bytes_in_step() {
    let app = setup_test_app_with(|_| {}, Arc::new(ManualClock::default())).await;
    let alice = Principal::ordinary("alice");

    for round in 0..20u8 {
        let name = format!("id{}.pdf", round);
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let files = app.state.files.clone();
                let alice = alice.clone();
                let name = name.clone();
                tokio::spawn(async move {
                    let data = Bytes::from(vec![i + 1; 1024 * (i as usize + 1)]);
                    files.upload(&alice, &name, data, None).await
                })
            })
            .collect();

        let mut stored = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => {
                    stored += 1;
                    let bytes = app
                        .state
                        .blobs
                        .storage
                        .download(&record.storage_path)
                        .await
                        .unwrap();
                    assert_eq!(hex::encode(Sha256::digest(&bytes)), record.checksum);
                    assert_eq!(bytes.len() as u64, record.size_bytes);
                }
                Err(e) => assert!(matches!(e, AppError::InternalConflict(_)), "{:?}", e),
            }
        }
        assert_eq!(stored, 1);
    }
}

#[tokio::test]
async fn test_upload_accepts_dots_inside_name() {
    let app = setup_test_app().await;

    let (path, _) = upload_pdf(app.client(), &citizen_token("alice"), "scan..v2.pdf").await;
    assert!(path.starts_with("files/alice/scan..v2_"));
    assert!(app.state.blobs.storage.exists(&path).await.unwrap());

    let response = upload(app.client(), &citizen_token("alice"), "..", b"%PDF").await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_extension() {
    let app = setup_test_app().await;

    let response = upload(app.client(), &citizen_token("alice"), "setup.exe", b"MZ").await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_upload_rejects_oversized_file() {
    let app = setup_test_app_with(
        |config| config.upload.max_file_size_bytes = 1024,
        Arc::new(SystemClock),
    )
    .await;

    let response = upload(app.client(), &citizen_token("alice"), "big.pdf", &[7u8; 2048]).await;
    assert_eq!(response.status_code(), 413);
    let body: Value = response.json();
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_upload_rejects_body_over_limit() {
    let app = setup_test_app_with(
        |config| config.upload.max_file_size_bytes = 1024,
        Arc::new(SystemClock),
    )
    .await;

    let response = upload(
        app.client(),
        &citizen_token("alice"),
        "huge.pdf",
        &vec![7u8; 512 * 1024],
    )
    .await;
    assert_eq!(response.status_code(), 413);
}

#[tokio::test]
async fn test_upload_rejects_empty_file() {
    let app = setup_test_app().await;

    let response = upload(app.client(), &citizen_token("alice"), "empty.pdf", b"").await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_listing_is_owner_or_admin_only() {
    let app = setup_test_app().await;
    upload_pdf(app.client(), &citizen_token("alice"), "a.pdf").await;

    let response = app
        .client()
        .get("/api/files/user/alice")
        .add_header("Authorization", format!("Bearer {}", citizen_token("mallory")))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .client()
        .get("/api/files/user/alice")
        .add_header("Authorization", format!("Bearer {}", admin_token("root")))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total_files"], 1);
}

#[tokio::test]
async fn test_listing_paginates_in_upload_order() {
    let app = setup_test_app().await;
    let token = citizen_token("alice");
    let mut paths = Vec::new();
    for i in 0..5 {
        let (path, _) = upload_pdf(app.client(), &token, &format!("doc{}.pdf", i)).await;
        paths.push(path);
    }

    let body: Value = app
        .client()
        .get("/api/files/user/alice?page=2&size=2")
        .add_header("Authorization", format!("Bearer {}", token))
        .await
        .json();
    assert_eq!(body["total_files"], 5);
    assert_eq!(body["page_size"], 2);
    assert_eq!(body["files"][0]["storage_path"], paths[2].as_str());
    assert_eq!(body["files"][1]["storage_path"], paths[3].as_str());

    let body: Value = app
        .client()
        .get("/api/files/user/alice?verified_only=true")
        .add_header("Authorization", format!("Bearer {}", token))
        .await
        .json();
    assert_eq!(body["total_files"], 0);
}

#[tokio::test]
async fn test_all_files_requires_admin() {
    let app = setup_test_app().await;
    upload_pdf(app.client(), &citizen_token("alice"), "a.pdf").await;
    upload_pdf(app.client(), &citizen_token("bob"), "b.pdf").await;

    let response = app
        .client()
        .get("/api/files/all")
        .add_header("Authorization", format!("Bearer {}", citizen_token("alice")))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .client()
        .get("/api/files/all")
        .add_header("Authorization", format!("Bearer {}", admin_token("root")))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total_files"], 2);
    assert_eq!(body["page_size"], 15);
}

#[tokio::test]
async fn test_download_links_report_per_path_errors() {
    let app = setup_test_app().await;
    let alice = citizen_token("alice");
    let (own_path, _) = upload_pdf(app.client(), &alice, "mine.pdf").await;
    let (foreign_path, _) = upload_pdf(app.client(), &citizen_token("bob"), "theirs.pdf").await;

    let response = app
        .client()
        .post("/api/files/download-links")
        .add_header("Authorization", format!("Bearer {}", alice))
        .json(&json!({
            "file_paths": [own_path, "files/alice/missing.pdf", foreign_path]
        }))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    let link = body["download_links"][own_path.as_str()].as_str().unwrap();
    assert!(link.contains("signature="));
    assert_eq!(body["errors"]["files/alice/missing.pdf"]["status"], 404);
    assert_eq!(body["errors"][foreign_path.as_str()]["status"], 403);
    assert_eq!(body["errors"][foreign_path.as_str()]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_download_links_caps_batch_size() {
    let app = setup_test_app().await;
    let paths: Vec<String> = (0..101).map(|i| format!("files/alice/{}.pdf", i)).collect();

    let response = app
        .client()
        .post("/api/files/download-links")
        .add_header("Authorization", format!("Bearer {}", citizen_token("alice")))
        .json(&json!({ "filePaths": paths }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_signed_link_serves_bytes() {
    let app = setup_test_app().await;
    let alice = citizen_token("alice");
    let (path, _) = upload_pdf(app.client(), &alice, "report.pdf").await;

    let body: Value = app
        .client()
        .post("/api/files/download-links")
        .add_header("Authorization", format!("Bearer {}", alice))
        .json(&json!({ "file_paths": [path] }))
        .await
        .json();
    let link = local_path(body["download_links"][path.as_str()].as_str().unwrap());

    let response = app.client().get(&link).await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.as_bytes().as_ref(), b"%PDF-1.4 test document");
    assert_eq!(response.header("content-type"), "application/pdf");

    let tampered = link.replace("signature=", "signature=00");
    assert_eq!(app.client().get(&tampered).await.status_code(), 403);
}

#[tokio::test]
async fn test_list_paths_with_and_without_links() {
    let app = setup_test_app().await;
    let alice = citizen_token("alice");
    let (path, _) = upload_pdf(app.client(), &alice, "a.pdf").await;

    let body: Value = app
        .client()
        .get("/api/files/list/alice")
        .add_header("Authorization", format!("Bearer {}", alice))
        .await
        .json();
    assert_eq!(body, json!({ "file_paths": [path] }));

    let body: Value = app
        .client()
        .get("/api/files/list/alice?include_links=true")
        .add_header("Authorization", format!("Bearer {}", alice))
        .await
        .json();
    assert!(body["download_links"][path.as_str()].is_string());

    let response = app
        .client()
        .get("/api/files/list/alice")
        .add_header("Authorization", format!("Bearer {}", citizen_token("bob")))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_update_category_by_owner_only() {
    let app = setup_test_app().await;
    let alice = citizen_token("alice");
    let (_, file_id) = upload_pdf(app.client(), &alice, "a.pdf").await;

    let response = app
        .client()
        .put(&format!("/api/files/{}/category", file_id))
        .add_header("Authorization", format!("Bearer {}", citizen_token("bob")))
        .json(&json!({ "category": "tax" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .client()
        .put(&format!("/api/files/{}/category", file_id))
        .add_header("Authorization", format!("Bearer {}", alice))
        .json(&json!({ "category": "tax" }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["category"], "tax");
}

#[tokio::test]
async fn test_update_category_for_malformed_file_id_is_not_found() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .put("/api/files/not-a-uuid/category")
        .add_header("Authorization", format!("Bearer {}", citizen_token("alice")))
        .json(&json!({ "category": "tax" }))
        .await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_stranger_cannot_delete() {
    let app = setup_test_app().await;
    let (path, _) = upload_pdf(app.client(), &citizen_token("alice"), "a.pdf").await;

    let response = app
        .client()
        .delete(&format!("/api/files/remove/{}", path))
        .add_header("Authorization", format!("Bearer {}", citizen_token("mallory")))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .client()
        .delete("/api/files/remove/files/alice/nope.pdf")
        .add_header("Authorization", format!("Bearer {}", citizen_token("mallory")))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_owner_delete_removes_record_and_blob() {
    let app = setup_test_app().await;
    let alice = citizen_token("alice");
    let (path, _) = upload_pdf(app.client(), &alice, "a.pdf").await;

    let response = app
        .client()
        .delete(&format!("/api/files/remove/{}", path))
        .add_header("Authorization", format!("Bearer {}", alice))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["file_path"], path.as_str());

    assert!(!app.state.blobs.storage.exists(&path).await.unwrap());

    let response = app
        .client()
        .delete(&format!("/api/files/remove/{}", path))
        .add_header("Authorization", format!("Bearer {}", alice))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;
    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["paths"]["/api/files/upload"].is_object());
}
