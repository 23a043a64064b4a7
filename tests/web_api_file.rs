//! Web API File Tests
//!
//! Integration tests for upload, info and download endpoints.

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use chs_archive::file::{BlobStore, FileService};
use chs_archive::web::handlers::AppState;
use chs_archive::web::middleware::RateLimitState;
use chs_archive::web::router::create_router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const BASE_URL: &str = "https://archive.example.com";

/// Create a test server backed by a temporary store.
fn create_test_server(
    configure: impl FnOnce(FileService) -> FileService,
) -> (TestServer, BlobStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = BlobStore::open(dir.path().join("uploads")).expect("Failed to open store");

    let files = configure(FileService::new(store.clone()));
    let app_state = Arc::new(AppState::new(files).with_public_base_url(BASE_URL));
    let rate_limit = Arc::new(RateLimitState::new(Duration::from_secs(60), 10_000));

    let router = create_router(app_state, rate_limit, &[]);
    let server = TestServer::new(router).expect("Failed to create test server");

    (server, store, dir)
}

fn file_form(filename: &str, content: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(content.to_vec())
            .file_name(filename)
            .mime_type("application/octet-stream"),
    )
}

/// Upload a file and return the response JSON.
async fn upload(server: &TestServer, filename: &str, content: &[u8]) -> Value {
    let response = server
        .post("/upload")
        .multipart(file_form(filename, content))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json::<Value>()
}

fn id_of(upload: &Value) -> String {
    upload["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_upload_report_txt() {
    let (server, _store, _dir) = create_test_server(|files| files);

    let body = upload(&server, "report.txt", b"hello").await;
    let id = id_of(&body);

    let (token, name) = id.split_once('-').unwrap();
    assert_eq!(token.len(), 32);
    assert!(token
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    assert_eq!(name, "report.txt");

    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(body["filename"], "report.txt");
    assert_eq!(body["size"], 5);
    assert_eq!(body["url"], format!("{BASE_URL}/file/{id}"));

    let info = server.get(&format!("/api/files/{id}")).await;
    assert_eq!(info.status_code(), StatusCode::OK);
    let info = info.json::<Value>();
    assert_eq!(info["size"], 5);
    assert_eq!(info["filename"], "report.txt");
    assert_eq!(
        info["sha256"],
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    assert_eq!(info["downloads"], 0);
    assert_eq!(info["download_url"], format!("/download/{id}"));
}

#[tokio::test]
async fn test_download_round_trip() {
    let (server, _store, _dir) = create_test_server(|files| files);
    let content: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();

    let id = id_of(&upload(&server, "data.bin", &content).await);

    let response = server.get(&format!("/download/{id}")).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(&response.as_bytes()[..], content.as_slice());
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"data.bin\""
    );
    assert_eq!(response.header("content-length"), "100000");
}

#[tokio::test]
async fn test_download_with_original_name_override() {
    let (server, _store, _dir) = create_test_server(|files| files);
    let id = id_of(&upload(&server, "report.txt", b"hello").await);

    let response = server
        .get(&format!("/download/{id}?originalname=summary.txt"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"summary.txt\""
    );
    assert_eq!(response.header("content-type"), "text/plain");
    assert_eq!(response.text(), "hello");
}

#[tokio::test]
async fn test_download_stored_name_route() {
    let (server, _store, _dir) = create_test_server(|files| files);
    let id = id_of(&upload(&server, "my report.txt", b"hello").await);

    let response = server.get(&format!("/files/{id}")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.header("content-disposition"),
        "attachment; filename=\"my_report.txt\""
    );
}

#[tokio::test]
async fn test_download_counter() {
    let (server, _store, _dir) = create_test_server(|files| files);
    let id = id_of(&upload(&server, "report.txt", b"hello").await);

    for _ in 0..3 {
        let response = server.get(&format!("/download/{id}")).await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }
    server.get(&format!("/files/{id}")).await;

    let info = server.get(&format!("/api/files/{id}")).await.json::<Value>();
    assert_eq!(info["downloads"], 4);

    // Viewing the page does not count as a download
    let page = server.get(&format!("/file/{id}")).await;
    assert_eq!(page.status_code(), StatusCode::OK);
    assert!(page.text().contains("<strong>Downloads:</strong> 4"));

    let info = server.get(&format!("/api/files/{id}")).await.json::<Value>();
    assert_eq!(info["downloads"], 4);
}

#[tokio::test]
async fn test_file_page() {
    let (server, _store, _dir) = create_test_server(|files| files);
    let id = id_of(&upload(&server, "photo.png", b"\x89PNG fake").await);

    let response = server.get(&format!("/file/{id}")).await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("<title>photo.png - CHS Archive</title>"));
    assert!(html.contains("<strong>Size:</strong> 0.0 KB"));
    assert!(html.contains(r#"class="preview""#));
    assert!(html.contains(&format!(r#"href="/download/{id}""#)));
}

#[tokio::test]
async fn test_nonexistent_file() {
    let (server, _store, _dir) = create_test_server(|files| files);

    let page = server.get("/file/nonexistent").await;
    assert_eq!(page.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(page.text(), "File not found");

    let info = server.get("/api/files/nonexistent").await;
    assert_eq!(info.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(info.json::<Value>()["error"]["code"], "NOT_FOUND");

    let download = server.get("/download/nonexistent").await;
    assert_eq!(download.status_code(), StatusCode::NOT_FOUND);

    let download = server.get("/files/nonexistent").await;
    assert_eq!(download.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_file_not_found() {
    let (server, store, _dir) = create_test_server(|files| files);
    let id = id_of(&upload(&server, "report.txt", b"hello").await);

    assert!(store.delete(&id).unwrap());

    let info = server.get(&format!("/api/files/{id}")).await;
    assert_eq!(info.status_code(), StatusCode::NOT_FOUND);
    let download = server.get(&format!("/download/{id}")).await;
    assert_eq!(download.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_staging_directory_not_served() {
    let (server, _store, _dir) = create_test_server(|files| files);

    let response = server.get("/download/.incoming").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = server.get("/api/files/.incoming").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_traversal_name_stays_in_root() {
    let (server, store, _dir) = create_test_server(|files| files);

    let body = upload(&server, "../../etc/passwd", b"root:x:0:0").await;
    let id = id_of(&body);

    assert!(!id.contains('/'));
    assert!(id.ends_with("passwd"));

    let path = store.object_path(&id).unwrap();
    assert_eq!(path.parent().unwrap(), store.root());
    assert!(path.is_file());

    let response = server.get(&format!("/download/{id}")).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "root:x:0:0");
}

#[tokio::test]
async fn test_identical_uploads_get_distinct_ids() {
    let (server, _store, _dir) = create_test_server(|files| files);

    let first = id_of(&upload(&server, "same.txt", b"same bytes").await);
    let second = id_of(&upload(&server, "same.txt", b"same bytes").await);
    assert_ne!(first, second);

    for id in [&first, &second] {
        let response = server.get(&format!("/download/{id}")).await;
        assert_eq!(response.text(), "same bytes");
    }

    let health = server.get("/health").await.json::<Value>();
    assert_eq!(health["objects"], 2);
}

#[tokio::test]
async fn test_disallowed_extension() {
    let (server, store, _dir) =
        create_test_server(|files| files.with_allowed_extensions(["jpg", "png", "txt"]));

    let response = server
        .post("/upload")
        .multipart(file_form("script.exe", b"MZ"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("File type not allowed"));
    assert_eq!(store.usage().unwrap().objects, 0);

    // Case-insensitive match
    upload(&server, "PHOTO.PNG", b"png").await;
}

#[tokio::test]
async fn test_oversized_upload() {
    let (server, store, _dir) = create_test_server(|files| files.with_max_file_size(16));

    let response = server
        .post("/upload")
        .multipart(file_form("big.txt", &[b'x'; 32]))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["error"]["message"], "File too large (max 16 bytes)");
    assert_eq!(store.usage().unwrap().objects, 0);

    // Exactly at the limit is accepted
    upload(&server, "fits.txt", &[b'x'; 16]).await;
}

#[tokio::test]
async fn test_upload_without_file() {
    let (server, _store, _dir) = create_test_server(|files| files);

    let form = MultipartForm::new().add_text("description", "no file here");
    let response = server.post("/upload").multipart(form).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"]["message"],
        "No file uploaded"
    );
}

#[tokio::test]
async fn test_health() {
    let (server, _store, dir) = create_test_server(|files| files);
    upload(&server, "report.txt", b"hello").await;

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let text = response.text();
    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["objects"], 1);
    assert_eq!(body["storage"], "0.00MB used");
    assert!(!text.contains(dir.path().to_str().unwrap()));
}

#[tokio::test]
async fn test_security_headers() {
    let (server, _store, _dir) = create_test_server(|files| files);

    let response = server.get("/health").await;

    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
    assert!(response
        .header("content-security-policy")
        .to_str()
        .unwrap()
        .starts_with("default-src 'self'"));
}
