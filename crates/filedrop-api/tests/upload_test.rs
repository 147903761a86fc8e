mod helpers;

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use helpers::fixtures::{png_bytes, tar_bytes, HELLO, HELLO_SHA256};
use helpers::{name, setup_test_app, setup_test_app_with, value};
use serde_json::Value;

#[tokio::test]
async fn test_put_named_returns_json_metadata() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .put("/upload/test.txt")
        .add_header(header::ACCEPT, value("application/json"))
        .bytes(HELLO.into())
        .await;

    response.assert_status(StatusCode::OK);
    let json: Value = response.json();
    assert_eq!(json["filename"], "test.txt");
    assert_eq!(json["url"], "http://localhost:8080/test.txt");
    assert_eq!(json["direct_url"], "http://localhost:8080/selif/test.txt");
    assert_eq!(json["size"], "5");
    assert_eq!(json["mimetype"], "text/plain");
    assert_eq!(json["sha256sum"], HELLO_SHA256);
    assert_eq!(json["expiry"], "0");
    assert_eq!(json["access_key"], "");
    assert_eq!(json["delete_key"].as_str().unwrap().len(), 30);
}

#[tokio::test]
async fn test_put_without_json_returns_plain_url() {
    let app = setup_test_app().await;

    let response = app.client().put("/upload/notes.txt").bytes(HELLO.into()).await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), "http://localhost:8080/notes.txt");
}

#[tokio::test]
async fn test_put_random_name_sniffs_extension() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .put("/upload")
        .add_header(header::ACCEPT, value("application/json"))
        .bytes(png_bytes().into())
        .await;

    response.assert_status(StatusCode::OK);
    let json: Value = response.json();
    let filename = json["filename"].as_str().unwrap();
    assert!(filename.ends_with(".png"), "got {filename}");
    assert_eq!(filename.len(), "xxxxxxxx.png".len());
    assert_eq!(json["mimetype"], "image/png");
}

#[tokio::test]
async fn test_collisions_get_numeric_suffix() {
    let app = setup_test_app().await;

    for expected in ["report.txt", "report1.txt", "report2.txt"] {
        let response = app
            .client()
            .put("/upload/report.txt")
            .add_header(header::ACCEPT, value("application/json"))
            .bytes(HELLO.into())
            .await;
        let json: Value = response.json();
        assert_eq!(json["filename"], expected);
    }
}

#[tokio::test]
async fn test_matching_delete_key_overwrites_in_place() {
    let app = setup_test_app().await;

    app.client()
        .put("/upload/doc.txt")
        .add_header(name("delete-key"), value("my-delete-key"))
        .bytes(HELLO.into())
        .await
        .assert_status(StatusCode::OK);

    let response = app
        .client()
        .put("/upload/doc.txt")
        .add_header(name("linx-delete-key"), value("my-delete-key"))
        .add_header(header::ACCEPT, value("application/json"))
        .bytes(b"replaced content".to_vec().into())
        .await;

    let json: Value = response.json();
    assert_eq!(json["filename"], "doc.txt");
    assert_eq!(json["size"], "16");
    assert!(!app.storage().exists("doc1.txt").await.unwrap());
}

#[tokio::test]
async fn test_randomize_header_and_force_random_policy() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .put("/upload/named.txt")
        .add_header(name("randomize"), value("yes"))
        .add_header(header::ACCEPT, value("application/json"))
        .bytes(HELLO.into())
        .await;
    let json: Value = response.json();
    assert_ne!(json["filename"], "named.txt");
    assert!(json["filename"].as_str().unwrap().ends_with(".txt"));

    let app = setup_test_app_with(|c| c.force_random_filename = true, None).await;
    let mut seen = Vec::new();
    for _ in 0..2 {
        let response = app
            .client()
            .put("/upload/report.txt")
            .add_header(header::ACCEPT, value("application/json"))
            .bytes(HELLO.into())
            .await;
        let json: Value = response.json();
        seen.push(json["filename"].as_str().unwrap().to_string());
    }
    assert_ne!(seen[0], seen[1]);
    assert!(seen.iter().all(|f| f != "report.txt"));
}

#[tokio::test]
async fn test_expiry_header_is_applied_and_clamped() {
    let app = setup_test_app_with(|c| c.max_expiry_secs = 3600, None).await;

    let before = chrono::Utc::now().timestamp();
    let response = app
        .client()
        .put("/upload/short.txt")
        .add_header(name("linx-expiry"), value("60"))
        .add_header(header::ACCEPT, value("application/json"))
        .bytes(HELLO.into())
        .await;
    let json: Value = response.json();
    let expiry: i64 = json["expiry"].as_str().unwrap().parse().unwrap();
    assert!(expiry >= before + 60 && expiry <= before + 62);

    let response = app
        .client()
        .put("/upload/long.txt")
        .add_header(name("expiry"), value("999999"))
        .add_header(header::ACCEPT, value("application/json"))
        .bytes(HELLO.into())
        .await;
    let json: Value = response.json();
    let expiry: i64 = json["expiry"].as_str().unwrap().parse().unwrap();
    assert!(expiry >= before + 3600 && expiry <= before + 3602);

    // Zero means "the maximum" when one is configured
    let response = app
        .client()
        .put("/upload/zero.txt")
        .add_header(name("expiry"), value("0"))
        .add_header(header::ACCEPT, value("application/json"))
        .bytes(HELLO.into())
        .await;
    let json: Value = response.json();
    assert_ne!(json["expiry"], "0");
}

#[tokio::test]
async fn test_empty_body_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .put("/upload/empty.txt")
        .bytes(Vec::new().into())
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["code"], "EMPTY_FILE");
    assert!(!app.storage().exists("empty.txt").await.unwrap());
}

#[tokio::test]
async fn test_oversized_body_is_rejected_and_leaves_nothing() {
    let app = setup_test_app_with(|c| c.max_size_bytes = 16, None).await;

    let response = app
        .client()
        .put("/upload/big.bin")
        .bytes(vec![b'a'; 64].into())
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["code"], "FILE_TOO_LARGE");
    assert!(app.storage().list().await.unwrap().is_empty());
    assert_eq!(std::fs::read_dir(app.files_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_large_streamed_body_is_bad_request() {
    let app = setup_test_app_with(|c| c.max_size_bytes = 16, None).await;
    let big = vec![b'x'; 2 * 1024 * 1024];

    // Declared length over the cap
    let response = app
        .client()
        .put("/upload/big.bin")
        .add_header(header::CONTENT_LENGTH, value(&big.len().to_string()))
        .bytes(big.clone().into())
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["code"], "FILE_TOO_LARGE");

    // Same body counted while streaming
    let response = app
        .client()
        .put("/upload")
        .bytes(big.into())
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["code"], "FILE_TOO_LARGE");

    assert!(app.storage().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_paste_and_multipart_are_bad_request() {
    let app = setup_test_app_with(|c| c.max_size_bytes = 16, None).await;

    let content = "y".repeat(2 * 1024 * 1024);
    let response = app
        .client()
        .post("/upload")
        .form(&[("content", content.as_str())])
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["code"], "FILE_TOO_LARGE");

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![b'z'; 64]).file_name("big.bin"),
    );
    let response = app
        .client()
        .post("/upload")
        .multipart(form)
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["code"], "FILE_TOO_LARGE");
}

#[tokio::test]
async fn test_prohibited_filename() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .put("/upload/robots.txt")
        .bytes(HELLO.into())
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert_eq!(json["code"], "PROHIBITED_FILENAME");
}

#[tokio::test]
async fn test_multipart_upload_redirects_to_file() {
    let app = setup_test_app().await;

    let form = MultipartForm::new()
        .add_part(
            "file",
            Part::bytes(HELLO.to_vec())
                .file_name("My Notes.txt")
                .mime_type("text/plain"),
        )
        .add_text("expires", "600");

    let response = app.client().post("/upload").multipart(form).await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://localhost:8080/my-notes.txt"
    );

    let metadata = app.storage().head("my-notes.txt").await.unwrap();
    assert_eq!(metadata.size, 5);
    assert!(metadata.expiry.unix_timestamp() > 0, "field after the file still applies");
}

#[tokio::test]
async fn test_multipart_without_file_part() {
    let app = setup_test_app().await;

    let form = MultipartForm::new().add_text("expires", "600");
    let response = app
        .client()
        .post("/upload")
        .multipart(form)
        .expect_failure()
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_paste_form_upload() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .add_header(header::ACCEPT, value("application/json"))
        .form(&[
            ("content", "fn main() {}"),
            ("filename", "snippet"),
            ("extension", "rs"),
            ("access_key", "letmein"),
        ])
        .await;

    response.assert_status(StatusCode::OK);
    let json: Value = response.json();
    assert_eq!(json["filename"], "snippet.rs");
    assert_eq!(json["access_key"], "letmein");
    assert_eq!(json["size"], "12");
}

#[tokio::test]
async fn test_paste_form_defaults() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .add_header(header::ACCEPT, value("application/json"))
        .form(&[("content", "just text")])
        .await;

    let json: Value = response.json();
    let filename = json["filename"].as_str().unwrap();
    assert!(filename.ends_with(".txt"));
    assert_eq!(filename.len(), "xxxxxxxx.txt".len());

    let response = app
        .client()
        .post("/upload")
        .form(&[("content", ""), ("filename", "nothing")])
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_archive_members_in_info() {
    let app = setup_test_app().await;
    let archive = tar_bytes(&[("b.txt", b"b"), ("a.txt", b"a")]);

    app.client()
        .put("/upload/bundle.tar")
        .bytes(archive.into())
        .await
        .assert_status(StatusCode::OK);

    let response = app
        .client()
        .get("/bundle.tar")
        .add_header(header::ACCEPT, value("application/json"))
        .await;
    let json: Value = response.json();
    assert_eq!(json["mimetype"], "application/x-tar");
    assert_eq!(json["archive_files"], serde_json::json!(["a.txt", "b.txt"]));
}

#[tokio::test]
async fn test_expiry_choices() {
    let app = setup_test_app_with(|c| c.max_expiry_secs = 7200, None).await;

    let response = app.client().get("/expiry-choices").await;
    response.assert_status(StatusCode::OK);
    let choices: Vec<Value> = response.json();
    let seconds: Vec<u64> = choices.iter().map(|c| c["seconds"].as_u64().unwrap()).collect();
    assert_eq!(seconds, vec![60, 300, 3600, 7200]);
}
