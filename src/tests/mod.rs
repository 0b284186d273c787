use crate::errors::DEFAULT_FAILURE_MESSAGE;
use crate::handlers::submit_handlers::SUCCESS_MESSAGE;
use crate::routes::routes::app;
use crate::services::{
    AppState,
    submission_store::SubmissionStore,
    upload_service::UploadService,
    validation::{EMAIL_INVALID, MESSAGE_TOO_SHORT, NAME_REQUIRED},
};
use axum::http::StatusCode;
use axum_test::{
    TestResponse, TestServer,
    multipart::{MultipartForm, Part},
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const VALID_MESSAGE: &str = "Hello, I would like to know more about your services.";

struct Harness {
    server: TestServer,
    state: AppState,
    upload_dir: PathBuf,
    db_path: PathBuf,
    _dir: TempDir,
}

async fn setup() -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("form_intake=debug,tower_http=debug"))
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let upload_dir = dir.path().join("uploads");
    let db_path = dir.path().join("database.db");
    let public_dir = dir.path().join("public");
    std::fs::create_dir_all(&public_dir).unwrap();
    std::fs::write(public_dir.join("index.html"), "<h1>Contact us</h1>").unwrap();

    let uploads = UploadService::new(&upload_dir);
    uploads.ensure_dir().await.unwrap();
    let store = SubmissionStore::open(&db_path).await.unwrap();
    let state = AppState { store, uploads };

    let server = TestServer::new(app(state.clone(), &public_dir)).unwrap();
    Harness {
        server,
        state,
        upload_dir,
        db_path,
        _dir: dir,
    }
}

fn text_form(name: &str, email: &str, message: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("name", name)
        .add_text("email", email)
        .add_text("message", message)
}

fn file_part(filename: &str, mime: &str, size: usize) -> Part {
    Part::bytes(vec![b'x'; size])
        .file_name(filename)
        .mime_type(mime)
}

fn uploaded_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

fn errors_of(res: &TestResponse) -> Vec<String> {
    let body = res.json::<Value>();
    assert_eq!(body["success"], Value::Bool(false));
    serde_json::from_value(body["errors"].clone()).unwrap()
}

#[tokio::test]
async fn test_submit_without_attachment() {
    let h = setup().await;

    let res = h
        .server
        .post("/api/submit")
        .multipart(text_form("  Ada Lovelace ", "ada@example.com", VALID_MESSAGE))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);

    let body = res.json::<Value>();
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["message"], SUCCESS_MESSAGE);
    let first_id = body["submissionId"].as_i64().unwrap();

    let row = h.state.store.get(first_id).await.unwrap().unwrap();
    assert_eq!(row.name, "Ada Lovelace");
    assert_eq!(row.email, "ada@example.com");
    assert_eq!(row.message, VALID_MESSAGE);
    assert_eq!(row.attachment_filename, None);
    assert_eq!(row.attachment_path, None);

    let res = h
        .server
        .post("/api/submit")
        .multipart(text_form("Grace", "grace@example.org", VALID_MESSAGE))
        .await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let second_id = res.json::<Value>()["submissionId"].as_i64().unwrap();
    assert!(second_id > first_id);
    assert!(uploaded_files(&h.upload_dir).is_empty());
}

#[tokio::test]
async fn test_submit_with_pdf_attachment() {
    let h = setup().await;

    let form = text_form("Ada", "ada@example.com", VALID_MESSAGE)
        .add_part("attachment", file_part("report.pdf", "application/pdf", 1024));
    let res = h.server.post("/api/submit").multipart(form).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    let id = res.json::<Value>()["submissionId"].as_i64().unwrap();

    let files = uploaded_files(&h.upload_dir);
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("report.pdf"));
    let stored = h.upload_dir.join(&files[0]);
    assert_eq!(std::fs::metadata(&stored).unwrap().len(), 1024);

    let row = h.state.store.get(id).await.unwrap().unwrap();
    assert_eq!(row.attachment_filename.as_deref(), Some("report.pdf"));
    assert_eq!(row.attachment_path, Some(stored.display().to_string()));
}

#[tokio::test]
async fn test_oversize_attachment_is_rejected() {
    let h = setup().await;

    let form = text_form("Ada", "ada@example.com", VALID_MESSAGE)
        .add_part("attachment", file_part("big.png", "image/png", 6 * 1024 * 1024));
    let res = h.server.post("/api/submit").multipart(form).await;

    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(errors_of(&res), vec!["File size must not exceed 5MB"]);
    assert_eq!(h.state.store.count().await.unwrap(), 0);
    assert!(uploaded_files(&h.upload_dir).is_empty());
}

#[tokio::test]
async fn test_invalid_fields_remove_written_attachment() {
    let h = setup().await;

    // The file arrives first, so it is on disk before validation runs.
    let form = MultipartForm::new()
        .add_part("attachment", file_part("photo.jpg", "image/jpeg", 2048))
        .add_text("name", "   ")
        .add_text("email", "ada@example.com")
        .add_text("message", VALID_MESSAGE);
    let res = h.server.post("/api/submit").multipart(form).await;

    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(errors_of(&res), vec![NAME_REQUIRED]);
    assert_eq!(h.state.store.count().await.unwrap(), 0);
    assert!(uploaded_files(&h.upload_dir).is_empty());
}

#[tokio::test]
async fn test_all_violations_are_reported_in_order() {
    let h = setup().await;

    let res = h
        .server
        .post("/api/submit")
        .multipart(text_form("", "not-an-email", "too short"))
        .await;

    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        errors_of(&res),
        vec![NAME_REQUIRED, EMAIL_INVALID, MESSAGE_TOO_SHORT]
    );
}

#[tokio::test]
async fn test_disallowed_content_type() {
    let h = setup().await;

    let form = text_form("Ada", "ada@example.com", VALID_MESSAGE)
        .add_part("attachment", file_part("script.sh", "text/x-shellscript", 64));
    let res = h.server.post("/api/submit").multipart(form).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        errors_of(&res),
        vec!["Invalid file type. Only PDF, JPG, and PNG files are allowed."]
    );
    assert_eq!(h.state.store.count().await.unwrap(), 0);
    assert!(uploaded_files(&h.upload_dir).is_empty());
}

#[tokio::test]
async fn test_second_attachment_is_rejected() {
    let h = setup().await;

    let form = text_form("Ada", "ada@example.com", VALID_MESSAGE)
        .add_part("attachment", file_part("one.pdf", "application/pdf", 128))
        .add_part("attachment", file_part("two.pdf", "application/pdf", 128));
    let res = h.server.post("/api/submit").multipart(form).await;

    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(errors_of(&res), vec!["Only one attachment may be submitted"]);
    assert!(uploaded_files(&h.upload_dir).is_empty());
}

#[tokio::test]
async fn test_non_multipart_body_is_a_processing_fault() {
    let h = setup().await;

    let res = h
        .server
        .post("/api/submit")
        .json(&serde_json::json!({ "name": "Ada" }))
        .await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let errors = errors_of(&res);
    assert_eq!(errors.len(), 1);
    assert_ne!(errors[0], DEFAULT_FAILURE_MESSAGE);
    assert!(!errors[0].is_empty());
}

#[tokio::test]
async fn test_submissions_survive_reload() {
    let h = setup().await;

    let mut returned = Vec::new();
    for i in 0..4 {
        let mut form = text_form(
            &format!("Sender {i}"),
            &format!("sender{i}@example.com"),
            VALID_MESSAGE,
        );
        if i % 2 == 0 {
            form = form.add_part("attachment", file_part(&format!("doc{i}.pdf"), "application/pdf", 512));
        }
        let res = h.server.post("/api/submit").multipart(form).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        returned.push(res.json::<Value>()["submissionId"].as_i64().unwrap());
    }

    let reloaded = SubmissionStore::open(&h.db_path).await.unwrap();
    let rows = reloaded.all().await.unwrap();
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), returned);
    assert_eq!(rows, h.state.store.all().await.unwrap());
    assert_eq!(rows[0].attachment_filename.as_deref(), Some("doc0.pdf"));
    assert_eq!(rows[1].attachment_filename, None);
    assert_eq!(uploaded_files(&h.upload_dir).len(), 2);
}

#[tokio::test]
async fn test_health_and_static_files() {
    let h = setup().await;

    let res = h.server.get("/healthz").await;
    res.assert_status_ok();
    assert_eq!(res.json::<Value>()["ready"], Value::Bool(true));

    let res = h.server.get("/readyz").await;
    res.assert_status_ok();
    let body = res.json::<Value>();
    assert_eq!(body["ready"], Value::Bool(true));
    assert_eq!(body["submissions"], 0);
    assert!(body.get("problems").is_none());
    assert!(uploaded_files(&h.upload_dir).is_empty());

    let res = h.server.get("/").await;
    res.assert_status_ok();
    assert!(res.text().contains("Contact us"));

    let res = h.server.get("/missing.css").await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_reports_missing_upload_dir() {
    let h = setup().await;
    std::fs::remove_dir(&h.upload_dir).unwrap();

    let res = h.server.get("/readyz").await;
    assert_eq!(res.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body = res.json::<Value>();
    assert_eq!(body["ready"], Value::Bool(false));
    let problems = body["problems"].as_array().unwrap();
    assert_eq!(problems.len(), 1);
    assert!(problems[0].as_str().unwrap().starts_with("uploads directory"));
}

#[tokio::test]
async fn test_failed_save_returns_500_and_removes_attachment() {
    let h = setup().await;

    // A non-empty directory where the database image should go.
    std::fs::remove_file(&h.db_path).unwrap();
    std::fs::create_dir(&h.db_path).unwrap();
    std::fs::write(h.db_path.join("occupied"), b"x").unwrap();

    let form = text_form("Ada", "ada@example.com", VALID_MESSAGE)
        .add_part("attachment", file_part("report.pdf", "application/pdf", 1024));
    let res = h.server.post("/api/submit").multipart(form).await;

    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let errors = errors_of(&res);
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].is_empty());
    assert_eq!(h.state.store.count().await.unwrap(), 0);
    assert!(uploaded_files(&h.upload_dir).is_empty());
}
