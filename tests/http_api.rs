//! HTTP API tests
//!
//! Drive the full router (CORS, body limit, JSON envelopes) with in-process
//! backends so no OCR engine or Ollama instance is needed.

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};

use ocr_gateway::config::{Config, OllamaConfig};
use ocr_gateway::ocr::{LineRecognitionBackend, LineRecognizer, OllamaBackend, RecognizedLine};
use ocr_gateway::routes;
use ocr_gateway::state::AppState;

/// Recognizer returning fixed lines and counting its runs
struct CannedRecognizer {
    lines: Vec<RecognizedLine>,
    calls: Arc<AtomicUsize>,
}

impl LineRecognizer for CannedRecognizer {
    fn name(&self) -> &str {
        "paddleocr"
    }

    fn recognize(&mut self, _image: &RgbImage) -> anyhow::Result<Vec<RecognizedLine>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lines.clone())
    }
}

fn line_server(lines: Vec<RecognizedLine>) -> (TestServer, Arc<AtomicUsize>) {
    line_server_with(Config::default(), lines)
}

fn line_server_with(
    config: Config,
    lines: Vec<RecognizedLine>,
) -> (TestServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = LineRecognitionBackend::new(CannedRecognizer {
        lines,
        calls: Arc::clone(&calls),
    });

    let app = routes::app(AppState::new(config, Arc::new(backend)));
    (TestServer::new(app).unwrap(), calls)
}

fn ollama_server(url: &str, staging: &Path) -> TestServer {
    let ollama = OllamaConfig {
        url: url.to_string(),
        model: "minicpm-v:8b".to_string(),
        timeout_secs: 5,
    };
    let backend = OllamaBackend::new(&ollama, staging.to_path_buf()).unwrap();

    let mut config = Config::default();
    config.backend.ollama = ollama;
    TestServer::new(routes::app(AppState::new(config, Arc::new(backend)))).unwrap()
}

fn png_base64() -> String {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(8, 8))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    STANDARD.encode(bytes)
}

#[tokio::test]
async fn test_health_line_backend() {
    let (server, _) = line_server(vec![]);

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "PaddleOCR Server");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_ocr_returns_text_confidence_and_faces() {
    let (server, calls) = line_server(vec![
        RecognizedLine::new("Photo", 0.9),
        RecognizedLine::new("ID card", 0.7),
    ]);

    let response = server.post("/ocr").json(&json!({ "image": png_base64() })).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["text"], "Photo ID card");
    assert_eq!(body["confidence"], 0.8);
    assert_eq!(body["lines"], 2);
    assert_eq!(body["hasFaces"], true);
    assert_eq!(body["faceCount"], 1);
    assert_eq!(body["model"], "paddleocr");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ocr_accepts_data_url_prefix() {
    let (server, _) = line_server(vec![RecognizedLine::new("Invoice number 1029", 0.95)]);

    let image = format!("data:image/png;base64,{}", png_base64());
    let response = server.post("/ocr").json(&json!({ "image": image })).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["text"], "Invoice number 1029");
    assert_eq!(body["hasFaces"], false);
    assert_eq!(body["faceCount"], 0);
}

#[tokio::test]
async fn test_ocr_zero_lines_has_zero_confidence() {
    let (server, _) = line_server(vec![]);

    let response = server.post("/ocr").json(&json!({ "image": png_base64() })).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["text"], "");
    assert_eq!(body["confidence"], 0.0);
    assert_eq!(body["lines"], 0);
}

#[tokio::test]
async fn test_ocr_missing_image() {
    let (server, calls) = line_server(vec![]);

    let response = server
        .post("/ocr")
        .json(&json!({ "prompt": "read it" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "success": false, "error": "No image provided" }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ocr_malformed_base64() {
    let (server, calls) = line_server(vec![]);

    let response = server
        .post("/ocr")
        .json(&json!({ "image": "%%% not base64 %%%" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("base64"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ocr_base64_of_non_image() {
    let (server, _) = line_server(vec![]);

    let response = server
        .post("/ocr")
        .json(&json!({ "image": STANDARD.encode(b"just some text") }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Unsupported image format");
}

#[tokio::test]
async fn test_ocr_malformed_json_body() {
    let (server, _) = line_server(vec![]);

    let response = server
        .post("/ocr")
        .bytes("{\"image\": ".into())
        .content_type("application/json")
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_batch_with_corrupt_middle_entry() {
    let (server, calls) = line_server(vec![RecognizedLine::new("PORTRAIT", 0.99)]);

    let response = server
        .post("/ocr/batch")
        .json(&json!({ "images": [png_base64(), "corrupt!!", png_base64()] }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["text"], "PORTRAIT");
    assert_eq!(results[0]["hasFaces"], true);
    assert_eq!(results[1]["text"], "");
    assert_eq!(results[1]["hasFaces"], false);
    assert_eq!(results[1]["faceCount"], 0);
    assert_eq!(results[1]["confidence"], 0.0);
    assert!(results[1]["error"].is_string());
    assert_eq!(results[2]["text"], "PORTRAIT");
    assert!(results[2].get("error").is_none());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_body_over_limit_is_payload_too_large() {
    let mut config = Config::default();
    config.server.max_body_bytes = 1024;
    let (server, calls) = line_server_with(config, vec![]);

    let response = server
        .post("/ocr")
        .json(&json!({ "image": "A".repeat(4096) }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json::<Value>()["success"], false);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Bodies under the limit still go through
    let response = server.post("/ocr").json(&json!({ "image": png_base64() })).await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_batch_non_string_entry_fails_alone() {
    let (server, _) = line_server(vec![RecognizedLine::new("ok", 1.0)]);

    let response = server
        .post("/ocr/batch")
        .json(&json!({ "images": [{ "nested": true }, png_base64()] }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert!(body["results"][0]["error"].is_string());
    assert_eq!(body["results"][1]["text"], "ok");
}

#[tokio::test]
async fn test_batch_missing_images() {
    let (server, _) = line_server(vec![]);

    let response = server
        .post("/ocr/batch")
        .json(&json!({ "image": png_base64() }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "success": false, "error": "No images provided" }));
}

#[tokio::test]
async fn test_batch_empty_list() {
    let (server, _) = line_server(vec![]);

    let response = server.post("/ocr/batch").json(&json!({ "images": [] })).await;
    response.assert_status_ok();
    response.assert_json(&json!({ "results": [] }));
}

#[tokio::test]
async fn test_models_line_backend() {
    let (server, _) = line_server(vec![]);

    let response = server.get("/models").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "models": ["paddleocr"] }));
}

#[tokio::test]
async fn test_unreachable_ollama_health_is_unavailable() {
    let staging = tempfile::tempdir().unwrap();
    let server = ollama_server("http://127.0.0.1:59999", staging.path());

    let response = server.get("/health").expect_failure().await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["model"], "minicpm-v:8b");
    assert!(body["error"].is_string());
    assert_eq!(body["message"], "Ollama is not running or model not available");
}

#[tokio::test]
async fn test_unreachable_ollama_ocr_fails_and_cleans_up() {
    let staging = tempfile::tempdir().unwrap();
    let server = ollama_server("http://127.0.0.1:59999", staging.path());

    let response = server
        .post("/ocr")
        .json(&json!({ "image": png_base64() }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["success"], false);

    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_ollama_malformed_base64_leaves_no_staged_file() {
    let staging = tempfile::tempdir().unwrap();
    let server = ollama_server("http://127.0.0.1:59999", staging.path());

    let response = server
        .post("/ocr")
        .json(&json!({ "image": "%%%" }))
        .expect_failure()
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"]
        .as_str()
        .unwrap()
        .contains("base64"));

    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_ollama_batch_failures_have_no_confidence() {
    let staging = tempfile::tempdir().unwrap();
    let server = ollama_server("http://127.0.0.1:59999", staging.path());

    let response = server
        .post("/ocr/batch")
        .json(&json!({ "images": ["%%%", png_base64()] }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    for item in body["results"].as_array().unwrap() {
        assert_eq!(item["text"], "");
        assert!(item["error"].is_string());
        assert!(item.get("confidence").is_none());
    }
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unreachable_ollama_models_is_server_error() {
    let staging = tempfile::tempdir().unwrap();
    let server = ollama_server("http://127.0.0.1:59999", staging.path());

    let response = server.get("/models").expect_failure().await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["success"], false);
}
