//! API integration tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vblur_api::{create_router, ApiConfig, AppState};
use vblur_jobs::JobsConfig;
use vblur_media::testing::{boxed_detection, checkerboard_frames, MemoryCodec, ScriptedDetector};

const BOUNDARY: &str = "vblur-test-boundary";

struct TestApp {
    dir: TempDir,
    router: Router,
}

impl TestApp {
    fn uploads(&self) -> usize {
        count_files(&self.dir.path().join("uploads"))
    }

    fn outputs(&self) -> usize {
        count_files(&self.dir.path().join("outputs"))
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

async fn test_app_with(config: ApiConfig, codec: MemoryCodec) -> TestApp {
    let dir = TempDir::new().unwrap();
    let detector = ScriptedDetector::always(vec![boxed_detection(1, 1, 6, 4, "secret", 0.9)]);
    let state = AppState::new(
        config,
        JobsConfig::in_dir(dir.path()),
        Arc::new(codec),
        Arc::new(detector),
    );
    state.jobs.artifacts().ensure_dirs().await.unwrap();

    TestApp {
        dir,
        router: create_router(state, None),
    }
}

async fn test_app() -> TestApp {
    test_app_with(
        ApiConfig::default(),
        MemoryCodec::new(checkerboard_frames(4, 12, 8)),
    )
    .await
}

fn upload<'a>(file_name: &'a str, data: &'a [u8]) -> Option<(&'a str, &'a [u8])> {
    Some((file_name, data))
}

/// Build a multipart/form-data body.
fn multipart(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn submit_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/videos/blur")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn submit(app: &TestApp, fields: &[(&str, &str)]) -> String {
    let response = send(app, submit_request(multipart(upload("clip.mp4", b"video"), fields))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    json(response).await["job_id"].as_str().unwrap().to_string()
}

async fn wait_for_status(app: &TestApp, job_id: &str, status: &str) -> Value {
    for _ in 0..500 {
        let response = send(app, get(&format!("/api/v1/jobs/{job_id}"))).await;
        if response.status() == StatusCode::OK {
            let body = json(response).await;
            if body["status"] == status {
                return body;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached {status}");
}

async fn assert_error(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let body = json(response).await;
    assert_eq!(body["error"], code);
    assert!(!body["message"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app().await;

    let response = send(&app, get("/api/v1/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_security_headers() {
    let app = test_app().await;

    let response = send(&app, get("/api/v1/health")).await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_submit_and_download() {
    let app = test_app().await;

    let response = send(
        &app,
        submit_request(multipart(
            upload("clip.mp4", b"video"),
            &[("languages", "en"), ("words", "secret"), ("sample_rate", "2")],
        )),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = json(response).await;
    assert_eq!(accepted["status"], "queued");
    assert_eq!(accepted["estimated_duration"], 120);
    let job_id = accepted["job_id"].as_str().unwrap().to_string();

    let job = wait_for_status(&app, &job_id, "completed").await;
    assert_eq!(job["progress"], 100);
    assert_eq!(job["input_file"], "clip.mp4");
    assert_eq!(job["output_file"], "blurred_clip.mp4");
    assert_eq!(job["parameters"]["sample_rate"], 2);
    assert_eq!(job["result_url"], format!("/api/v1/jobs/{job_id}/result"));
    assert!(job.get("input_path").is_none());

    let response = send(&app, get(&format!("/api/v1/jobs/{job_id}/result"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"blurred_clip.mp4\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.starts_with(b"NORMALIZED\n"));
}

#[tokio::test]
async fn test_mov_result_content_type() {
    let app = test_app().await;

    let response = send(&app, submit_request(multipart(upload("Clip.MOV", b"video"), &[]))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = json(response).await["job_id"].as_str().unwrap().to_string();
    wait_for_status(&app, &job_id, "completed").await;

    let response = send(&app, get(&format!("/api/v1/jobs/{job_id}/result"))).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/quicktime");
}

#[tokio::test]
async fn test_missing_file() {
    let app = test_app().await;

    let response = send(&app, submit_request(multipart(None, &[("blur_strength", "51")]))).await;

    assert_error(response, StatusCode::BAD_REQUEST, "MISSING_FILE").await;
    assert_eq!(app.uploads(), 0);
}

#[tokio::test]
async fn test_not_multipart() {
    let app = test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/videos/blur")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = send(&app, request).await;

    assert_error(response, StatusCode::BAD_REQUEST, "MISSING_FILE").await;
}

#[tokio::test]
async fn test_empty_filename() {
    let app = test_app().await;

    let response = send(&app, submit_request(multipart(upload("", b"video"), &[]))).await;

    assert_error(response, StatusCode::BAD_REQUEST, "EMPTY_FILENAME").await;
    assert_eq!(app.uploads(), 0);
}

#[tokio::test]
async fn test_invalid_format() {
    let app = test_app().await;

    let response = send(&app, submit_request(multipart(upload("clip.avi", b"video"), &[]))).await;

    assert_error(response, StatusCode::UNSUPPORTED_MEDIA_TYPE, "INVALID_FORMAT").await;
    assert_eq!(app.uploads(), 0);
}

#[tokio::test]
async fn test_invalid_parameters_leave_no_upload() {
    let app = test_app().await;

    let cases: [&[(&str, &str)]; 4] = [
        &[("blur_strength", "50")],
        &[("confidence", "2")],
        &[("sample_rate", "0")],
        &[("padding", "lots")],
    ];

    for fields in cases {
        // Parameters after the file, so the upload is already on disk
        let mut body = multipart(upload("clip.mp4", b"video"), &[]);
        let tail = format!("--{BOUNDARY}--\r\n");
        body.truncate(body.len() - tail.len());
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(tail.as_bytes());

        let response = send(&app, submit_request(body)).await;
        assert_error(response, StatusCode::BAD_REQUEST, "INVALID_PARAMETER").await;
    }

    assert_eq!(app.uploads(), 0);
}

#[tokio::test]
async fn test_file_too_large() {
    let config = ApiConfig {
        max_upload_size: 16,
        ..ApiConfig::default()
    };
    let app = test_app_with(config, MemoryCodec::new(checkerboard_frames(2, 8, 8))).await;

    let data = vec![7u8; 64];
    let response = send(&app, submit_request(multipart(upload("clip.mp4", &data), &[]))).await;

    assert_error(response, StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE").await;
    assert_eq!(app.uploads(), 0);
}

#[tokio::test]
async fn test_oversized_body_with_content_length() {
    let config = ApiConfig {
        max_upload_size: 16,
        ..ApiConfig::default()
    };
    let app = test_app_with(config, MemoryCodec::new(checkerboard_frames(2, 8, 8))).await;

    let data = vec![7u8; 2 * 1024 * 1024];
    let body = multipart(upload("clip.mp4", &data), &[]);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/videos/blur")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let response = send(&app, request).await;

    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_error(response, StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE").await;
    assert_eq!(app.uploads(), 0);
}

#[tokio::test]
async fn test_unknown_job() {
    let app = test_app().await;

    let response = send(&app, get("/api/v1/jobs/does-not-exist")).await;
    assert_error(response, StatusCode::NOT_FOUND, "JOB_NOT_FOUND").await;

    let response = send(&app, get("/api/v1/jobs/does-not-exist/result")).await;
    assert_error(response, StatusCode::NOT_FOUND, "JOB_NOT_FOUND").await;

    let response = send(&app, delete("/api/v1/jobs/does-not-exist")).await;
    assert_error(response, StatusCode::NOT_FOUND, "JOB_NOT_FOUND").await;
}

#[tokio::test]
async fn test_result_not_ready() {
    let codec = MemoryCodec::new(checkerboard_frames(50, 8, 8)).with_frame_delay(Duration::from_millis(20));
    let app = test_app_with(ApiConfig::default(), codec).await;

    let job_id = submit(&app, &[]).await;
    let response = send(&app, get(&format!("/api/v1/jobs/{job_id}/result"))).await;

    assert_eq!(response.status().as_u16(), 425);
    assert_eq!(json(response).await["error"], "RESULT_NOT_READY");
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let codec = MemoryCodec::new(checkerboard_frames(2, 8, 8)).failing_open();
    let app = test_app_with(ApiConfig::default(), codec).await;

    let job_id = submit(&app, &[]).await;
    let job = wait_for_status(&app, &job_id, "failed").await;

    assert!(!job["error"].as_str().unwrap().is_empty());
    assert!(job.get("result_url").is_none());
}

#[tokio::test]
async fn test_delete_job() {
    let app = test_app().await;

    let job_id = submit(&app, &[]).await;
    wait_for_status(&app, &job_id, "completed").await;
    assert_eq!(app.uploads(), 1);
    assert_eq!(app.outputs(), 1);

    let response = send(&app, delete(&format!("/api/v1/jobs/{job_id}"))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(app.uploads(), 0);
    assert_eq!(app.outputs(), 0);

    let response = send(&app, get(&format!("/api/v1/jobs/{job_id}"))).await;
    assert_error(response, StatusCode::NOT_FOUND, "JOB_NOT_FOUND").await;

    let response = send(&app, delete(&format!("/api/v1/jobs/{job_id}"))).await;
    assert_error(response, StatusCode::NOT_FOUND, "JOB_NOT_FOUND").await;
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let config = ApiConfig {
        api_key: Some("s3cret".to_string()),
        ..ApiConfig::default()
    };
    let app = test_app_with(config, MemoryCodec::new(checkerboard_frames(2, 8, 8))).await;

    let response = send(&app, get("/api/v1/jobs/anything")).await;
    assert_error(response, StatusCode::UNAUTHORIZED, "UNAUTHORIZED").await;

    let request = Request::builder()
        .uri("/api/v1/jobs/anything")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/jobs/anything")
        .header("X-API-Key", "s3cret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NOT_FOUND);

    // Health stays open
    assert_eq!(send(&app, get("/api/v1/health")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limiting() {
    let config = ApiConfig {
        rate_limit_rps: 1,
        ..ApiConfig::default()
    };
    let app = test_app_with(config, MemoryCodec::new(checkerboard_frames(2, 8, 8))).await;

    let limited = |ip: &str| {
        Request::builder()
            .uri("/api/v1/jobs/anything")
            .header("X-Forwarded-For", ip)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(send(&app, limited("192.168.1.100")).await.status(), StatusCode::NOT_FOUND);
    let response = send(&app, limited("192.168.1.100")).await;
    assert_eq!(response.headers()["retry-after"], "1");
    assert_error(response, StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED").await;
    assert_eq!(send(&app, limited("192.168.1.101")).await.status(), StatusCode::NOT_FOUND);
}
