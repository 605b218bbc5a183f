//! API integration tests against an in-memory job store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use subflow_api::{create_router, ApiConfig, AppState};
use subflow_models::{Job, JobStatus};
use subflow_store::{JobManager, MemoryJobStore};
use subflow_translate::{TranslateResult, TranslationEngine};
use subflow_worker::{JobContext, WorkerConfig};

struct EchoEngine;

#[async_trait]
impl TranslationEngine for EchoEngine {
    async fn translate_batch(
        &self,
        texts: &[String],
        _source_lang: &str,
        _target_lang: &str,
    ) -> TranslateResult<String> {
        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. [en] {}", i + 1, t))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn test_state() -> AppState {
    let manager = JobManager::new(Arc::new(MemoryJobStore::new()));
    let work_dir = tempfile::tempdir().expect("tempdir").into_path();
    let config = WorkerConfig {
        work_dir,
        flush_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let ctx = JobContext::new(manager.clone(), config, Arc::new(EchoEngine));
    AppState::with_parts(ApiConfig::default(), manager, ctx)
}

fn router(state: &AppState) -> Router {
    create_router(state.clone(), None)
}

fn multipart_request(kind: &str, filename: &str, file: &str) -> Request<Body> {
    let boundary = "test-boundary-7f3a";
    let body = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"kind\"\r\n\r\n\
         {kind}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {file}\r\n\
         --{b}--\r\n",
        b = boundary,
    );
    Request::builder()
        .method("POST")
        .uri("/api/jobs")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

const SAMPLE_SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nOlá.\n\n2\n00:00:03,000 --> 00:00:04,000\nTudo bem?\n";

async fn wait_for_terminal(state: &AppState, job_id: &str) -> Job {
    for _ in 0..100 {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/jobs/{}", job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job: Job = serde_json::from_value(body_json(response).await).unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = test_state();
    let response = router(&state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_job_returns_404() {
    let state = test_state();
    let response = router(&state)
        .oneshot(
            Request::builder()
                .uri("/api/jobs/no-such-id")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_kind_rejected() {
    let state = test_state();
    let response = router(&state)
        .oneshot(multipart_request("transmogrify", "in.srt", SAMPLE_SRT))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_translate_create_poll_download() {
    let state = test_state();

    let response = router(&state)
        .oneshot(multipart_request("translate", "in.srt", SAMPLE_SRT))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = body_json(response).await["job_id"]
        .as_str()
        .expect("job_id")
        .to_string();

    let job = wait_for_terminal(&state, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress.percentage, 100);

    let response = router(&state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/jobs/{}/download", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-subrip"
    );
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let srt = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(srt.contains("[en] Olá."));
}

#[tokio::test]
async fn test_download_before_completion_conflicts() {
    let state = test_state();
    let job = state
        .manager
        .create_job("translate", "pending.srt")
        .await
        .unwrap();

    let response = router(&state)
        .oneshot(
            Request::builder()
                .uri(format!("/api/jobs/{}/download", job.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_terminal_job_conflicts() {
    let state = test_state();

    let response = router(&state)
        .oneshot(multipart_request("translate", "in.srt", SAMPLE_SRT))
        .await
        .unwrap();
    let job_id = body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_for_terminal(&state, &job_id).await;

    let response = router(&state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/jobs/{}/cancel", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Rejected cancel left the document untouched
    let job = wait_for_terminal(&state, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_cancel_pending_job_sets_flag() {
    let state = test_state();
    let job = state
        .manager
        .create_job("convert", "pending.mkv")
        .await
        .unwrap();

    let response = router(&state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/jobs/{}/cancel", job.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let job: Job = serde_json::from_value(body_json(response).await).unwrap();
    assert!(job.cancel_requested);
    assert!(!job.status.is_terminal());
}

#[tokio::test]
async fn test_status_poll_is_idempotent() {
    let state = test_state();
    let job = state
        .manager
        .create_job("remux", "input.mkv")
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let response = router(&state)
            .oneshot(
                Request::builder()
                    .uri(format!("/api/jobs/{}", job.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        seen.push(body_json(response).await);
    }
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[1], seen[2]);
}
