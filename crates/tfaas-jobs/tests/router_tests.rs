use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use tfaas_jobs::{create_router, Executor, JobEngine, JobMetrics, JobRequest, JobsState};

struct GatedExecutor {
    gate: Semaphore,
    failure: Option<&'static str>,
}

#[async_trait]
impl Executor for GatedExecutor {
    async fn execute(&self, _request: &JobRequest) -> Result<()> {
        self.gate.acquire().await?.forget();
        match self.failure {
            Some(detail) => Err(anyhow::anyhow!(detail)),
            None => Ok(()),
        }
    }
}

fn test_app(failure: Option<&'static str>) -> (Router, JobEngine, Arc<GatedExecutor>) {
    let executor = Arc::new(GatedExecutor {
        gate: Semaphore::new(0),
        failure,
    });
    let engine = JobEngine::spawn(executor.clone(), Arc::new(JobMetrics::new().unwrap()));
    let app = create_router(JobsState::new(engine.clone()));
    (app, engine, executor)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn as_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_apply_returns_request_id() {
    let (app, engine, executor) = test_app(None);

    let (status, body) = send(&app, post("/apply", r#"{"path":"envs/prod","version":"1.4.0"}"#)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let id = as_json(&body)["request_id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, body) = send(&app, get(&format!("/job/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        as_json(&body),
        json!({
            "path": "envs/prod",
            "version": "1.4.0",
            "error": "",
            "status": "RUNNING",
            "action": "apply",
            "request_id": id,
        })
    );

    executor.gate.add_permits(1);
    engine.wait(&id.as_str().into()).await.unwrap();

    let (status, body) = send(&app, get(&format!("/job/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body)["status"], "SUCCESS");
    assert_eq!(as_json(&body)["error"], "");
}

#[tokio::test]
async fn test_destroy_failure_is_reported_on_poll() {
    let (app, engine, executor) = test_app(Some("invalid configuration"));

    let (status, body) = send(&app, post("/destroy", r#"{"path":"envs/prod","version":"1.4.0"}"#)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = as_json(&body)["request_id"].as_str().unwrap().to_string();

    executor.gate.add_permits(1);
    engine.wait(&id.as_str().into()).await.unwrap();

    let (status, body) = send(&app, get(&format!("/job/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let body = as_json(&body);
    assert_eq!(body["status"], "ERROR");
    assert_eq!(body["error"], "invalid configuration");
    assert_eq!(body["action"], "destroy");
}

#[tokio::test]
async fn test_busy_returns_503_without_body() {
    let (app, engine, executor) = test_app(None);

    let (_, body) = send(&app, post("/apply", r#"{"path":"envs/prod","version":"1.4.0"}"#)).await;
    let id = as_json(&body)["request_id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, post("/destroy", r#"{"path":"envs/dev","version":"1.5.0"}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.is_empty());

    // The running job is untouched by the rejection
    let (_, body) = send(&app, get(&format!("/job/{}", id))).await;
    assert_eq!(as_json(&body)["action"], "apply");
    assert_eq!(as_json(&body)["status"], "RUNNING");

    executor.gate.add_permits(1);
    engine.wait(&id.as_str().into()).await.unwrap();

    let (status, _) = send(&app, post("/destroy", r#"{"path":"envs/dev","version":"1.5.0"}"#)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    executor.gate.add_permits(1);
}

#[tokio::test]
async fn test_missing_fields_return_400_without_body() {
    let (app, engine, _executor) = test_app(None);

    for body in [
        r#"{"path":"envs/prod"}"#,
        r#"{"path":"envs/prod","version":""}"#,
        r#"{"version":"1.4.0"}"#,
        r#"{"path":1,"version":"1.4.0"}"#,
        "not json",
        "",
    ] {
        let (status, response) = send(&app, post("/apply", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert!(response.is_empty());
    }

    assert!(engine.current().await.is_none());
}

#[tokio::test]
async fn test_submission_without_content_type_is_accepted() {
    let (app, _engine, executor) = test_app(None);

    let request = Request::builder()
        .method("POST")
        .uri("/apply")
        .body(Body::from(r#"{"path":"envs/prod","version":"1.4.0"}"#))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    executor.gate.add_permits(1);
}

#[tokio::test]
async fn test_unknown_job_returns_404() {
    let (app, _engine, executor) = test_app(None);

    let (status, body) = send(&app, get("/job/nonexistent-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());

    send(&app, post("/apply", r#"{"path":"envs/prod","version":"1.4.0"}"#)).await;
    let (status, _) = send(&app, get("/job/nonexistent-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    executor.gate.add_permits(1);
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let (app, _engine, _executor) = test_app(None);

    let (status, _) = send(&app, get("/apply")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _engine, executor) = test_app(None);

    send(&app, post("/apply", r#"{"path":"envs/prod","version":"1.4.0"}"#)).await;
    send(&app, post("/apply", r#"{"path":"envs/prod","version":"1.4.0"}"#)).await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("tfaas_jobs_submitted_total 1"));
    assert!(text.contains("tfaas_jobs_rejected_total{reason=\"busy\"} 1"));
    executor.gate.add_permits(1);
}
