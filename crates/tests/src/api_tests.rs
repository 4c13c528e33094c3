use std::time::Duration;

use serde_json::{Value, json};

use crate::fixtures::fakes::{FailAt, FakeGeneration};
use crate::fixtures::test_app::TestApp;

async fn poll_until_terminal(app: &TestApp, id: &str) -> Value {
    for _ in 0..500 {
        let resp = app
            .client
            .get(app.url(&format!("/api/job/{id}")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        if matches!(body["status"].as_str(), Some("completed" | "failed")) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not finish");
}

#[tokio::test]
async fn health_check() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn create_job_returns_accepted() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/job"))
        .json(&json!({ "text": "a dragon who learns to bake" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);

    let body: Value = resp.json().await.unwrap();
    let id = body["jobId"].as_str().unwrap();
    assert!(!id.is_empty());

    let job = poll_until_terminal(&app, id).await;
    assert_eq!(job["id"], id);
    assert_eq!(job["status"], "completed");
    assert!(job.get("error").is_none());

    let url = job["url"].as_str().unwrap();
    assert!(url.contains(&format!("generated_short_{id}.mp4")));
    assert!(url.contains('&'));
    assert!(!url.contains("\\u0026"));
    assert!(job["created_at"].is_string());
    assert!(job["updated_at"].is_string());
}

#[tokio::test]
async fn empty_text_is_bad_request() {
    let app = TestApp::spawn().await;

    for body in [json!({ "text": "" }), json!({ "text": "   " }), json!({})] {
        let resp = app
            .client
            .post(app.url("/api/job"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"], "bad_request");
    }
    assert!(app.generation.calls().is_empty());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/job/00000000-0000-0000-0000-000000000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["error"], "not_found");
}

#[tokio::test]
async fn failed_job_reports_error() {
    let app = TestApp::spawn_with(FakeGeneration::failing_at(FailAt::Images)).await;

    let resp = app
        .client
        .post(app.url("/api/job"))
        .json(&json!({ "text": "a dragon" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let id = body["jobId"].as_str().unwrap();

    let job = poll_until_terminal(&app, id).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["url"], "");
    let error = job["error"].as_str().unwrap();
    assert!(error.starts_with("generating_images: "), "{error}");
    assert!(app.storage.objects.lock().unwrap().is_empty());
}
