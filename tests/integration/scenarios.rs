//! End-to-end pipeline scenarios over fake capabilities.

use std::time::Duration;

use http::StatusCode;
use serde_json::Value;

use crate::helpers::{
    FakeDubber, FakeFetcher, TestApp, capabilities_with_dubber, capabilities_with_fetcher,
    happy_capabilities,
};

/// The legal transition table from the state machine.
fn is_legal_transition(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("queued", "downloading" | "canceled" | "failed")
            | ("downloading", "downloaded" | "failed" | "canceled")
            | ("downloaded", "dubbing" | "muxing" | "failed" | "canceled")
            | ("dubbing", "dubbed" | "failed" | "canceled")
            | ("dubbed", "muxing" | "failed" | "canceled")
            | ("muxing", "complete" | "failed" | "canceled")
    )
}

/// Extract `(from, to)` pairs from a logs response, oldest first.
fn state_changes(logs: &Value) -> Vec<(String, String)> {
    let mut changes: Vec<(String, String)> = logs["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["kind"] == "state_change")
        .map(|e| {
            (
                e["payload"]["from"].as_str().unwrap().to_string(),
                e["payload"]["to"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    changes.reverse(); // logs are newest first
    changes
}

fn count_events(logs: &Value, kind: &str) -> usize {
    logs["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["kind"] == kind)
        .count()
}

#[tokio::test]
async fn happy_path_without_dubbing() {
    let app = TestApp::new(happy_capabilities()).await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({"url": "https://example.test/v1", "requestedDubbing": false}),
        )
        .await;

    let job = app.wait_for_status(&token, &id, "complete").await;
    assert!(job["completedAt"].is_string(), "completed_at set on completion");

    let logs = app
        .request("GET", &format!("/jobs/{id}/logs?limit=100"), None, Some(&token))
        .await;
    assert_eq!(logs.status, StatusCode::OK);
    let changes = state_changes(&logs.body);
    assert!(changes.len() >= 3, "at least three state changes: {changes:?}");
    for (from, to) in &changes {
        assert!(is_legal_transition(from, to), "illegal transition {from} -> {to}");
    }
    assert_eq!(changes.last().unwrap().1, "complete");

    // The final output was moved into the complete directory.
    let job = app.get_job(&token, &id).await;
    let video_path = job["media"]["videoPath"].as_str().unwrap();
    app.wait_for_path(std::path::Path::new(video_path)).await;
    assert!(video_path.contains("complete"));
    assert!(!app.incomplete_dir(&id).exists(), "temp dir cleaned after muxing");
}

#[tokio::test]
async fn happy_path_with_dubbing() {
    let app = TestApp::new(happy_capabilities()).await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({
                "url": "https://example.test/v2",
                "requestedDubbing": true,
                "targetLang": "ru",
            }),
        )
        .await;

    let job = app.wait_for_status(&token, &id, "complete").await;
    assert!(job["media"]["videoPath"].is_string());
    assert!(job["media"]["audioDubbedPath"].is_string());

    let logs = app
        .request("GET", &format!("/jobs/{id}/logs?limit=100"), None, Some(&token))
        .await;
    let changes = state_changes(&logs.body);
    let expected = [
        ("queued", "downloading"),
        ("downloading", "downloaded"),
        ("downloaded", "dubbing"),
        ("dubbing", "dubbed"),
        ("dubbed", "muxing"),
        ("muxing", "complete"),
    ];
    assert_eq!(
        changes,
        expected
            .iter()
            .map(|(f, t)| (f.to_string(), t.to_string()))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn transient_errors_are_retried_by_the_queue() {
    let app = TestApp::new(capabilities_with_fetcher(FakeFetcher::flaky(2))).await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({"url": "https://example.test/v3", "requestedDubbing": false}),
        )
        .await;

    // Two 1 s/2 s backoffs precede the third, successful attempt.
    let job = app.wait_for_status(&token, &id, "complete").await;
    assert_eq!(
        job["retryCount"], 0,
        "queue retries do not touch the user retry counter"
    );

    let logs = app
        .request("GET", &format!("/jobs/{id}/logs?limit=100"), None, Some(&token))
        .await;
    assert_eq!(count_events(&logs.body, "error"), 2);
    assert_eq!(logs.body["events"].as_array().unwrap().iter().filter(|e| {
        e["kind"] == "state_change" && e["payload"]["to"] == "complete"
    }).count(), 1);
}

#[tokio::test]
async fn permanent_dub_failure_then_resume() {
    let app = TestApp::new(capabilities_with_dubber(FakeDubber::broken_times(1))).await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({
                "url": "https://example.test/v4",
                "requestedDubbing": true,
                "targetLang": "ru",
            }),
        )
        .await;

    let job = app.wait_for_status(&token, &id, "failed").await;
    assert_eq!(job["error"], "unsupported language pair");
    assert!(job["completedAt"].is_string());

    let response = app
        .request("POST", &format!("/jobs/{id}/resume"), None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["resumedFrom"], "dubbing");

    // The second dub attempt succeeds and the pipeline runs to the end.
    let job = app.wait_for_status(&token, &id, "complete").await;
    assert_eq!(job["retryCount"], 1);
    assert!(job["error"].is_null());

    let logs = app
        .request("GET", &format!("/jobs/{id}/logs?limit=100"), None, Some(&token))
        .await;
    let retries: Vec<&Value> = logs.body["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["kind"] == "retry")
        .collect();
    assert_eq!(retries.len(), 1);
    assert_eq!(retries[0]["payload"]["previousStatus"], "failed");
    assert_eq!(retries[0]["payload"]["resumeFrom"], "dubbing");
}

#[tokio::test]
async fn resume_is_rejected_before_any_stage_completed() {
    let app = TestApp::new(capabilities_with_fetcher(FakeFetcher::broken())).await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({"url": "https://example.test/v5", "requestedDubbing": true}),
        )
        .await;

    app.wait_for_status(&token, &id, "failed").await;

    let response = app
        .request("POST", &format!("/jobs/{id}/resume"), None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "cannot_resume");
    assert_eq!(response.body["details"]["downloadCompleted"], false);
    assert_eq!(response.body["details"]["hasVideo"], false);
    assert_eq!(response.body["details"]["requestedDubbing"], true);
}

#[tokio::test]
async fn cancel_cleans_the_temp_directory() {
    let app = TestApp::new(capabilities_with_fetcher(FakeFetcher::slow(
        Duration::from_secs(30),
    )))
    .await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({"url": "https://example.test/v6", "requestedDubbing": false}),
        )
        .await;

    // The slow fetcher creates the temp dir as its first act.
    let temp_dir = app.incomplete_dir(&id);
    app.wait_for_path(&temp_dir).await;

    let response = app
        .request("POST", &format!("/jobs/{id}/cancel"), None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "canceled");
    assert!(!temp_dir.exists(), "temp dir removed by cancel cleanup");

    // Double-cancel is idempotent.
    let again = app
        .request("POST", &format!("/jobs/{id}/cancel"), None, Some(&token))
        .await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["status"], "canceled");

    let deleted = app
        .request("DELETE", &format!("/jobs/{id}"), None, Some(&token))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app
        .request("GET", &format!("/jobs/{id}"), None, Some(&token))
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn retry_restarts_a_failed_job_from_download() {
    let app = TestApp::new(capabilities_with_fetcher(FakeFetcher::flaky(3))).await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({"url": "https://example.test/v7", "requestedDubbing": false}),
        )
        .await;

    // Three transient failures exhaust the queue's attempts.
    let job = app.wait_for_status(&token, &id, "failed").await;
    assert!(job["error"].as_str().unwrap().contains("attempts exhausted"));

    let response = app
        .request("POST", &format!("/jobs/{id}/retry"), None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["retryCount"], 1);
    assert!(response.body["error"].is_null(), "retry clears the error");
    assert!(response.body["completedAt"].is_null());

    // The fetcher's failure budget is spent; this lineage completes.
    app.wait_for_status(&token, &id, "complete").await;
}
