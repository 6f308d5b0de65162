//! Control API surface tests: auth, validation, error codes, health.

use std::time::Duration;

use http::StatusCode;

use crate::helpers::{FakeFetcher, TestApp, capabilities_with_fetcher, happy_capabilities};

/// Capabilities that keep jobs in-flight long enough to poke at them.
fn stalled() -> redub_api::StageCapabilities {
    capabilities_with_fetcher(FakeFetcher::slow(Duration::from_secs(3600)))
}

#[tokio::test]
async fn login_logout_me_flow() {
    let app = TestApp::new(happy_capabilities()).await;

    let bad = app
        .request(
            "POST",
            "/auth/login",
            Some(serde_json::json!({"username": "admin", "password": "nope"})),
            None,
        )
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);

    let token = app.login().await;

    let me = app.request("GET", "/auth/me", None, Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "admin");
    assert_eq!(me.body["role"], "admin");

    let out = app.request("POST", "/auth/logout", None, Some(&token)).await;
    assert_eq!(out.status, StatusCode::NO_CONTENT);

    // The revoked session no longer authenticates.
    let after = app.request("GET", "/auth/me", None, Some(&token)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn mutations_require_a_token() {
    let app = TestApp::new(happy_capabilities()).await;

    let response = app
        .request(
            "POST",
            "/jobs",
            Some(serde_json::json!({"url": "https://example.test/v1"})),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let listed = app.request("GET", "/jobs", None, None).await;
    assert_eq!(listed.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_validates_url_priority_and_enums() {
    let app = TestApp::new(stalled()).await;
    let token = app.login().await;

    let bad_url = app
        .request(
            "POST",
            "/jobs",
            Some(serde_json::json!({"url": "ftp://example.test/v1"})),
            Some(&token),
        )
        .await;
    assert_eq!(bad_url.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_url.body["code"], "validation");

    let bad_priority = app
        .request(
            "POST",
            "/jobs",
            Some(serde_json::json!({"url": "https://example.test/v1", "priority": 11})),
            Some(&token),
        )
        .await;
    assert_eq!(bad_priority.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_priority.body["details"]["field"], "priority");

    let bad_container = app
        .request(
            "POST",
            "/jobs",
            Some(serde_json::json!({"url": "https://example.test/v1", "outputContainer": "avi"})),
            Some(&token),
        )
        .await;
    assert_eq!(bad_container.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_container.body["details"]["field"], "outputContainer");
}

#[tokio::test]
async fn unknown_jobs_return_not_found() {
    let app = TestApp::new(happy_capabilities()).await;
    let token = app.login().await;
    let missing = "/jobs/0190b543-7e80-7000-8000-000000000000";

    for (method, path) in [
        ("GET", missing.to_string()),
        ("POST", format!("{missing}/cancel")),
        ("POST", format!("{missing}/retry")),
        ("POST", format!("{missing}/resume")),
        ("DELETE", missing.to_string()),
    ] {
        let response = app.request(method, &path, None, Some(&token)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{method} {path}");
        assert_eq!(response.body["code"], "not_found");
    }
}

#[tokio::test]
async fn retry_of_a_live_job_is_invalid_state() {
    let app = TestApp::new(stalled()).await;
    let token = app.login().await;
    let id = app
        .create_job(&token, serde_json::json!({"url": "https://example.test/v1"}))
        .await;

    let response = app
        .request("POST", &format!("/jobs/{id}/retry"), None, Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "invalid_state");
}

#[tokio::test]
async fn pause_control_action_is_reserved() {
    let app = TestApp::new(stalled()).await;
    let token = app.login().await;
    let id = app
        .create_job(&token, serde_json::json!({"url": "https://example.test/v1"}))
        .await;

    let response = app
        .request(
            "POST",
            &format!("/jobs/{id}/control"),
            Some(serde_json::json!({"action": "pause"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(response.body["code"], "not_implemented");
}

#[tokio::test]
async fn prioritize_updates_the_job() {
    let app = TestApp::new(stalled()).await;
    let token = app.login().await;
    let id = app
        .create_job(
            &token,
            serde_json::json!({"url": "https://example.test/v1", "priority": 2}),
        )
        .await;

    let response = app
        .request(
            "POST",
            &format!("/jobs/{id}/control"),
            Some(serde_json::json!({"action": "prioritize", "priority": 9})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
    assert_eq!(response.body["priority"], 9);

    let out_of_range = app
        .request(
            "POST",
            &format!("/jobs/{id}/control"),
            Some(serde_json::json!({"action": "prioritize", "priority": 42})),
            Some(&token),
        )
        .await;
    assert_eq!(out_of_range.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_supports_filter_search_and_pagination() {
    let app = TestApp::new(stalled()).await;
    let token = app.login().await;

    for n in 0..3 {
        app.create_job(
            &token,
            serde_json::json!({"url": format!("https://example.test/v{n}")}),
        )
        .await;
    }

    let page = app
        .request("GET", "/jobs?limit=2&offset=0", None, Some(&token))
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["total"], 3);
    assert_eq!(page.body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(page.body["limit"], 2);

    let searched = app
        .request("GET", "/jobs?search=v2", None, Some(&token))
        .await;
    assert_eq!(searched.body["total"], 1);
    assert_eq!(searched.body["jobs"][0]["url"], "https://example.test/v2");

    let bad_status = app
        .request("GET", "/jobs?status=sleeping", None, Some(&token))
        .await;
    assert_eq!(bad_status.status, StatusCode::BAD_REQUEST);

    // One job is being downloaded, the other two wait behind the
    // single-writer download queue.
    let queued = app
        .request("GET", "/jobs?status=queued", None, Some(&token))
        .await;
    assert_eq!(queued.status, StatusCode::OK);
    assert!(queued.body["total"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn creation_is_rejected_when_space_is_low() {
    let app = TestApp::with_config(happy_capabilities(), |config| {
        // An impossible floor: every disk is below it.
        config.media.min_free_space_gb = u64::MAX / (1024 * 1024 * 1024) - 1;
    })
    .await;
    let token = app.login().await;

    // The probe is best-effort; without a resolvable disk the floor
    // cannot be enforced and there is nothing to assert.
    let root = std::path::PathBuf::from(&app.state.config.media.root);
    if redub_service::space::available_bytes(&root).is_none() {
        return;
    }

    let response = app
        .request(
            "POST",
            "/jobs",
            Some(serde_json::json!({"url": "https://example.test/v1"})),
            Some(&token),
        )
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["code"], "insufficient_space");
}

#[tokio::test]
async fn healthz_reports_dependencies() {
    let app = TestApp::new(happy_capabilities()).await;

    let response = app.request("GET", "/healthz", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["dependencies"]["db"], "ok");
    assert_eq!(response.body["dependencies"]["queue"], "ok");
    assert_eq!(response.body["dependencies"]["filesystem"], "ok");
    assert!(response.body["timestamp"].is_string());
}

#[tokio::test]
async fn cookies_are_written_into_the_job_temp_dir() {
    let app = TestApp::new(stalled()).await;
    let token = app.login().await;

    let id = app
        .create_job(
            &token,
            serde_json::json!({
                "url": "https://example.test/v1",
                "cookies": "# Netscape HTTP Cookie File\nexample.test\tFALSE\t/\tFALSE\t0\tsid\tabc",
            }),
        )
        .await;

    let cookies = app.incomplete_dir(&id).join("cookies.txt");
    assert!(cookies.is_file());
    let contents = std::fs::read_to_string(&cookies).unwrap();
    assert!(contents.contains("example.test"));
}
