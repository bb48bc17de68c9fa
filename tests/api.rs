use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use discipline_timer::{
    create_router,
    engine::{AccountingEngine, RestartQuota, TimerSpec, TimerTable},
    state::{AppState, ServerInfo},
    sync::{MemoryStore, SyncAdapter},
};

const ALLOWANCE: i64 = 210 * 60;

fn app_with(info: ServerInfo) -> (Router, Arc<MemoryStore>) {
    let table = TimerTable::new(vec![
        TimerSpec::minutes("food", 15, RestartQuota::Limited(1)),
        TimerSpec::minutes("bath", 30, RestartQuota::Unlimited),
    ])
    .unwrap();
    let engine = AccountingEngine::new(table, ALLOWANCE as u64);
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(engine, Arc::clone(&store) as Arc<dyn SyncAdapter>, info));
    (create_router(state), store)
}

fn app() -> (Router, Arc<MemoryStore>) {
    app_with(ServerInfo::default())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("x-admin-token", token);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn state_lists_pool_and_timers() {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/state", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pool"]["balance"], ALLOWANCE);
    assert_eq!(body["pool"]["display"], "03:30:00");
    assert_eq!(body["timers"].as_array().unwrap().len(), 2);
    assert_eq!(body["timers"][0]["id"], "food");
    assert_eq!(body["timers"][0]["display"], "0:00");
}

#[tokio::test]
async fn mutations_require_admin() {
    let (app, _) = app();
    let (status, body) = send(&app, "POST", "/timers/food/start", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission_denied");

    let (status, body) = send(&app, "POST", "/timers/food/start?admin=true", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["running"], true);
    assert_eq!(body["revision"], 1);
}

#[tokio::test]
async fn admin_token_replaces_query_flag() {
    let (app, _) = app_with(ServerInfo {
        admin_token: Some("s3cret".into()),
        ..ServerInfo::default()
    });

    let (status, _) = send(&app, "POST", "/timers/bath/start?admin=true", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", "/timers/bath/start", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", "/timers/bath/start", None, Some("s3cret")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_timer_is_not_found() {
    let (app, _) = app();
    let (status, body) = send(&app, "POST", "/timers/nap/start?admin=true", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "invalid_timer");

    let (status, _) = send(&app, "GET", "/timers/nap", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn jump_charges_overflow_to_pool() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        "POST",
        "/timers/food/jump?admin=true",
        Some(json!({ "minutes": 20 })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["charged"], 300);
    assert_eq!(body["pool"]["balance"], ALLOWANCE - 300);
    assert_eq!(body["timer"]["elapsed"], 1200);
    assert_eq!(body["timer"]["overflowSeconds"], 300);
    assert_eq!(body["timer"]["inOverflow"], true);
}

#[tokio::test]
async fn restart_flow_enforces_overflow_and_quota() {
    let (app, _) = app();
    let (status, body) = send(&app, "POST", "/timers/food/restart?admin=true", None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "not_in_overflow");

    send(&app, "POST", "/timers/food/adjust?admin=true", Some(json!({ "deltaSeconds": 901 })), None).await;
    let (status, body) = send(&app, "POST", "/timers/food/restart?admin=true", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["elapsed"], 0);
    assert_eq!(body["timer"]["restartsUsed"], 1);

    send(&app, "POST", "/timers/food/adjust?admin=true", Some(json!({ "deltaSeconds": 901 })), None).await;
    let (status, body) = send(&app, "POST", "/timers/food/restart?admin=true", None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "restart_quota_exceeded");
}

#[tokio::test]
async fn negative_adjust_clamps_to_zero() {
    let (app, _) = app();
    send(&app, "POST", "/timers/bath/adjust?admin=true", Some(json!({ "deltaSeconds": 30 })), None).await;
    let (status, body) = send(
        &app,
        "POST",
        "/timers/bath/adjust?admin=true",
        Some(json!({ "deltaSeconds": -50 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timer"]["elapsed"], 0);
    assert_eq!(body["charged"], 0);
}

#[tokio::test]
async fn reset_day_restores_defaults() {
    let (app, _) = app();
    send(&app, "POST", "/timers/food/start?admin=true", None, None).await;
    send(&app, "POST", "/timers/food/jump?admin=true", Some(json!({ "minutes": 60 })), None).await;

    let (status, body) = send(&app, "POST", "/day/reset?admin=true", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pool"]["balance"], ALLOWANCE);

    let (_, state) = send(&app, "GET", "/state", None, None).await;
    assert!(state["day"].is_string());
    for timer in state["timers"].as_array().unwrap() {
        assert_eq!(timer["elapsed"], 0);
        assert_eq!(timer["running"], false);
        assert_eq!(timer["restartsUsed"], 0);
    }
}

#[tokio::test]
async fn storage_outage_is_a_warning() {
    let (app, store) = app();
    store.set_offline(true);

    let (status, body) = send(&app, "POST", "/timers/bath/start?admin=true", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unsaved");
    assert!(body["warning"].as_str().unwrap().contains("will retry"));

    let (_, state) = send(&app, "GET", "/state", None, None).await;
    assert_eq!(state["timers"][1]["running"], true);
}

#[tokio::test]
async fn follower_rejects_admin_requests() {
    let (app, _) = app_with(ServerInfo { follower: true, ..ServerInfo::default() });
    let (status, _) = send(&app, "POST", "/day/reset?admin=true", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "follower");
}

#[tokio::test]
async fn log_records_committed_operations() {
    let (app, _) = app();
    send(&app, "POST", "/timers/food/start?admin=true", None, None).await;
    send(&app, "POST", "/timers/food/restart?admin=true", None, None).await;
    send(&app, "POST", "/timers/food/stop?admin=true", None, None).await;

    let (status, body) = send(&app, "GET", "/log", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    // The rejected restart is not logged.
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["action"], "stop");
    assert_eq!(entries[1]["action"], "start");
    assert_eq!(entries[1]["timer"], "food");
}

#[tokio::test]
async fn read_only_caller_is_refused_before_body_is_decoded() {
    let (app, _) = app();
    let (status, body) = send(&app, "POST", "/timers/food/adjust", Some(json!({ "delta": "x" })), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission_denied");

    let (status, body) = send(&app, "POST", "/timers/food/jump", Some(json!({})), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission_denied");

    let (status, body) = send(
        &app,
        "POST",
        "/timers/food/adjust?admin=true",
        Some(json!({ "delta": "x" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "invalid_body");
}

#[tokio::test]
async fn events_start_with_the_current_snapshot() {
    let (app, _) = app();
    send(&app, "POST", "/timers/bath/start?admin=true", None, None).await;

    let request = Request::builder().uri("/events").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");

    let mut frames = response.into_body().into_data_stream();
    let frame = frames.next().await.unwrap().unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: snapshot"));
    assert!(text.contains("id: 1"));
    assert!(text.contains("\"running\":true"));
}
