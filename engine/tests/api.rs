mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use logify_engine::{
    config::Settings,
    routes::{router, AppState},
    ModelHandle,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    _dir: tempfile::TempDir,
    app: Router,
    settings: Settings,
}

fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.model.path = dir.path().join("model.json");
    settings.feedback.path = dir.path().join("user_data.jsonl");

    let model = common::trained_model();
    model.save(&settings.model.path).unwrap();

    let state = Arc::new(AppState::new(settings.clone(), ModelHandle::new(model), None));
    TestApp {
        _dir: dir,
        app: router(state),
        settings,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_predict_returns_verdict() {
    let t = test_app();
    let (status, body) = call(
        &t.app,
        "POST",
        "/predict",
        Some(json!({"text": "Hey, are we still on for lunch at 1pm today?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "NOT_SPAM");
    assert!(body["spam_probability"].as_f64().unwrap() < 0.5);
    assert_eq!(body["spam_words"], json!([]));
    assert!(body["reason"].is_null());
    assert!(body["log_odds"].as_f64().unwrap().is_finite());
}

#[tokio::test]
async fn test_predict_gibberish_reason() {
    let t = test_app();
    let (status, body) = call(
        &t.app,
        "POST",
        "/predict",
        Some(json!({"text": "asdkj qwop zxcv mnbv"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "SPAM");
    assert_eq!(body["spam_probability"], 0.99);
    assert_eq!(body["confidence"], "Very likely spam");
    assert!(body["reason"].is_string());
}

#[tokio::test]
async fn test_predict_empty_text_is_bad_request() {
    let t = test_app();
    let (status, body) = call(&t.app, "POST", "/predict", Some(json!({"text": "   "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_predict_without_text_is_bad_request() {
    let t = test_app();
    let (status, body) = call(&t.app, "POST", "/predict", Some(json!({"threshold": 0.5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_request() {
    let t = test_app();
    let cases = [
        ("/feedback", json!({"text": "WIN NOW", "label": "1"})),
        ("/feedback", json!({"text": "WIN NOW", "label": -1})),
        ("/feedback", json!({"text": "WIN NOW", "label": 256})),
        ("/feedback", json!({"label": 1})),
        ("/predict", json!({"text": 42})),
    ];
    for (uri, payload) in cases {
        let (status, body) = call(&t.app, "POST", uri, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", uri, payload);
        assert_eq!(body["status"], 400);
        assert!(body["error"].is_string());
    }
    assert!(!t.settings.feedback.path.exists());
}

#[tokio::test]
async fn test_stats_track_predictions() {
    let t = test_app();
    for text in ["see you at the station", "asdkj qwop zxcv mnbv"] {
        let (status, _) = call(&t.app, "POST", "/predict", Some(json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = call(&t.app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checked"], 2);
    assert_eq!(body["spam"].as_u64().unwrap() + body["ham"].as_u64().unwrap(), 2);
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["text"], "asdkj qwop zxcv mnbv");
}

#[tokio::test]
async fn test_feedback_is_appended() {
    let t = test_app();
    let (status, body) = call(
        &t.app,
        "POST",
        "/feedback",
        Some(json!({"text": "WIN FREE CASH NOW", "label": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = call(
        &t.app,
        "POST",
        "/feedback",
        Some(json!({"text": "fine", "label": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let saved = logify_engine::storage::load_feedback(&t.settings.feedback.path).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].text, "WIN FREE CASH NOW");
}

#[tokio::test]
async fn test_reload_keeps_model_on_failure() {
    let t = test_app();
    let (status, before) = call(&t.app, "GET", "/model", None).await;
    assert_eq!(status, StatusCode::OK);

    std::fs::write(&t.settings.model.path, "{broken").unwrap();
    let (status, _) = call(&t.app, "POST", "/reload", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, after) = call(&t.app, "GET", "/model", None).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_reload_swaps_in_new_artifact() {
    let t = test_app();
    let mut feedback = common::base_corpus();
    feedback.truncate(4);
    let retrained = logify_engine::trainer::Trainer::default()
        .retrain(&common::base_corpus(), &feedback, &tokio_util::sync::CancellationToken::new())
        .unwrap();
    retrained.model.save(&t.settings.model.path).unwrap();

    let (status, body) = call(&t.app, "POST", "/reload", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["training_samples"].as_u64().unwrap() as usize,
        common::base_corpus().len() + 4
    );
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = call(&t.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
