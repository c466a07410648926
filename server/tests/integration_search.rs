use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;
use triage_core::{SearchConfig, SimilarityService};
use triage_server::{build_app, router, AppConfig, AppState};

const KB: &str = r#"{"ticket_no":"T001","problem_description":"Cannot reset my login password.","solution_text":"Go to reset.company.com and follow the prompts.","category":"Login & Auth","priority":"High"}
{"ticket_no":"T002","problem_description":"My VPN password expired and I cannot connect.","solution_text":"Your VPN password is the same as your network password. Please reset it first.","category":"VPN Access","priority":"Critical"}
{"ticket_no":"T003","problem_description":"Screen is flickering after Windows update.","solution_text":"Roll back the graphics driver via Device Manager.","category":"Hardware","priority":"Medium"}
not a record
"#;

fn app_with_kb(admin_token: Option<&str>) -> Router {
    let dir = tempdir().unwrap();
    let path = dir.path().join("kb.jsonl");
    fs::write(&path, KB).unwrap();
    let config = AppConfig {
        search: SearchConfig::default(),
        kb_path: Some(path),
        admin_token: admin_token.map(String::from),
        cors_allow_origin: None,
    };
    // the knowledge base is read eagerly, so the tempdir can go
    build_app(config).unwrap()
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body: Bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri).header("content-type", "application/json").body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let app = app_with_kb(None);
    let (status, json) = call(app, get("/search?q=vpn%20password%20expired&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["ticket_id"], "T002");
    assert_eq!(arr[1]["ticket_id"], "T001");
    let s0 = arr[0]["similarity_score"].as_f64().unwrap();
    assert_eq!(s0, (s0 * 100.0).round() / 100.0);
}

#[tokio::test]
async fn search_before_any_tickets_is_unavailable() {
    let state = AppState::new(Arc::new(SimilarityService::new(SearchConfig::default())), None);
    let (status, json) = call(router(state, None), get("/search?q=vpn%20password")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "index not ready");
}

#[tokio::test]
async fn live_suggestions_need_ten_words_and_reject_non_text() {
    let app = app_with_kb(None);
    let (status, json) = call(app.clone(), post_json("/live", json!({ "text": "vpn password expired" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["issues"].as_array().unwrap().is_empty());

    let long = "my vpn password expired this morning and now I cannot connect from home";
    let (status, json) = call(app.clone(), post_json("/live", json!(long))).await;
    assert_eq!(status, StatusCode::OK);
    let issues = json["issues"].as_array().unwrap();
    assert!(!issues.is_empty() && issues.len() <= 3);
    assert_eq!(issues[0]["ticket_id"], "T002");
    assert!(json["seq"].as_u64().unwrap() >= 2);

    let (status, _) = call(app, post_json("/live", json!(17))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analyze_merges_search_suggestion_and_prediction() {
    let app = app_with_kb(None);
    let body = json!({ "description": "My VPN password expired and I cannot connect to the office network" });
    let (status, json) = call(app.clone(), post_json("/analyze", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["similar_issues"][0]["ticket_id"], "T002");
    assert!(json["similar_issues"].as_array().unwrap().len() <= 4);
    assert_eq!(json["predicted_module"], "VPN Access");
    assert!(json["ai_suggestion"].as_str().unwrap().contains("Password Reset"));

    let body = json!({ "description": "My VPN password expired", "module": "Network", "priority": "Low" });
    let (_, json) = call(app, post_json("/analyze", body)).await;
    assert_eq!(json["predicted_module"], "Network");
    assert_eq!(json["predicted_priority"], "Low");
}

#[tokio::test]
async fn ingest_requires_admin_token_and_rebuilds() {
    let app = app_with_kb(Some("s3cret"));
    let batch = json!([
        { "ticket_id": "T010", "problem_description": "Teams camera shows a black screen", "solution_text": "Update the camera driver" },
        { "ticket_id": "T001", "problem_description": "duplicate id" },
        { "problem_description": "no id" }
    ]);

    let (status, _) = call(app.clone(), post_json("/tickets", batch.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = post_json("/tickets", batch);
    req.headers_mut().insert("X-ADMIN-TOKEN", "s3cret".parse().unwrap());
    let (status, json) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["report"]["load"]["inserted"], 1);
    assert_eq!(json["report"]["load"]["skipped"].as_array().unwrap().len(), 2);
    assert_eq!(json["stats"]["tickets"], 4);
    assert_eq!(json["stats"]["generation"], 2);

    let (status, json) = call(app.clone(), get("/tickets/T010")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["solution_text"], "Update the camera driver");
    let (status, _) = call(app.clone(), get("/tickets/T999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, json) = call(app, get("/search?q=teams%20camera%20black&k=3")).await;
    assert_eq!(json["results"][0]["ticket_id"], "T010");
}

#[tokio::test]
async fn live_echoes_the_callers_draft_number() {
    let app = app_with_kb(None);
    let long = "my vpn password expired this morning and now I cannot connect from home";
    let (status, json) = call(app.clone(), post_json("/live", json!({ "text": long, "seq": 41 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["client_seq"], 41);
    assert_ne!(json["seq"], 41);
    assert_eq!(json["issues"][0]["ticket_id"], "T002");

    let (_, json) = call(app, post_json("/live", json!({ "text": long }))).await;
    assert!(json.get("client_seq").is_none());
}

#[tokio::test]
async fn feedback_is_counted_in_stats() {
    let app = app_with_kb(None);
    let (status, json) = call(app.clone(), post_json("/feedback", json!({ "solved": true, "ticket_id": "T002" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    assert_eq!(json["escalated"], false);

    let (_, json) = call(app.clone(), post_json("/feedback", json!({ "solved": false }))).await;
    assert_eq!(json["escalated"], true);

    let (status, _) = call(app.clone(), post_json("/feedback", json!({ "ticket_id": "T001" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, json) = call(app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tickets"], 3);
    assert_eq!(json["feedback"]["solved"], 1);
    assert_eq!(json["feedback"]["not_solved"], 1);
}
