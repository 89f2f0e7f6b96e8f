//! REST handler tests: drive the router in-process against an in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use parley_api::state::AppStateInner;
use parley_db::{Database, MessageStore};

fn app() -> (Router, Arc<Database>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let router = parley_api::router(AppStateInner::new(db.clone()));
    (router, db)
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn register_req(username: &str) -> Request<Body> {
    Request::post("/users/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "username": username }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn register_returns_user() {
    let (app, _db) = app();

    let (status, body) = call(&app, register_req("alice")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert!(body["id"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn register_is_idempotent() {
    let (app, db) = app();

    let (_, first) = call(&app, register_req("alice")).await;
    let (status, second) = call(&app, register_req("alice")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(db.list_users().unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_registration_yields_one_user() {
    let (app, db) = app();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let app = app.clone();
        tasks.push(tokio::spawn(async move { call(&app, register_req("dave")).await }));
    }
    let mut ids = Vec::new();
    for t in tasks {
        let (status, body) = t.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        ids.push(body["id"].as_i64().unwrap());
    }

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(db.list_users().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_username_is_bad_request() {
    let (app, _db) = app();
    let (status, _) = call(&app, register_req("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_username_is_rejected() {
    let (app, _db) = app();
    let req = Request::post("/users/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let (status, _) = call(&app, req).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn register_ignores_extra_fields() {
    let (app, _db) = app();
    let req = Request::post("/users/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": "alice", "display_name": "Alice" }).to_string(),
        ))
        .unwrap();

    let (status, body) = call(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn list_users_returns_all() {
    let (app, _db) = app();
    call(&app, register_req("alice")).await;
    call(&app, register_req("bob")).await;

    let (status, body) = call(&app, Request::get("/users/").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);
}

#[tokio::test]
async fn conversation_returns_both_directions_in_order() {
    let (app, db) = app();
    let alice = db.create_or_get_user("alice").unwrap();
    let bob = db.create_or_get_user("bob").unwrap();
    db.record_message(alice.id, bob.id, "hi bob").unwrap();
    db.record_message(bob.id, alice.id, "hi alice").unwrap();
    db.record_message(alice.id, bob.id, "how are you").unwrap();

    let uri = format!("/messages/{}/{}", bob.id, alice.id);
    let (status, body) = call(&app, Request::get(uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(contents, vec!["hi bob", "hi alice", "how are you"]);

    // ISO-8601 timestamps on the wire
    for m in messages {
        let ts = m["timestamp"].as_str().unwrap();
        assert!(chrono_like(ts), "unexpected timestamp {}", ts);
    }
}

#[tokio::test]
async fn conversation_with_unknown_user_is_empty() {
    let (app, _db) = app();
    let (status, body) = call(&app, Request::get("/messages/1/2").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn non_numeric_user_id_is_rejected() {
    let (app, _db) = app();
    let (status, _) = call(&app, Request::get("/messages/abc/2").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn chrono_like(ts: &str) -> bool {
    // YYYY-MM-DDTHH:MM:SS...
    ts.len() >= 19 && ts.as_bytes()[4] == b'-' && ts.as_bytes()[10] == b'T'
}
